// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`MediaHost`] over the live DOM.
//!
//! Overlays are absolutely positioned `<div class="ratewatch-overlay">`
//! children of their container. Correlation tags live in `data-ratewatch-id`
//! on the media element and `data-ratewatch-for` on the overlay.

use std::rc::Rc;

use js_sys::{Array, Reflect};
use kurbo::{Point, Rect, Size};
use ratewatch_core::error::HostError;
use ratewatch_core::host::{
    LayoutMode, LayoutStyle, MediaHost, PointerKind, Positioning, Visibility, WatchedAttr,
};
use ratewatch_core::registry::TrackId;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast as _, JsValue};
use web_sys::{
    Document, Element, Event, HtmlElement, HtmlMediaElement, MutationObserver,
    MutationObserverInit, NodeList, Window,
};

use crate::runtime::{EventSink, HostEvent};

/// Tag name of the tracked media kind.
pub(crate) const MEDIA_TAG: &str = "video";
/// Class carried by every overlay this host creates.
pub(crate) const OVERLAY_CLASS: &str = "ratewatch-overlay";
const TRACK_ATTR: &str = "data-ratewatch-id";
const OVERLAY_ATTR: &str = "data-ratewatch-for";

const OVERLAY_CSS: &str = "position: absolute; left: 0; top: 0; z-index: 2147483647; \
    padding: 2px 6px; border-radius: 4px; background: rgba(0, 0, 0, 0.6); color: #fff; \
    font: 12px/1.4 system-ui, sans-serif; cursor: pointer; user-select: none; \
    pointer-events: auto;";

/// Pointer events swallowed on every overlay so the page never sees them.
const SUPPRESSED_EVENTS: [&str; 7] = [
    "click",
    "dblclick",
    "contextmenu",
    "mousedown",
    "mouseup",
    "pointerdown",
    "pointerup",
];

/// Whether `tag_name` names the tracked media kind.
pub(crate) fn is_media_tag(tag_name: &str) -> bool {
    tag_name.eq_ignore_ascii_case(MEDIA_TAG)
}

/// Maps a DOM event type to the gesture it carries, if any.
pub(crate) fn pointer_kind(event_type: &str) -> Option<PointerKind> {
    match event_type {
        "click" => Some(PointerKind::Click),
        "dblclick" => Some(PointerKind::DoubleClick),
        "contextmenu" => Some(PointerKind::SecondaryClick),
        _ => None,
    }
}

/// Builds a [`LayoutStyle`] from computed `position`, `display`, and
/// `visibility` values.
pub(crate) fn layout_from_computed(position: &str, display: &str, visibility: &str) -> LayoutStyle {
    let positioning = match position {
        "" | "static" => Positioning::Static,
        _ => Positioning::Positioned,
    };
    let mode = if display.contains("flex") {
        LayoutMode::Flex
    } else if display.contains("grid") {
        LayoutMode::Grid
    } else {
        LayoutMode::Flow
    };
    let visibility = if display == "none" {
        Visibility::NotDisplayed
    } else if matches!(visibility, "hidden" | "collapse") {
        Visibility::Hidden
    } else {
        Visibility::Visible
    };
    LayoutStyle {
        positioning,
        mode,
        visibility,
    }
}

/// Picks the source key for a media element.
///
/// `src` is the resolved `src` property, which changes as soon as the page
/// writes the attribute. `currentSrc` lags until resource selection settles,
/// so it is only used for media fed by `<source>` children.
pub(crate) fn media_source(src: String, current_src: String) -> Option<String> {
    [src, current_src].into_iter().find(|s| !s.is_empty())
}

/// Containers given an inline `position` so overlays can sit inside them.
///
/// Each pin remembers the container's previous inline value and the overlays
/// that rely on it. The value is handed back when the last overlay leaves.
#[derive(Debug)]
pub(crate) struct PinLedger<C, O> {
    pins: Vec<Pin<C, O>>,
}

#[derive(Debug)]
struct Pin<C, O> {
    container: C,
    prior: String,
    overlays: Vec<O>,
}

impl<C: PartialEq, O: PartialEq> PinLedger<C, O> {
    pub(crate) fn new() -> Self {
        Self { pins: Vec::new() }
    }

    /// Adds `overlay` to an existing pin on `container`. Returns `false` if
    /// the container is not pinned.
    pub(crate) fn join(&mut self, container: &C, overlay: O) -> bool {
        match self.pins.iter_mut().find(|p| p.container == *container) {
            Some(pin) => {
                pin.overlays.push(overlay);
                true
            }
            None => false,
        }
    }

    pub(crate) fn pin(&mut self, container: C, prior: String, overlay: O) {
        self.pins.push(Pin {
            container,
            prior,
            overlays: vec![overlay],
        });
    }

    /// Drops `overlay` from its pin. Returns the container and its prior
    /// inline value once no overlay is left on it.
    pub(crate) fn release(&mut self, overlay: &O) -> Option<(C, String)> {
        let index = self
            .pins
            .iter()
            .position(|p| p.overlays.contains(overlay))?;
        let pin = &mut self.pins[index];
        pin.overlays.retain(|o| o != overlay);
        if !pin.overlays.is_empty() {
            return None;
        }
        let pin = self.pins.swap_remove(index);
        Some((pin.container, pin.prior))
    }
}

fn rejected(err: JsValue) -> HostError {
    HostError::Rejected(format!("{err:?}"))
}

fn elements_in(list: &NodeList) -> impl Iterator<Item = Element> + '_ {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
}

/// Event listeners installed on one overlay.
pub struct OverlayListener {
    overlay: HtmlElement,
    closure: Closure<dyn FnMut(Event)>,
}

impl core::fmt::Debug for OverlayListener {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OverlayListener")
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}

/// A per-element attribute `MutationObserver`.
pub struct AttributeWatch {
    observer: MutationObserver,
    _closure: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl core::fmt::Debug for AttributeWatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AttributeWatch").finish_non_exhaustive()
    }
}

/// The browser [`MediaHost`].
pub struct DomHost {
    window: Window,
    document: Document,
    sink: EventSink,
    /// Attached to every `play()` promise so rejections (autoplay policy)
    /// don't surface as unhandled.
    swallow_rejection: Closure<dyn FnMut(JsValue)>,
    pins: PinLedger<HtmlElement, HtmlElement>,
}

impl core::fmt::Debug for DomHost {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DomHost")
            .field("document", &"Document")
            .finish_non_exhaustive()
    }
}

impl DomHost {
    pub(crate) fn new(window: Window, document: Document, sink: EventSink) -> Self {
        let swallow_rejection = Closure::wrap(Box::new(|reason: JsValue| {
            tracing::debug!(?reason, "play() rejected");
        }) as Box<dyn FnMut(JsValue)>);
        Self {
            window,
            document,
            sink,
            swallow_rejection,
            pins: PinLedger::new(),
        }
    }

    fn unpin(&mut self, overlay: &HtmlElement) {
        let Some((container, prior)) = self.pins.release(overlay) else {
            return;
        };
        let style = container.style();
        let result = if prior.is_empty() {
            style.remove_property("position").map(|_| ())
        } else {
            style.set_property("position", &prior)
        };
        if let Err(err) = result {
            tracing::debug!(?err, "container position not restored");
        }
    }

    fn media(el: &Element) -> Result<&HtmlMediaElement, HostError> {
        if !el.is_connected() {
            return Err(HostError::Detached);
        }
        el.dyn_ref::<HtmlMediaElement>()
            .ok_or_else(|| HostError::Rejected(format!("<{}> is not a media element", el.tag_name())))
    }

    fn set_number(target: &JsValue, property: &str, value: f64) -> Result<(), HostError> {
        Reflect::set(target, &JsValue::from_str(property), &JsValue::from_f64(value))
            .map(|_| ())
            .map_err(rejected)
    }
}

impl MediaHost for DomHost {
    type Element = Element;
    type Overlay = HtmlElement;
    type Listener = OverlayListener;
    type Watch = AttributeWatch;

    fn media_elements(&self) -> Vec<Element> {
        match self.document.query_selector_all(MEDIA_TAG) {
            Ok(list) => elements_in(&list).collect(),
            Err(err) => {
                tracing::warn!(?err, "media query failed");
                Vec::new()
            }
        }
    }

    fn is_media(&self, el: &Element) -> bool {
        is_media_tag(&el.tag_name())
    }

    fn is_connected(&self, el: &Element) -> bool {
        el.is_connected()
    }

    fn layout_style(&self, el: &Element) -> LayoutStyle {
        match self.window.get_computed_style(el) {
            Ok(Some(style)) => {
                let read = |name: &str| style.get_property_value(name).unwrap_or_default();
                layout_from_computed(&read("position"), &read("display"), &read("visibility"))
            }
            // No computed style: the element is outside a rendered document.
            _ => LayoutStyle {
                visibility: Visibility::NotDisplayed,
                ..LayoutStyle::default()
            },
        }
    }

    fn bounds(&self, el: &Element) -> Rect {
        let rect = el.get_bounding_client_rect();
        let dx = self.window.scroll_x().unwrap_or(0.0);
        let dy = self.window.scroll_y().unwrap_or(0.0);
        Rect::new(
            rect.left() + dx,
            rect.top() + dy,
            rect.right() + dx,
            rect.bottom() + dy,
        )
    }

    fn parent(&self, el: &Element) -> Option<Element> {
        el.parent_element()
    }

    fn source(&self, el: &Element) -> Option<String> {
        match el.dyn_ref::<HtmlMediaElement>() {
            Some(media) => media_source(media.src(), media.current_src()),
            None => el.get_attribute("src").filter(|src| !src.is_empty()),
        }
    }

    fn track_tag(&self, el: &Element) -> Option<TrackId> {
        el.get_attribute(TRACK_ATTR)?.parse().ok()
    }

    fn set_track_tag(&mut self, el: &Element, tag: Option<TrackId>) {
        let result = match tag {
            Some(id) => el.set_attribute(TRACK_ATTR, &id.to_string()),
            None => el.remove_attribute(TRACK_ATTR),
        };
        if let Err(err) = result {
            tracing::debug!(?err, "track tag not written");
        }
    }

    fn create_overlay(&mut self, container: &Element) -> Result<HtmlElement, HostError> {
        if !container.is_connected() {
            return Err(HostError::Detached);
        }
        let doc = container.owner_document().unwrap_or_else(|| self.document.clone());
        let overlay: HtmlElement = doc
            .create_element("div")
            .map_err(rejected)?
            .dyn_into()
            .map_err(|_| HostError::Rejected("created node is not an HTMLElement".into()))?;
        overlay.set_class_name(OVERLAY_CLASS);
        overlay.set_attribute("style", OVERLAY_CSS).map_err(rejected)?;

        // Absolute children need a positioned containing block.
        if let Some(html) = container.dyn_ref::<HtmlElement>()
            && !self.pins.join(html, overlay.clone())
            && self.layout_style(container).positioning == Positioning::Static
        {
            let style = html.style();
            let prior = style.get_property_value("position").unwrap_or_default();
            match style.set_property("position", "relative") {
                Ok(()) => self.pins.pin(html.clone(), prior, overlay.clone()),
                Err(err) => tracing::debug!(?err, "container not positioned"),
            }
        }
        if let Err(err) = container.append_child(&overlay) {
            self.unpin(&overlay);
            return Err(rejected(err));
        }
        Ok(overlay)
    }

    fn remove_overlay(&mut self, overlay: &HtmlElement) {
        overlay.remove();
        self.unpin(overlay);
    }

    fn overlay_attached(&self, overlay: &HtmlElement, container: &Element) -> bool {
        overlay.is_connected() && overlay.parent_element().as_ref() == Some(container)
    }

    fn overlays_in_document(&self) -> Vec<HtmlElement> {
        match self.document.query_selector_all(&format!(".{OVERLAY_CLASS}")) {
            Ok(list) => elements_in(&list)
                .filter_map(|el| el.dyn_into::<HtmlElement>().ok())
                .collect(),
            Err(err) => {
                tracing::warn!(?err, "overlay query failed");
                Vec::new()
            }
        }
    }

    fn overlay_tag(&self, overlay: &HtmlElement) -> Option<TrackId> {
        overlay.get_attribute(OVERLAY_ATTR)?.parse().ok()
    }

    fn overlay_size(&self, overlay: &HtmlElement) -> Size {
        Size::new(
            f64::from(overlay.offset_width()),
            f64::from(overlay.offset_height()),
        )
    }

    fn set_overlay_text(&mut self, overlay: &HtmlElement, text: &str) {
        overlay.set_text_content(Some(text));
    }

    fn move_overlay(&mut self, overlay: &HtmlElement, origin: Point) {
        let style = overlay.style();
        let _ = style.set_property("left", &format!("{}px", origin.x));
        let _ = style.set_property("top", &format!("{}px", origin.y));
    }

    fn wire_overlay(&mut self, overlay: &HtmlElement, id: TrackId) -> Result<OverlayListener, HostError> {
        let sink = Rc::clone(&self.sink);
        let closure = Closure::wrap(Box::new(move |event: Event| {
            event.prevent_default();
            event.stop_propagation();
            if let Some(kind) = pointer_kind(&event.type_()) {
                sink(HostEvent::Pointer { target: id, kind });
            }
        }) as Box<dyn FnMut(Event)>);

        for name in SUPPRESSED_EVENTS {
            if let Err(err) =
                overlay.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())
            {
                for installed in SUPPRESSED_EVENTS.iter().take_while(|&&n| n != name) {
                    let _ = overlay
                        .remove_event_listener_with_callback(installed, closure.as_ref().unchecked_ref());
                }
                return Err(rejected(err));
            }
        }
        let _ = overlay.set_attribute(OVERLAY_ATTR, &id.to_string());
        Ok(OverlayListener {
            overlay: overlay.clone(),
            closure,
        })
    }

    fn unwire_overlay(&mut self, listener: OverlayListener) {
        for name in SUPPRESSED_EVENTS {
            let _ = listener
                .overlay
                .remove_event_listener_with_callback(name, listener.closure.as_ref().unchecked_ref());
        }
        let _ = listener.overlay.remove_attribute(OVERLAY_ATTR);
    }

    fn watch_attributes(
        &mut self,
        el: &Element,
        id: TrackId,
        attrs: &[WatchedAttr],
    ) -> Result<AttributeWatch, HostError> {
        let sink = Rc::clone(&self.sink);
        let wanted = attrs.to_vec();
        let closure = Closure::wrap(Box::new(move |records: Array, _observer: MutationObserver| {
            let mut seen: Vec<WatchedAttr> = Vec::new();
            for record in records.iter() {
                let Some(name) = record
                    .dyn_ref::<web_sys::MutationRecord>()
                    .and_then(web_sys::MutationRecord::attribute_name)
                else {
                    continue;
                };
                if let Some(attr) = WatchedAttr::from_name(&name)
                    && wanted.contains(&attr)
                    && !seen.contains(&attr)
                {
                    seen.push(attr);
                }
            }
            for attr in seen {
                sink(HostEvent::Attribute { id, attr });
            }
        }) as Box<dyn FnMut(Array, MutationObserver)>);

        let observer = MutationObserver::new(closure.as_ref().unchecked_ref()).map_err(rejected)?;
        let init = MutationObserverInit::new();
        init.set_attributes(true);
        observer.observe_with_options(el, &init).map_err(rejected)?;
        Ok(AttributeWatch {
            observer,
            _closure: closure,
        })
    }

    fn unwatch(&mut self, watch: AttributeWatch) {
        watch.observer.disconnect();
    }

    fn set_playback_rate(&mut self, el: &Element, rate: f64) -> Result<(), HostError> {
        let media = Self::media(el)?;
        // Through Reflect: the browser throws on rates it cannot play.
        Self::set_number(media, "defaultPlaybackRate", rate)?;
        Self::set_number(media, "playbackRate", rate)
    }

    fn playback_rate(&self, el: &Element) -> f64 {
        el.dyn_ref::<HtmlMediaElement>()
            .map_or(1.0, HtmlMediaElement::playback_rate)
    }

    fn is_playing(&self, el: &Element) -> bool {
        el.dyn_ref::<HtmlMediaElement>()
            .is_some_and(|media| !media.paused() && !media.ended())
    }

    fn current_time(&self, el: &Element) -> f64 {
        el.dyn_ref::<HtmlMediaElement>()
            .map_or(0.0, HtmlMediaElement::current_time)
    }

    fn resume_at(&mut self, el: &Element, position: f64) -> Result<(), HostError> {
        let media = Self::media(el)?;
        if (media.current_time() - position).abs() > f64::EPSILON {
            media.set_current_time(position);
        }
        let promise = media.play().map_err(rejected)?;
        let _ = promise.catch(&self.swallow_rejection);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_tag_ignores_case() {
        assert!(is_media_tag("VIDEO"));
        assert!(is_media_tag("video"));
        assert!(!is_media_tag("AUDIO"));
        assert!(!is_media_tag("DIV"));
    }

    #[test]
    fn only_gesture_events_map_to_pointer_kinds() {
        assert_eq!(pointer_kind("click"), Some(PointerKind::Click));
        assert_eq!(pointer_kind("dblclick"), Some(PointerKind::DoubleClick));
        assert_eq!(pointer_kind("contextmenu"), Some(PointerKind::SecondaryClick));
        for name in ["mousedown", "mouseup", "pointerdown", "pointerup"] {
            assert_eq!(pointer_kind(name), None, "{name} is suppressed only");
        }
    }

    #[test]
    fn every_gesture_event_is_suppressed() {
        for name in ["click", "dblclick", "contextmenu"] {
            assert!(SUPPRESSED_EVENTS.contains(&name), "{name}");
        }
    }

    #[test]
    fn source_prefers_src_over_lagging_current_src() {
        assert_eq!(
            media_source("https://cdn/b.mp4".into(), "https://cdn/a.mp4".into()).as_deref(),
            Some("https://cdn/b.mp4"),
            "currentSrc still names the previous resource"
        );
        assert_eq!(
            media_source(String::new(), "https://cdn/c.mp4".into()).as_deref(),
            Some("https://cdn/c.mp4"),
            "<source> children only show up in currentSrc"
        );
        assert_eq!(media_source(String::new(), String::new()), None);
    }

    #[test]
    fn pin_is_released_with_its_last_overlay() {
        let mut pins = PinLedger::new();
        assert!(!pins.join(&"player", 1));
        pins.pin("player", String::new(), 1);
        assert!(pins.join(&"player", 2));

        assert_eq!(pins.release(&1), None, "overlay 2 still needs it");
        assert_eq!(pins.release(&2), Some(("player", String::new())));
        assert_eq!(pins.release(&2), None);
        assert!(!pins.join(&"player", 3), "unpinned after release");
    }

    #[test]
    fn pin_keeps_prior_inline_value() {
        let mut pins = PinLedger::new();
        pins.pin("a", "static".to_string(), 1);
        pins.pin("b", String::new(), 2);
        assert_eq!(pins.release(&1), Some(("a", "static".to_string())));
        assert!(pins.join(&"b", 3));
    }

    #[test]
    fn computed_style_maps_position_and_mode() {
        let style = layout_from_computed("static", "block", "visible");
        assert_eq!(style, LayoutStyle::default());

        let style = layout_from_computed("relative", "inline-flex", "visible");
        assert_eq!(style.positioning, Positioning::Positioned);
        assert_eq!(style.mode, LayoutMode::Flex);

        let style = layout_from_computed("sticky", "grid", "visible");
        assert_eq!(style.mode, LayoutMode::Grid);
    }

    #[test]
    fn computed_style_maps_visibility() {
        assert_eq!(
            layout_from_computed("static", "none", "visible").visibility,
            Visibility::NotDisplayed
        );
        assert_eq!(
            layout_from_computed("static", "block", "hidden").visibility,
            Visibility::Hidden
        );
        assert_eq!(
            layout_from_computed("static", "block", "collapse").visibility,
            Visibility::Hidden
        );
        assert_eq!(
            layout_from_computed("", "", "").visibility,
            Visibility::Visible,
            "empty values read as defaults"
        );
    }
}
