// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host contract for platform integrations.
//!
//! The engine never touches a document directly. Each host (the browser
//! backend, or the in-memory fake used by tests) provides the following
//! pieces:
//!
//! - **Document tree**: the [`MediaHost`] trait covers element queries,
//!   computed layout, overlay nodes, event wiring, attribute watches, and
//!   playback control.
//!
//! - **Change feed**: structural mutations, navigation, and document
//!   visibility are pushed into the engine as [`MutationRecord`],
//!   [`NavigationEvent`], and [`Engine::on_visibility_change`] calls. How the
//!   host observes them (a `MutationObserver`, wrapped `history` methods, a
//!   test script) is not the engine's business.
//!
//! - **Input**: the host routes pointer gestures on an overlay to
//!   [`Engine::on_pointer`] and must suppress the event's default action and
//!   propagation itself, so the page never sees clicks aimed at an overlay.
//!
//! - **Collaborators**: [`SpeedPrompt`] for custom speed entry and
//!   [`KeyValueStore`] for persisting the custom-speed history.
//!
//! - **Clock**: hosts pass [`HostTime`](crate::time::HostTime) values in and
//!   poll when [`Engine::next_deadline`] says so.
//!
//! [`Engine::on_visibility_change`]: crate::engine::Engine::on_visibility_change
//! [`Engine::on_pointer`]: crate::engine::Engine::on_pointer
//! [`Engine::next_deadline`]: crate::engine::Engine::next_deadline

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString as _};
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Point, Rect, Size};

use crate::error::HostError;
use crate::registry::TrackId;

/// Computed visibility of an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// Rendered normally.
    #[default]
    Visible,
    /// `visibility: hidden` or `visibility: collapse`.
    Hidden,
    /// `display: none`.
    NotDisplayed,
}

/// Computed CSS `position` of an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Positioning {
    /// `position: static`, the default.
    #[default]
    Static,
    /// Any other value (`relative`, `absolute`, `fixed`, `sticky`).
    Positioned,
}

/// Computed layout mode of an element, as far as overlay placement cares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    /// Block, inline, or anything else without its own layout algorithm.
    #[default]
    Flow,
    /// `display: flex` or `inline-flex`.
    Flex,
    /// `display: grid` or `inline-grid`.
    Grid,
}

/// The subset of computed style the engine reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayoutStyle {
    /// Computed `position`.
    pub positioning: Positioning,
    /// Computed `display` layout mode.
    pub mode: LayoutMode,
    /// Computed visibility.
    pub visibility: Visibility,
}

/// Attributes watched on every tracked element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WatchedAttr {
    /// `src` (the element now shows different content).
    Source,
    /// `width` / `height`.
    Size,
    /// `style`.
    Style,
    /// `class`.
    Class,
}

impl WatchedAttr {
    /// Every watched attribute.
    pub const ALL: [Self; 4] = [Self::Source, Self::Size, Self::Style, Self::Class];

    /// Maps a DOM attribute name to the watched attribute it belongs to.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "src" => Some(Self::Source),
            "width" | "height" => Some(Self::Size),
            "style" => Some(Self::Style),
            "class" => Some(Self::Class),
            _ => None,
        }
    }

    /// The DOM attribute names covered by this attribute.
    #[must_use]
    pub const fn names(self) -> &'static [&'static str] {
        match self {
            Self::Source => &["src"],
            Self::Size => &["width", "height"],
            Self::Style => &["style"],
            Self::Class => &["class"],
        }
    }
}

/// A summarized structural or attribute mutation under the document root.
///
/// Hosts summarize raw records before handing them over; the engine only needs
/// to know whether media elements were involved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationRecord {
    /// Nodes were inserted and/or removed.
    ChildList {
        /// An inserted node is a media element or contains one.
        added_media: bool,
        /// A removed node is a media element or contains one.
        removed_media: bool,
    },
    /// An attribute changed.
    Attribute {
        /// The mutated element is a media element.
        on_media: bool,
    },
}

impl MutationRecord {
    /// Whether this record can change the set of valid media elements.
    #[must_use]
    pub const fn is_relevant(self) -> bool {
        match self {
            Self::ChildList {
                added_media,
                removed_media,
            } => added_media || removed_media,
            Self::Attribute { on_media } => on_media,
        }
    }
}

/// A same-document navigation reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NavigationEvent {
    /// A programmatic `pushState`.
    Push,
    /// A programmatic `replaceState`.
    Replace,
    /// Back/forward navigation.
    Pop,
}

/// A pointer gesture on an overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// Primary-button click.
    Click,
    /// Primary-button double click.
    DoubleClick,
    /// Secondary-button click (context menu).
    SecondaryClick,
}

/// Access to the host document tree and its media elements.
///
/// `Element` is any element handle (ancestors included); [`is_media`] tells
/// media elements apart. Handles compare equal when they refer to the same
/// node.
///
/// Implementations must tolerate stale handles: every method may be called on
/// an element or overlay that has since been removed from the document.
///
/// [`is_media`]: Self::is_media
pub trait MediaHost {
    /// A handle to a document element.
    type Element: Clone + PartialEq + fmt::Debug;
    /// A handle to an overlay node created by this host.
    type Overlay: Clone + PartialEq + fmt::Debug;
    /// Keeps an overlay's event listeners alive until passed to
    /// [`unwire_overlay`](Self::unwire_overlay).
    type Listener;
    /// Keeps an element's attribute watch alive until passed to
    /// [`unwatch`](Self::unwatch).
    type Watch;

    // -- Tree reads --

    /// Returns every element of the tracked media kind currently in the
    /// document, in document order.
    fn media_elements(&self) -> Vec<Self::Element>;

    /// Whether `el` is of the tracked media kind.
    fn is_media(&self, el: &Self::Element) -> bool;

    /// Whether `el` is reachable from the document root.
    fn is_connected(&self, el: &Self::Element) -> bool;

    /// Computed layout style of `el`.
    fn layout_style(&self, el: &Self::Element) -> LayoutStyle;

    /// Border box of `el` in page coordinates.
    fn bounds(&self, el: &Self::Element) -> Rect;

    /// Parent element of `el`, if any.
    fn parent(&self, el: &Self::Element) -> Option<Self::Element>;

    /// Current source URL of a media element.
    fn source(&self, el: &Self::Element) -> Option<String>;

    /// Reads the correlation tag stored on `el`.
    fn track_tag(&self, el: &Self::Element) -> Option<TrackId>;

    /// Stores (or clears) the correlation tag on `el`.
    fn set_track_tag(&mut self, el: &Self::Element, tag: Option<TrackId>);

    // -- Overlays --

    /// Creates an overlay node as a child of `container`.
    fn create_overlay(&mut self, container: &Self::Element) -> Result<Self::Overlay, HostError>;

    /// Removes an overlay node from the document. Must be a no-op for
    /// overlays that are already gone.
    fn remove_overlay(&mut self, overlay: &Self::Overlay);

    /// Whether `overlay` is still attached under `container`.
    fn overlay_attached(&self, overlay: &Self::Overlay, container: &Self::Element) -> bool;

    /// Every overlay node currently in the document, owned or not.
    fn overlays_in_document(&self) -> Vec<Self::Overlay>;

    /// Reads the handle stamped on `overlay` by
    /// [`wire_overlay`](Self::wire_overlay).
    fn overlay_tag(&self, overlay: &Self::Overlay) -> Option<TrackId>;

    /// Rendered size of `overlay`.
    fn overlay_size(&self, overlay: &Self::Overlay) -> Size;

    /// Replaces the text shown by `overlay`.
    fn set_overlay_text(&mut self, overlay: &Self::Overlay, text: &str);

    /// Moves `overlay` so its top-left corner sits at `origin`, relative to
    /// its container's border box.
    fn move_overlay(&mut self, overlay: &Self::Overlay, origin: Point);

    // -- Wiring --

    /// Routes pointer gestures on `overlay` to the engine as events for `id`,
    /// and stamps `id` on the overlay.
    fn wire_overlay(&mut self, overlay: &Self::Overlay, id: TrackId)
    -> Result<Self::Listener, HostError>;

    /// Removes the listeners installed by [`wire_overlay`](Self::wire_overlay)
    /// and clears the stamp.
    fn unwire_overlay(&mut self, listener: Self::Listener);

    /// Reports changes to `attrs` on `el` to the engine as attribute events
    /// for `id`.
    fn watch_attributes(
        &mut self,
        el: &Self::Element,
        id: TrackId,
        attrs: &[WatchedAttr],
    ) -> Result<Self::Watch, HostError>;

    /// Stops the watch installed by [`watch_attributes`](Self::watch_attributes).
    fn unwatch(&mut self, watch: Self::Watch);

    // -- Playback --

    /// Sets both the playback rate and the default ("resume at") rate.
    fn set_playback_rate(&mut self, el: &Self::Element, rate: f64) -> Result<(), HostError>;

    /// Current playback rate of `el`.
    fn playback_rate(&self, el: &Self::Element) -> f64;

    /// Whether `el` is currently playing.
    fn is_playing(&self, el: &Self::Element) -> bool;

    /// Current playback position of `el`, in seconds.
    fn current_time(&self, el: &Self::Element) -> f64;

    /// Re-asserts playback of `el` from `position` seconds.
    fn resume_at(&mut self, el: &Self::Element, position: f64) -> Result<(), HostError>;
}

/// Blocking text input used for custom speed entry.
pub trait SpeedPrompt {
    /// Shows `message` with `default` pre-filled and blocks until the user
    /// answers. Returns `None` on cancellation.
    fn ask(&mut self, message: &str, default: &str) -> Option<String>;

    /// Shows a message the user must acknowledge.
    fn notify(&mut self, message: &str);
}

/// String key/value persistence.
pub trait KeyValueStore {
    /// Returns the value stored under `key`, or `default`.
    fn get(&self, key: &str, default: &str) -> String;

    /// Stores `value` under `key`.
    fn set(&mut self, key: &str, value: &str);
}

/// A [`KeyValueStore`] that lives only as long as the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }
}

/// A [`SpeedPrompt`] that always cancels. Useful for hosts without any
/// dialog surface.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPrompt;

impl SpeedPrompt for NoPrompt {
    fn ask(&mut self, _message: &str, _default: &str) -> Option<String> {
        None
    }

    fn notify(&mut self, message: &str) {
        tracing::info!(notice = message, "notice suppressed (no prompt surface)");
    }
}
