// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document-wide change feed.
//!
//! [`DocumentObserver`] turns browser notifications into [`HostEvent`]s:
//!
//! - a subtree `MutationObserver` on the root element, summarized into
//!   [`MutationRecord`]s;
//! - wrapped `history.pushState` / `history.replaceState` and a `popstate`
//!   listener, reported as [`NavigationEvent`]s;
//! - `visibilitychange` on the document.
//!
//! Everything is undone on drop.

use js_sys::{Array, Function, Reflect};
use ratewatch_core::host::{MutationRecord, NavigationEvent};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast as _, JsValue};
use web_sys::{Document, Element, Event, History, MutationObserver, MutationObserverInit, NodeList, Window};

use crate::dom_host::{MEDIA_TAG, is_media_tag};
use crate::runtime::{EventSink, HostEvent};

/// Attributes whose change on a media element can flip its validity.
const DOCUMENT_ATTRS: [&str; 3] = ["style", "class", "hidden"];

type HistoryClosure = Closure<dyn FnMut(JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>>;

/// Folds one observer batch into at most one relevant child-list record and
/// one relevant attribute record. `None` entries are records that were
/// filtered out during summarizing.
pub(crate) fn fold_batch(
    entries: impl IntoIterator<Item = Option<MutationRecord>>,
) -> impl Iterator<Item = MutationRecord> {
    let mut added = false;
    let mut removed = false;
    let mut attr = false;
    for record in entries.into_iter().flatten() {
        match record {
            MutationRecord::ChildList {
                added_media,
                removed_media,
            } => {
                added |= added_media;
                removed |= removed_media;
            }
            MutationRecord::Attribute { on_media } => attr |= on_media,
        }
    }
    let child_list = MutationRecord::ChildList {
        added_media: added,
        removed_media: removed,
    };
    let attribute = MutationRecord::Attribute { on_media: attr };
    [child_list, attribute]
        .into_iter()
        .filter(|record| record.is_relevant())
}

fn contains_media(nodes: &NodeList) -> bool {
    (0..nodes.length())
        .filter_map(|i| nodes.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .any(|el| is_media_tag(&el.tag_name()) || matches!(el.query_selector(MEDIA_TAG), Ok(Some(_))))
}

fn summarize(record: &web_sys::MutationRecord) -> Option<MutationRecord> {
    match record.type_().as_str() {
        "childList" => Some(MutationRecord::ChildList {
            added_media: contains_media(&record.added_nodes()),
            removed_media: contains_media(&record.removed_nodes()),
        }),
        "attributes" => {
            let name = record.attribute_name()?;
            if !DOCUMENT_ATTRS.contains(&name.as_str()) {
                return None;
            }
            let on_media = record
                .target()
                .and_then(|node| node.dyn_into::<Element>().ok())
                .is_some_and(|el| is_media_tag(&el.tag_name()));
            Some(MutationRecord::Attribute { on_media })
        }
        _ => None,
    }
}

struct HistoryHook {
    history: History,
    method: &'static str,
    original: Function,
    _wrapper: HistoryClosure,
}

impl HistoryHook {
    fn install(
        history: &History,
        method: &'static str,
        event: NavigationEvent,
        sink: EventSink,
    ) -> Result<Self, JsValue> {
        let original: Function = Reflect::get(history, &JsValue::from_str(method))?.dyn_into()?;
        let target = history.clone();
        let call = original.clone();
        let wrapper = Closure::wrap(Box::new(
            move |state: JsValue, unused: JsValue, url: JsValue| {
                // An `undefined` url counts as omitted.
                let result = call.call3(&target, &state, &unused, &url)?;
                sink(HostEvent::Navigation(event));
                Ok(result)
            },
        ) as Box<dyn FnMut(JsValue, JsValue, JsValue) -> Result<JsValue, JsValue>>);
        Reflect::set(history, &JsValue::from_str(method), wrapper.as_ref())?;
        Ok(Self {
            history: history.clone(),
            method,
            original,
            _wrapper: wrapper,
        })
    }
}

impl Drop for HistoryHook {
    fn drop(&mut self) {
        let _ = Reflect::set(&self.history, &JsValue::from_str(self.method), &self.original);
    }
}

struct EventHook {
    target: web_sys::EventTarget,
    name: &'static str,
    closure: Closure<dyn FnMut(Event)>,
}

impl EventHook {
    fn install(
        target: &web_sys::EventTarget,
        name: &'static str,
        event: HostEvent,
        sink: EventSink,
    ) -> Result<Self, JsValue> {
        let closure = Closure::wrap(Box::new(move |_event: Event| {
            sink(event);
        }) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            name,
            closure,
        })
    }
}

impl Drop for EventHook {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.name, self.closure.as_ref().unchecked_ref());
    }
}

/// Feeds document mutations, navigation, and visibility changes to the
/// runtime.
pub(crate) struct DocumentObserver {
    observer: MutationObserver,
    _mutations: Closure<dyn FnMut(Array, MutationObserver)>,
    _history: [HistoryHook; 2],
    _events: [EventHook; 2],
}

impl core::fmt::Debug for DocumentObserver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DocumentObserver").finish_non_exhaustive()
    }
}

impl DocumentObserver {
    /// Starts observing `document`.
    ///
    /// # Errors
    ///
    /// Fails when the document has no root element or a hook cannot be
    /// installed. Hooks installed before the failure are removed again.
    pub(crate) fn install(window: &Window, document: &Document, sink: EventSink) -> Result<Self, JsValue> {
        let root = document
            .document_element()
            .ok_or_else(|| JsValue::from_str("document has no root element"))?;

        let history = window.history()?;
        let push = HistoryHook::install(&history, "pushState", NavigationEvent::Push, sink.clone())?;
        let replace = HistoryHook::install(
            &history,
            "replaceState",
            NavigationEvent::Replace,
            sink.clone(),
        )?;
        let pop = EventHook::install(
            window,
            "popstate",
            HostEvent::Navigation(NavigationEvent::Pop),
            sink.clone(),
        )?;
        let visibility = EventHook::install(
            document,
            "visibilitychange",
            HostEvent::VisibilityChange,
            sink.clone(),
        )?;

        let mutations = Closure::wrap(Box::new(move |records: Array, _observer: MutationObserver| {
            let summaries = records.iter().map(|record| {
                record
                    .dyn_ref::<web_sys::MutationRecord>()
                    .and_then(summarize)
            });
            for record in fold_batch(summaries) {
                sink(HostEvent::Mutation(record));
            }
        }) as Box<dyn FnMut(Array, MutationObserver)>);
        let observer = MutationObserver::new(mutations.as_ref().unchecked_ref())?;
        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_attributes(true);
        observer.observe_with_options(&root, &init)?;

        Ok(Self {
            observer,
            _mutations: mutations,
            _history: [push, replace],
            _events: [pop, visibility],
        })
    }
}

impl Drop for DocumentObserver {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_without_media_yields_nothing() {
        let batch = [
            Some(MutationRecord::ChildList {
                added_media: false,
                removed_media: false,
            }),
            None,
            Some(MutationRecord::Attribute { on_media: false }),
        ];
        assert_eq!(fold_batch(batch).count(), 0);
    }

    #[test]
    fn batch_folds_to_one_record_per_kind() {
        let batch = [
            Some(MutationRecord::ChildList {
                added_media: true,
                removed_media: false,
            }),
            Some(MutationRecord::ChildList {
                added_media: false,
                removed_media: true,
            }),
            Some(MutationRecord::Attribute { on_media: true }),
            Some(MutationRecord::Attribute { on_media: true }),
        ];
        let folded: Vec<_> = fold_batch(batch).collect();
        assert_eq!(
            folded,
            [
                MutationRecord::ChildList {
                    added_media: true,
                    removed_media: true,
                },
                MutationRecord::Attribute { on_media: true },
            ]
        );
    }

    #[test]
    fn document_attrs_exclude_tags_and_source() {
        for name in ["data-ratewatch-id", "data-ratewatch-for", "src"] {
            assert!(!DOCUMENT_ATTRS.contains(&name), "{name}");
        }
    }
}
