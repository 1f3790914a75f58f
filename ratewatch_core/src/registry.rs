// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Element registry with generational handles.
//!
//! Each tracked element occupies one slot. Freed slots are recycled through a
//! free list and their generation is bumped, so a [`TrackId`] left behind on a
//! removed element (or copied onto a cloned one) can never reach the entry of
//! whatever element reuses the slot.

use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::host::MediaHost;
use crate::speed::SourceKey;

/// A handle to a tracked element.
///
/// Also the correlation tag hosts store on the element. Its [`Display`] form
/// (`"3.1"` for slot 3, generation 1) is what ends up in the document.
///
/// [`Display`]: fmt::Display
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl TrackId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrackId({}@gen{})", self.idx, self.generation)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.idx, self.generation)
    }
}

/// A tag string that is not a `"<index>.<generation>"` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseTrackIdError;

impl fmt::Display for ParseTrackIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("malformed track tag")
    }
}

impl core::error::Error for ParseTrackIdError {}

impl FromStr for TrackId {
    type Err = ParseTrackIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (idx, generation) = s.split_once('.').ok_or(ParseTrackIdError)?;
        Ok(Self {
            idx: idx.parse().map_err(|_| ParseTrackIdError)?,
            generation: generation.parse().map_err(|_| ParseTrackIdError)?,
        })
    }
}

/// Everything the engine keeps for one tracked element.
pub struct RegistryEntry<H: MediaHost> {
    /// The media element.
    pub element: H::Element,
    /// The ancestor the overlay is positioned in.
    pub container: H::Element,
    /// The element's overlay.
    pub overlay: H::Overlay,
    pub(crate) listener: Option<H::Listener>,
    pub(crate) watch: Option<H::Watch>,
    /// Key under which this element's speed is remembered.
    pub source_key: Option<SourceKey>,
    /// Rate waiting in the deferred-apply queue.
    pub(crate) pending_rate: Option<f64>,
}

impl<H: MediaHost> RegistryEntry<H> {
    pub(crate) fn new(element: H::Element, container: H::Element, overlay: H::Overlay) -> Self {
        Self {
            element,
            container,
            overlay,
            listener: None,
            watch: None,
            source_key: None,
            pending_rate: None,
        }
    }

    /// Whether a deferred apply is queued for this element.
    #[must_use]
    pub fn has_pending_apply(&self) -> bool {
        self.pending_rate.is_some()
    }
}

impl<H: MediaHost> fmt::Debug for RegistryEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("element", &self.element)
            .field("container", &self.container)
            .field("overlay", &self.overlay)
            .field("wired", &self.listener.is_some())
            .field("watched", &self.watch.is_some())
            .field("source_key", &self.source_key)
            .field("pending_rate", &self.pending_rate)
            .finish()
    }
}

/// Slot storage for [`RegistryEntry`] values addressed by [`TrackId`].
pub struct Registry<H: MediaHost> {
    slots: Vec<Option<RegistryEntry<H>>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
    live: usize,
}

impl<H: MediaHost> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: MediaHost> fmt::Debug for Registry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("live", &self.live)
            .field("slots", &self.slots.len())
            .field("free", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

impl<H: MediaHost> Registry<H> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Reserves a handle for an entry that is about to be inserted.
    ///
    /// The handle is not alive until [`insert`](Self::insert) is called with
    /// it; an unused reservation must be returned with
    /// [`release`](Self::release).
    pub(crate) fn reserve(&mut self) -> TrackId {
        let idx = if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "a document never holds u32::MAX media elements"
            )]
            let idx = self.slots.len() as u32;
            self.slots.push(None);
            self.generation.push(0);
            idx
        };
        TrackId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Returns an unused reservation to the free list.
    pub(crate) fn release(&mut self, id: TrackId) {
        if self.slot_generation(id) && self.slots[id.idx as usize].is_none() {
            self.generation[id.idx as usize] += 1;
            self.free_list.push(id.idx);
        }
    }

    /// Fills a reserved slot.
    pub(crate) fn insert(&mut self, id: TrackId, entry: RegistryEntry<H>) {
        debug_assert!(self.slot_generation(id), "stale reservation {id:?}");
        let slot = &mut self.slots[id.idx as usize];
        debug_assert!(slot.is_none(), "slot {id:?} already occupied");
        if slot.replace(entry).is_none() {
            self.live += 1;
        }
    }

    /// Removes an entry, freeing its slot for reuse.
    pub(crate) fn remove(&mut self, id: TrackId) -> Option<RegistryEntry<H>> {
        if !self.is_alive(id) {
            return None;
        }
        let entry = self.slots[id.idx as usize].take();
        // Bump generation so old handles immediately fail validation.
        self.generation[id.idx as usize] += 1;
        self.free_list.push(id.idx);
        self.live -= 1;
        entry
    }

    fn slot_generation(&self, id: TrackId) -> bool {
        self.generation
            .get(id.idx as usize)
            .is_some_and(|&g| g == id.generation)
    }

    /// Returns whether the given handle refers to a live entry.
    #[must_use]
    pub fn is_alive(&self, id: TrackId) -> bool {
        self.slot_generation(id) && self.slots[id.idx as usize].is_some()
    }

    /// Returns the entry for `id`, if alive.
    #[must_use]
    pub fn get(&self, id: TrackId) -> Option<&RegistryEntry<H>> {
        if self.slot_generation(id) {
            self.slots[id.idx as usize].as_ref()
        } else {
            None
        }
    }

    pub(crate) fn get_mut(&mut self, id: TrackId) -> Option<&mut RegistryEntry<H>> {
        if self.slot_generation(id) {
            self.slots[id.idx as usize].as_mut()
        } else {
            None
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no element is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Handles of every live entry, in slot order.
    #[must_use]
    pub fn ids(&self) -> Vec<TrackId> {
        self.iter().map(|(id, _)| id).collect()
    }

    /// Iterates live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &RegistryEntry<H>)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.as_ref().map(|entry| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "slot indices originate from u32"
                )]
                let idx = i as u32;
                (
                    TrackId {
                        idx,
                        generation: self.generation[i],
                    },
                    entry,
                )
            })
        })
    }

    /// Resolves `el` to its entry through the element's tag.
    ///
    /// A tag only counts when its entry holds this very element, so elements
    /// that inherited a tag (clones, stale markup) read as unregistered.
    #[must_use]
    pub fn lookup(&self, host: &H, el: &H::Element) -> Option<TrackId> {
        let id = host.track_tag(el)?;
        self.get(id).filter(|entry| entry.element == *el).map(|_| id)
    }

    /// Whether some entry owns `overlay`.
    ///
    /// Goes through the overlay's stamp, like [`lookup`](Self::lookup) does
    /// for elements.
    #[must_use]
    pub fn owns_overlay(&self, host: &H, overlay: &H::Overlay) -> bool {
        host.overlay_tag(overlay)
            .and_then(|id| self.get(id))
            .is_some_and(|entry| entry.overlay == *overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDom;

    fn entry(dom: &mut FakeDom) -> RegistryEntry<FakeDom> {
        let body = dom.body();
        let parent = dom.add_div(Some(body));
        let video = dom.add_video(Some(parent), "v.mp4");
        let overlay = dom.create_overlay(&parent).unwrap();
        RegistryEntry::new(video, parent, overlay)
    }

    #[test]
    fn track_id_tag_round_trip() {
        let id = TrackId {
            idx: 3,
            generation: 1,
        };
        let tag = alloc::format!("{id}");
        assert_eq!(tag, "3.1");
        assert_eq!(tag.parse::<TrackId>(), Ok(id));
        assert_eq!("3".parse::<TrackId>(), Err(ParseTrackIdError));
        assert_eq!("a.b".parse::<TrackId>(), Err(ParseTrackIdError));
        assert_eq!(alloc::format!("{id:?}"), "TrackId(3@gen1)");
    }

    #[test]
    fn removed_handles_go_stale() {
        let mut dom = FakeDom::new();
        let mut reg = Registry::<FakeDom>::new();
        let id = reg.reserve();
        reg.insert(id, entry(&mut dom));
        assert!(reg.is_alive(id));
        assert_eq!(reg.len(), 1);

        assert!(reg.remove(id).is_some());
        assert!(!reg.is_alive(id));
        assert!(reg.get(id).is_none());
        assert!(reg.remove(id).is_none(), "second remove is a no-op");
        assert!(reg.is_empty());

        let reused = reg.reserve();
        assert_eq!(reused.index(), id.index(), "slot recycled");
        assert_ne!(reused.generation(), id.generation());
    }

    #[test]
    fn released_reservation_is_recycled() {
        let mut reg = Registry::<FakeDom>::new();
        let id = reg.reserve();
        reg.release(id);
        assert!(!reg.is_alive(id));
        let next = reg.reserve();
        assert_eq!(next.index(), id.index());
        assert_eq!(next.generation(), id.generation() + 1);
    }

    #[test]
    fn lookup_rejects_foreign_tags() {
        let mut dom = FakeDom::new();
        let mut reg = Registry::<FakeDom>::new();
        let e = entry(&mut dom);
        let video = e.element;
        let id = reg.reserve();
        reg.insert(id, e);
        dom.set_track_tag(&video, Some(id));
        assert_eq!(reg.lookup(&dom, &video), Some(id));

        // A clone carries the tag but is a different node.
        let clone = dom.add_video(None, "v.mp4");
        dom.set_track_tag(&clone, Some(id));
        assert_eq!(reg.lookup(&dom, &clone), None);
    }

    #[test]
    fn owns_overlay_matches_entries() {
        let mut dom = FakeDom::new();
        let mut reg = Registry::<FakeDom>::new();
        let e = entry(&mut dom);
        let overlay = e.overlay;
        let id = reg.reserve();
        reg.insert(id, e);
        assert!(!reg.owns_overlay(&dom, &overlay), "unwired overlays are unowned");
        let _listener = dom.wire_overlay(&overlay, id).unwrap();
        assert!(reg.owns_overlay(&dom, &overlay));

        // An overlay stamped with a live id it does not belong to.
        let elsewhere = dom.body();
        let stray = dom.create_overlay(&elsewhere).unwrap();
        let _stray_listener = dom.wire_overlay(&stray, id).unwrap();
        assert!(!reg.owns_overlay(&dom, &stray));
        assert_eq!(reg.ids(), [id]);
    }
}
