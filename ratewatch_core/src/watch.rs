// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rescan signals and their debounce.

use crate::host::{MutationRecord, NavigationEvent};
use crate::time::{Duration, HostTime};

/// Why a rescan was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Media elements were inserted, removed, or mutated.
    Structure,
    /// The document navigated without reloading.
    Location,
    /// The document became visible or hidden.
    Visibility,
}

impl Signal {
    /// Maps a mutation to a signal, or `None` if no media element was
    /// involved (our own overlay insertions, for instance).
    #[must_use]
    pub fn from_mutation(record: MutationRecord) -> Option<Self> {
        record.is_relevant().then_some(Self::Structure)
    }

    /// Every navigation is a location signal.
    #[must_use]
    pub const fn from_navigation(_event: NavigationEvent) -> Self {
        Self::Location
    }
}

/// Trailing debounce for rescan requests.
///
/// Each request pushes the single pending deadline out to `now + delay`, so a
/// burst of signals yields one pass after the burst goes quiet.
#[derive(Clone, Debug)]
pub struct RescanDebounce {
    delay: Duration,
    due: Option<HostTime>,
    coalesced: u32,
}

impl RescanDebounce {
    /// Creates an idle debounce.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            due: None,
            coalesced: 0,
        }
    }

    /// Requests a rescan.
    pub fn request(&mut self, now: HostTime) {
        self.coalesced = self.coalesced.saturating_add(1);
        self.due = Some(now + self.delay);
    }

    /// Takes the pending rescan if it is due at `now`. Returns how many
    /// requests it stands for.
    pub fn take_due(&mut self, now: HostTime) -> Option<u32> {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                Some(core::mem::take(&mut self.coalesced))
            }
            _ => None,
        }
    }

    /// When the pending rescan is due.
    #[must_use]
    pub fn deadline(&self) -> Option<HostTime> {
        self.due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irrelevant_mutations_raise_nothing() {
        let own_overlay = MutationRecord::ChildList {
            added_media: false,
            removed_media: false,
        };
        assert_eq!(Signal::from_mutation(own_overlay), None);
        assert_eq!(
            Signal::from_mutation(MutationRecord::Attribute { on_media: true }),
            Some(Signal::Structure)
        );
        assert_eq!(
            Signal::from_navigation(NavigationEvent::Pop),
            Signal::Location
        );
    }

    #[test]
    fn burst_collapses_into_one_trailing_pass() {
        let mut debounce = RescanDebounce::new(Duration(250));
        debounce.request(HostTime(0));
        debounce.request(HostTime(100));
        debounce.request(HostTime(200));
        assert_eq!(debounce.deadline(), Some(HostTime(450)));
        assert_eq!(debounce.take_due(HostTime(300)), None, "pushed out");
        assert_eq!(debounce.take_due(HostTime(450)), Some(3));
        assert_eq!(debounce.take_due(HostTime(900)), None);
        assert_eq!(debounce.deadline(), None);
    }
}
