// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pointer disambiguation.
//!
//! Browsers deliver `click`, `click`, `dblclick` for a double click, so a
//! single click cannot act immediately. [`ClickGate`] holds it for the click
//! window and only resolves it to [`Gesture::Cycle`] if no double click
//! arrives first.
//!
//! There is one window for the whole engine. A click on another overlay
//! replaces the pending one rather than stacking a second timer.

use crate::host::PointerKind;
use crate::registry::TrackId;
use crate::speed::SPEED_EPSILON;
use crate::time::{Duration, HostTime};

/// What a resolved pointer burst asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    /// Advance to the next preset.
    Cycle,
    /// Return to the default speed.
    Reset,
    /// Ask the user for a speed.
    Custom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClickState {
    Idle,
    PendingSingleClick { target: TrackId, deadline: HostTime },
}

/// Engine-wide single/double click state machine.
#[derive(Clone, Debug)]
pub struct ClickGate {
    state: ClickState,
    window: Duration,
}

impl ClickGate {
    /// Creates an idle gate with the given click window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            state: ClickState::Idle,
            window,
        }
    }

    /// Feeds one pointer event. Returns a gesture that resolves immediately.
    ///
    /// A plain click never resolves here; it arms the window and resolves in
    /// [`expire`](Self::expire).
    pub fn pointer(&mut self, kind: PointerKind, target: TrackId, now: HostTime) -> Option<Gesture> {
        match kind {
            PointerKind::Click => {
                self.state = ClickState::PendingSingleClick {
                    target,
                    deadline: now + self.window,
                };
                None
            }
            PointerKind::DoubleClick => {
                self.state = ClickState::Idle;
                Some(Gesture::Reset)
            }
            PointerKind::SecondaryClick => {
                self.state = ClickState::Idle;
                Some(Gesture::Custom)
            }
        }
    }

    /// Resolves a pending click whose window has elapsed at `now`.
    pub fn expire(&mut self, now: HostTime) -> Option<(TrackId, Gesture)> {
        match self.state {
            ClickState::PendingSingleClick { target, deadline } if now >= deadline => {
                self.state = ClickState::Idle;
                Some((target, Gesture::Cycle))
            }
            _ => None,
        }
    }

    /// When the pending click resolves, if one is pending.
    #[must_use]
    pub fn deadline(&self) -> Option<HostTime> {
        match self.state {
            ClickState::Idle => None,
            ClickState::PendingSingleClick { deadline, .. } => Some(deadline),
        }
    }
}

/// Returns the preset after `current`, wrapping from last to first.
///
/// A `current` that is not a preset counts as sitting before the first one.
/// Returns `current` unchanged if there are no presets.
#[must_use]
pub fn next_preset(presets: &[f64], current: f64) -> f64 {
    if presets.is_empty() {
        return current;
    }
    let next = presets
        .iter()
        .position(|&p| (p - current).abs() < SPEED_EPSILON)
        .map_or(0, |idx| (idx + 1) % presets.len());
    presets[next]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::testing::FakeDom;

    fn ids() -> (TrackId, TrackId) {
        let mut reg = Registry::<FakeDom>::new();
        (reg.reserve(), reg.reserve())
    }

    #[test]
    fn single_click_resolves_after_window() {
        let (a, _) = ids();
        let mut gate = ClickGate::new(Duration(300));
        assert_eq!(gate.pointer(PointerKind::Click, a, HostTime(1000)), None);
        assert_eq!(gate.deadline(), Some(HostTime(1300)));
        assert_eq!(gate.expire(HostTime(1299)), None, "still inside window");
        assert_eq!(gate.expire(HostTime(1300)), Some((a, Gesture::Cycle)));
        assert_eq!(gate.expire(HostTime(5000)), None, "fires once");
        assert_eq!(gate.deadline(), None);
    }

    #[test]
    fn double_click_cancels_pending_click() {
        let (a, _) = ids();
        let mut gate = ClickGate::new(Duration(300));
        gate.pointer(PointerKind::Click, a, HostTime(0));
        gate.pointer(PointerKind::Click, a, HostTime(80));
        assert_eq!(
            gate.pointer(PointerKind::DoubleClick, a, HostTime(90)),
            Some(Gesture::Reset)
        );
        assert_eq!(gate.expire(HostTime(1000)), None, "no cycle after reset");
    }

    #[test]
    fn secondary_click_is_custom_and_cancels() {
        let (a, _) = ids();
        let mut gate = ClickGate::new(Duration(300));
        gate.pointer(PointerKind::Click, a, HostTime(0));
        assert_eq!(
            gate.pointer(PointerKind::SecondaryClick, a, HostTime(10)),
            Some(Gesture::Custom)
        );
        assert_eq!(gate.deadline(), None);
    }

    #[test]
    fn new_click_replaces_pending_one() {
        let (a, b) = ids();
        let mut gate = ClickGate::new(Duration(300));
        gate.pointer(PointerKind::Click, a, HostTime(0));
        gate.pointer(PointerKind::Click, b, HostTime(200));
        assert_eq!(gate.expire(HostTime(300)), None, "old deadline dropped");
        assert_eq!(gate.expire(HostTime(500)), Some((b, Gesture::Cycle)));
    }

    #[test]
    fn cycle_advances_and_wraps() {
        let presets = [0.75, 1.0, 1.5, 2.0];
        assert!((next_preset(&presets, 1.5) - 2.0).abs() < SPEED_EPSILON);
        assert!((next_preset(&presets, 2.0) - 0.75).abs() < SPEED_EPSILON);
    }

    #[test]
    fn cycle_from_off_preset_starts_at_first() {
        let presets = [0.75, 1.0, 1.5, 2.0];
        assert!((next_preset(&presets, 1.3) - 0.75).abs() < SPEED_EPSILON);
        assert!((next_preset(&[], 1.3) - 1.3).abs() < SPEED_EPSILON);
    }
}
