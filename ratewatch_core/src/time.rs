// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time in milliseconds.
//!
//! The engine never reads a clock itself. Hosts pass a [`HostTime`] into every
//! entry point that can start or fire a timer (e.g. `performance.now()` on the
//! web), and ask [`Engine::next_deadline`] when to call back.
//!
//! [`Duration`] uses the same millisecond units as [`HostTime`].
//!
//! [`Engine::next_deadline`]: crate::engine::Engine::next_deadline

use core::fmt;
use core::ops::{Add, Sub};

/// A point in time expressed as monotonic milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw millisecond value.
    #[inline]
    #[must_use]
    pub const fn millis(self) -> u64 {
        self.0
    }

    /// Creates a [`HostTime`] from a fractional millisecond timestamp such as
    /// `performance.now()`. Negative and non-finite inputs map to zero.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "timestamps are small positive f64 values; sub-millisecond precision is not needed"
    )]
    pub fn from_millis_f64(ms: f64) -> Self {
        if ms.is_finite() && ms > 0.0 {
            Self(ms as u64)
        } else {
            Self(0)
        }
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Saturating addition of a duration.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.0))
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        self.saturating_add(rhs)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        self.saturating_duration_since(rhs)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}ms)", self.0)
    }
}

/// A duration in milliseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(transparent))]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Creates a duration from whole milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// Returns the raw millisecond value.
    #[inline]
    #[must_use]
    pub const fn millis(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({}ms)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_millis_f64_truncates_and_clamps() {
        assert_eq!(HostTime::from_millis_f64(16.9), HostTime(16));
        assert_eq!(HostTime::from_millis_f64(-3.0), HostTime(0));
        assert_eq!(HostTime::from_millis_f64(f64::NAN), HostTime(0));
    }

    #[test]
    fn host_time_duration_ops() {
        let t = HostTime(1000);
        let d = Duration(200);
        assert_eq!((t + d).millis(), 1200);
        assert_eq!(t - HostTime(400), Duration(600));
        assert_eq!(t.saturating_duration_since(HostTime(1500)), Duration::ZERO);
    }

    #[test]
    fn addition_saturates() {
        let t = HostTime(u64::MAX - 1);
        assert_eq!(t + Duration(10), HostTime(u64::MAX), "must not overflow");
    }
}
