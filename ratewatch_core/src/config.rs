// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration.

use alloc::string::{String, ToString as _};
use alloc::vec;
use alloc::vec::Vec;

use crate::speed::{MAX_SPEED, MIN_SPEED, is_valid_speed};
use crate::time::Duration;

/// Which corner of the element the overlay is anchored to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum Anchor {
    /// Top-left corner.
    #[default]
    TopLeft,
    /// Top-right corner.
    TopRight,
    /// Bottom-left corner.
    BottomLeft,
    /// Bottom-right corner.
    BottomRight,
}

/// How a media source URL is turned into a remembered-speed key.
///
/// The raw URL is ambiguous across query-string variations of the same
/// content (cache busters, tracking parameters, signed CDN links).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum SourceKeyPolicy {
    /// Use the source URL verbatim.
    #[default]
    Literal,
    /// Drop the query string and fragment before keying.
    IgnoreQuery,
}

/// Configuration for the [`Engine`](crate::engine::Engine).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct EngineConfig {
    /// Ordered speeds visited by a single click. Wraps from last to first.
    pub presets: Vec<f64>,
    /// Speed restored by a double click.
    pub default_speed: f64,
    /// How long a click waits for a following double click.
    pub click_window: Duration,
    /// Trailing debounce applied to rescan requests.
    pub rescan_delay: Duration,
    /// How many ancestors to inspect when resolving an overlay container.
    pub container_search_depth: u8,
    /// Relative width difference under which an ancestor counts as wrapping
    /// the element (0.1 = ±10%).
    pub container_width_tolerance: f64,
    /// Minimum gap, in px, between the overlay and its container's edges.
    pub edge_margin: f64,
    /// Corner the overlay is anchored to.
    pub anchor: Anchor,
    /// Offset, in px, from the anchored corner.
    pub anchor_inset: f64,
    /// How many custom speeds are remembered.
    pub history_capacity: usize,
    /// Storage key for the custom-speed history.
    pub history_key: String,
    /// How source URLs become remembered-speed keys.
    pub source_keys: SourceKeyPolicy,
}

impl EngineConfig {
    /// Default configuration for browser hosts.
    #[must_use]
    pub fn web() -> Self {
        Self {
            presets: vec![0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0, 2.5, 3.0],
            default_speed: 1.0,
            click_window: Duration::from_millis(300),
            rescan_delay: Duration::from_millis(250),
            container_search_depth: 5,
            container_width_tolerance: 0.1,
            edge_margin: 5.0,
            anchor: Anchor::TopLeft,
            anchor_inset: 10.0,
            history_capacity: 10,
            history_key: "ratewatch.customSpeeds".to_string(),
            source_keys: SourceKeyPolicy::Literal,
        }
    }

    /// Returns a copy with unusable values repaired.
    ///
    /// Presets that are NaN or out of range are dropped; if none remain the
    /// web presets are used. The default speed is clamped into range.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.presets.retain(|&p| is_valid_speed(p));
        if self.presets.is_empty() {
            self.presets = Self::web().presets;
        }
        self.default_speed = if self.default_speed.is_nan() {
            1.0
        } else {
            self.default_speed.clamp(MIN_SPEED, MAX_SPEED)
        };
        self.history_capacity = self.history_capacity.max(1);
        if !self.edge_margin.is_finite() || self.edge_margin < 0.0 {
            self.edge_margin = 0.0;
        }
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::web()
    }
}
