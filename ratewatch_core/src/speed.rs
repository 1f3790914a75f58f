// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The speed state store.
//!
//! [`SpeedState`] answers "what is the speed": the global current speed, the
//! speed last applied to each source, and the recent custom speeds. It never
//! touches elements; telling elements about a speed is the engine's job.

use alloc::string::{String, ToString as _};
use alloc::vec::Vec;
use alloc::format;

use hashbrown::HashMap;

use crate::config::{EngineConfig, SourceKeyPolicy};
use crate::error::{HistoryError, SpeedError};
use crate::history::BoundedHistory;
use crate::host::KeyValueStore;

/// Slowest accepted speed.
pub const MIN_SPEED: f64 = 0.1;

/// Fastest accepted speed.
pub const MAX_SPEED: f64 = 16.0;

/// Tolerance used when comparing speeds for equality.
pub(crate) const SPEED_EPSILON: f64 = 1e-9;

/// Whether `speed` is finite and within [`MIN_SPEED`]`..=`[`MAX_SPEED`].
#[inline]
#[must_use]
pub fn is_valid_speed(speed: f64) -> bool {
    speed.is_finite() && (MIN_SPEED..=MAX_SPEED).contains(&speed)
}

/// Checks a speed and returns it unchanged when usable.
///
/// # Errors
///
/// Returns [`SpeedError::OutOfRange`] for NaN, infinite, or out-of-range
/// values.
pub fn validate_speed(speed: f64) -> Result<f64, SpeedError> {
    if is_valid_speed(speed) {
        Ok(speed)
    } else {
        Err(SpeedError::OutOfRange(speed))
    }
}

/// Parses user input into a speed.
///
/// # Errors
///
/// Returns [`SpeedError::NotANumber`] if `text` does not parse, and
/// [`SpeedError::OutOfRange`] if it parses to an unusable value.
pub fn parse_speed(text: &str) -> Result<f64, SpeedError> {
    let trimmed = text.trim();
    let speed: f64 = trimmed
        .parse()
        .map_err(|_| SpeedError::NotANumber(trimmed.to_string()))?;
    validate_speed(speed)
}

/// Formats a speed the way overlays display it, e.g. `"1.50x"`.
#[must_use]
pub fn format_speed(speed: f64) -> String {
    format!("{speed:.2}x")
}

/// Identity of a media source for remembered speeds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(String);

impl SourceKey {
    /// Derives a key from a source URL. Returns `None` for empty sources.
    #[must_use]
    pub fn from_source(source: &str, policy: SourceKeyPolicy) -> Option<Self> {
        let source = source.trim();
        let key = match policy {
            SourceKeyPolicy::Literal => source,
            SourceKeyPolicy::IgnoreQuery => source
                .split(['?', '#'])
                .next()
                .unwrap_or(source),
        };
        (!key.is_empty()).then(|| Self(key.to_string()))
    }

    /// The key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Global speed, per-source remembered speeds, and custom-speed history.
#[derive(Debug, Clone)]
pub struct SpeedState {
    current: f64,
    remembered: HashMap<SourceKey, f64>,
    custom: BoundedHistory<f64>,
    history_key: String,
}

impl SpeedState {
    /// Creates a state at `initial` speed with an empty history.
    ///
    /// An unusable `initial` falls back to 1.0.
    #[must_use]
    pub fn new(initial: f64, history_capacity: usize, history_key: &str) -> Self {
        Self {
            current: if is_valid_speed(initial) { initial } else { 1.0 },
            remembered: HashMap::new(),
            custom: BoundedHistory::with_capacity(history_capacity),
            history_key: history_key.to_string(),
        }
    }

    /// Creates a state at the configured default speed and restores the
    /// custom-speed history from `store`.
    ///
    /// A malformed stored history is logged and treated as empty.
    pub fn load(config: &EngineConfig, store: &dyn KeyValueStore) -> Self {
        let mut state = Self::new(
            config.default_speed,
            config.history_capacity,
            &config.history_key,
        );
        let raw = store.get(&config.history_key, "[]");
        match parse_history(&raw) {
            Ok(speeds) => {
                for speed in speeds.into_iter().filter(|&s| is_valid_speed(s)) {
                    state.custom.push(speed);
                }
            }
            Err(err) => tracing::warn!(%err, "ignoring stored custom speeds"),
        }
        state
    }

    /// The current global speed.
    #[inline]
    #[must_use]
    pub fn get(&self) -> f64 {
        self.current
    }

    /// Sets the global speed. Does not touch any element.
    ///
    /// # Errors
    ///
    /// Returns [`SpeedError::OutOfRange`] and leaves the state unchanged if
    /// `speed` is unusable.
    pub fn set_global(&mut self, speed: f64) -> Result<(), SpeedError> {
        self.current = validate_speed(speed)?;
        Ok(())
    }

    /// Remembers `speed` as the last speed used for `key`.
    pub fn remember_for_source(&mut self, key: &SourceKey, speed: f64) {
        if is_valid_speed(speed) {
            self.remembered.insert(key.clone(), speed);
        }
    }

    /// Returns the speed remembered for `key`, or the current speed.
    #[must_use]
    pub fn recall(&self, key: Option<&SourceKey>) -> f64 {
        key.and_then(|k| self.remembered.get(k).copied())
            .unwrap_or(self.current)
    }

    /// Number of sources with a remembered speed.
    #[must_use]
    pub fn remembered_count(&self) -> usize {
        self.remembered.len()
    }

    /// Recent custom speeds, oldest first.
    #[must_use]
    pub fn custom_speeds(&self) -> Vec<f64> {
        self.custom.iter().copied().collect()
    }

    /// Appends `speed` to the custom history unless already present, evicting
    /// the oldest entry beyond capacity, and persists the result.
    ///
    /// Returns whether the history changed.
    pub fn record_custom(&mut self, speed: f64, store: &mut dyn KeyValueStore) -> bool {
        if !is_valid_speed(speed)
            || self
                .custom
                .iter()
                .any(|&s| (s - speed).abs() < SPEED_EPSILON)
        {
            return false;
        }
        self.custom.push(speed);
        match serde_json::to_string(&self.custom_speeds()) {
            Ok(json) => store.set(&self.history_key, &json),
            Err(err) => tracing::warn!(%err, "failed to serialize custom speeds"),
        }
        true
    }
}

fn parse_history(raw: &str) -> Result<Vec<f64>, HistoryError> {
    serde_json::from_str(raw).map_err(|err| HistoryError::Malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryStore;

    fn state() -> SpeedState {
        SpeedState::new(1.0, 10, "speeds")
    }

    #[test]
    fn set_global_rejects_out_of_range() {
        let mut s = state();
        assert_eq!(s.set_global(0.05), Err(SpeedError::OutOfRange(0.05)));
        assert!(s.set_global(f64::NAN).is_err());
        assert!(s.set_global(16.5).is_err());
        assert!((s.get() - 1.0).abs() < SPEED_EPSILON, "state unchanged");

        s.set_global(16.0).unwrap();
        assert!((s.get() - 16.0).abs() < SPEED_EPSILON);
    }

    #[test]
    fn parse_speed_accepts_trimmed_numbers_only() {
        assert_eq!(parse_speed(" 4 "), Ok(4.0));
        assert_eq!(
            parse_speed("abc"),
            Err(SpeedError::NotANumber("abc".to_string()))
        );
        assert_eq!(parse_speed("20"), Err(SpeedError::OutOfRange(20.0)));
        assert!(parse_speed("inf").is_err());
    }

    #[test]
    fn format_speed_uses_two_decimals() {
        assert_eq!(format_speed(3.0), "3.00x");
        assert_eq!(format_speed(0.75), "0.75x");
    }

    #[test]
    fn recall_falls_back_to_current() {
        let mut s = state();
        let key = SourceKey::from_source("https://a/v.mp4", SourceKeyPolicy::Literal).unwrap();
        assert!((s.recall(Some(&key)) - 1.0).abs() < SPEED_EPSILON);
        assert!((s.recall(None) - 1.0).abs() < SPEED_EPSILON);

        s.remember_for_source(&key, 2.5);
        s.set_global(1.25).unwrap();
        assert!((s.recall(Some(&key)) - 2.5).abs() < SPEED_EPSILON);
        assert!((s.recall(None) - 1.25).abs() < SPEED_EPSILON);
        assert_eq!(s.remembered_count(), 1);
    }

    #[test]
    fn source_key_policies() {
        let url = "https://cdn/v.mp4?sig=abc#t=10";
        assert_eq!(
            SourceKey::from_source(url, SourceKeyPolicy::Literal)
                .unwrap()
                .as_str(),
            url
        );
        assert_eq!(
            SourceKey::from_source(url, SourceKeyPolicy::IgnoreQuery)
                .unwrap()
                .as_str(),
            "https://cdn/v.mp4"
        );
        assert_eq!(SourceKey::from_source("  ", SourceKeyPolicy::Literal), None);
    }

    #[test]
    fn record_custom_dedups_and_persists() {
        let mut s = state();
        let mut store = MemoryStore::new();
        assert!(s.record_custom(4.0, &mut store));
        assert!(!s.record_custom(4.0, &mut store), "duplicate ignored");
        assert_eq!(s.custom_speeds(), [4.0]);
        assert_eq!(store.get("speeds", ""), "[4.0]");
    }

    #[test]
    fn record_custom_evicts_oldest_beyond_capacity() {
        let mut s = SpeedState::new(1.0, 3, "speeds");
        let mut store = MemoryStore::new();
        for speed in [1.1, 1.2, 1.3, 1.4] {
            s.record_custom(speed, &mut store);
        }
        assert_eq!(s.custom_speeds(), [1.2, 1.3, 1.4]);
        assert_eq!(store.get("speeds", ""), "[1.2,1.3,1.4]");
    }

    #[test]
    fn load_restores_valid_history() {
        let mut store = MemoryStore::new();
        let config = EngineConfig::web();
        store.set(&config.history_key, "[2.2, 99, 3.3]");
        let s = SpeedState::load(&config, &store);
        assert_eq!(s.custom_speeds(), [2.2, 3.3], "out-of-range entry dropped");
        assert!((s.get() - config.default_speed).abs() < SPEED_EPSILON);
    }

    #[test]
    fn load_ignores_malformed_history() {
        let mut store = MemoryStore::new();
        let config = EngineConfig::web();
        store.set(&config.history_key, "not json");
        let s = SpeedState::load(&config, &store);
        assert!(s.custom_speeds().is_empty());
    }
}
