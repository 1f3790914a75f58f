// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debug surface over a running engine.

use alloc::vec::Vec;
use core::fmt;

use crate::engine::{Engine, ReconcileReport};
use crate::error::SpeedError;
use crate::host::MediaHost;

/// Read and poke a running [`Engine`] from a console or test harness.
pub struct Inspector<'a, H: MediaHost> {
    engine: &'a mut Engine<H>,
}

impl<H: MediaHost> fmt::Debug for Inspector<'_, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inspector")
            .field("engine", &self.engine)
            .finish()
    }
}

impl<'a, H: MediaHost> Inspector<'a, H> {
    /// Borrows `engine` for inspection.
    pub fn new(engine: &'a mut Engine<H>) -> Self {
        Self { engine }
    }

    /// The current global speed.
    #[must_use]
    pub fn current_speed(&self) -> f64 {
        self.engine.speed().get()
    }

    /// Sets the global speed on every tracked element.
    ///
    /// # Errors
    ///
    /// Returns [`SpeedError::OutOfRange`] for unusable speeds.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), SpeedError> {
        self.engine.propagate_speed(speed, None)
    }

    /// Recent custom speeds, oldest first.
    #[must_use]
    pub fn custom_speeds(&self) -> Vec<f64> {
        self.engine.speed().custom_speeds()
    }

    /// Runs a reconciliation pass now.
    pub fn refresh(&mut self) -> ReconcileReport {
        self.engine.reconcile_all()
    }

    /// Number of tracked media elements.
    #[must_use]
    pub fn video_count(&self) -> usize {
        let mut count = 0;
        self.engine.for_each_tracked(|_, _| count += 1);
        count
    }
}
