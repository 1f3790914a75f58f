// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Trace events from the engine.
//!
//! [`TraceSink`] has one method per event the engine emits. All method bodies
//! default to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] owns an optional boxed sink. When the `trace` feature is
//! **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! A sink handed to the engine is owned by it. To read what a sink collected
//! while the engine is still running, hand over an `Rc<RefCell<S>>` and keep a
//! clone; it forwards every event to the inner sink.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::engine::ReconcileReport;
use crate::input::Gesture;
use crate::registry::TrackId;
use crate::time::HostTime;
use crate::watch::Signal;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why an element left the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetachReason {
    /// The element stopped being a valid target.
    Invalid,
    /// Its overlay was removed by someone else; it is re-attached next.
    Repair,
    /// An explicit `detach` call.
    Requested,
}

/// How applying a rate to one element went.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApplyOutcome {
    /// Rate set; playback re-asserted if it was playing.
    Applied,
    /// The host refused the rate or the resume.
    Failed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when an element comes under management.
#[derive(Clone, Copy, Debug)]
pub struct AttachEvent {
    /// The new handle.
    pub id: TrackId,
    /// Speed applied on attach.
    pub speed: f64,
    /// Host time of the last entry point.
    pub at: HostTime,
}

/// Emitted when an element leaves management.
#[derive(Clone, Copy, Debug)]
pub struct DetachEvent {
    /// The freed handle.
    pub id: TrackId,
    /// Why it was detached.
    pub reason: DetachReason,
    /// Host time of the last entry point.
    pub at: HostTime,
}

/// Emitted when a signal schedules a rescan.
#[derive(Clone, Copy, Debug)]
pub struct SignalEvent {
    /// What happened.
    pub signal: Signal,
    /// When it was received.
    pub at: HostTime,
    /// When the debounced rescan is now due.
    pub due: HostTime,
}

/// Emitted after each reconciliation pass.
#[derive(Clone, Copy, Debug)]
pub struct ReconcileEvent {
    /// Host time of the pass.
    pub at: HostTime,
    /// What the pass did.
    pub report: ReconcileReport,
}

/// Emitted when the global speed changes.
#[derive(Clone, Copy, Debug)]
pub struct SpeedChangeEvent {
    /// Previous global speed.
    pub from: f64,
    /// New global speed.
    pub to: f64,
    /// Element the change originated from, if any.
    pub origin: Option<TrackId>,
    /// Host time of the change.
    pub at: HostTime,
}

/// Emitted when a pointer burst resolves.
#[derive(Clone, Copy, Debug)]
pub struct GestureEvent {
    /// Overlay the gesture was aimed at.
    pub target: TrackId,
    /// What it resolved to.
    pub gesture: Gesture,
    /// Host time of resolution.
    pub at: HostTime,
}

/// Emitted after a rate is applied to one element.
#[derive(Clone, Copy, Debug)]
pub struct ApplyEvent {
    /// Element the rate was applied to.
    pub id: TrackId,
    /// Rate requested.
    pub rate: f64,
    /// Whether it came from the deferred queue.
    pub deferred: bool,
    /// How it went.
    pub outcome: ApplyOutcome,
    /// Host time of the apply.
    pub at: HostTime,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the engine.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when an element is attached.
    fn on_attach(&mut self, e: &AttachEvent) {
        _ = e;
    }

    /// Called when an element is detached.
    fn on_detach(&mut self, e: &DetachEvent) {
        _ = e;
    }

    /// Called when a signal schedules a rescan.
    fn on_signal(&mut self, e: &SignalEvent) {
        _ = e;
    }

    /// Called after each reconciliation pass.
    fn on_reconcile(&mut self, e: &ReconcileEvent) {
        _ = e;
    }

    /// Called when the global speed changes.
    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        _ = e;
    }

    /// Called when a pointer burst resolves.
    fn on_gesture(&mut self, e: &GestureEvent) {
        _ = e;
    }

    /// Called after each per-element apply.
    fn on_apply(&mut self, e: &ApplyEvent) {
        _ = e;
    }
}

impl<S: TraceSink + ?Sized> TraceSink for Rc<RefCell<S>> {
    fn on_attach(&mut self, e: &AttachEvent) {
        self.borrow_mut().on_attach(e);
    }

    fn on_detach(&mut self, e: &DetachEvent) {
        self.borrow_mut().on_detach(e);
    }

    fn on_signal(&mut self, e: &SignalEvent) {
        self.borrow_mut().on_signal(e);
    }

    fn on_reconcile(&mut self, e: &ReconcileEvent) {
        self.borrow_mut().on_reconcile(e);
    }

    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        self.borrow_mut().on_speed_change(e);
    }

    fn on_gesture(&mut self, e: &GestureEvent) {
        self.borrow_mut().on_gesture(e);
    }

    fn on_apply(&mut self, e: &ApplyEvent) {
        self.borrow_mut().on_apply(e);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Owns an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, the sink is dropped on arrival and
/// every method compiles to nothing.
#[derive(Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Box<dyn TraceSink>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $e:ident) => {{
        #[cfg(feature = "trace")]
        if let Some(s) = &mut $self.sink {
            s.$method($e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = $e;
        }
    }};
}

impl Tracer {
    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Replaces the sink, returning the previous one.
    pub fn set_sink(&mut self, sink: Option<Box<dyn TraceSink>>) -> Option<Box<dyn TraceSink>> {
        #[cfg(feature = "trace")]
        {
            core::mem::replace(&mut self.sink, sink)
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            None
        }
    }

    /// Emits an [`AttachEvent`].
    #[inline]
    pub fn attach(&mut self, e: &AttachEvent) {
        dispatch!(self, on_attach, e);
    }

    /// Emits a [`DetachEvent`].
    #[inline]
    pub fn detach(&mut self, e: &DetachEvent) {
        dispatch!(self, on_detach, e);
    }

    /// Emits a [`SignalEvent`].
    #[inline]
    pub fn signal(&mut self, e: &SignalEvent) {
        dispatch!(self, on_signal, e);
    }

    /// Emits a [`ReconcileEvent`].
    #[inline]
    pub fn reconcile(&mut self, e: &ReconcileEvent) {
        dispatch!(self, on_reconcile, e);
    }

    /// Emits a [`SpeedChangeEvent`].
    #[inline]
    pub fn speed_change(&mut self, e: &SpeedChangeEvent) {
        dispatch!(self, on_speed_change, e);
    }

    /// Emits a [`GestureEvent`].
    #[inline]
    pub fn gesture(&mut self, e: &GestureEvent) {
        dispatch!(self, on_gesture, e);
    }

    /// Emits an [`ApplyEvent`].
    #[inline]
    pub fn apply(&mut self, e: &ApplyEvent) {
        dispatch!(self, on_apply, e);
    }
}
