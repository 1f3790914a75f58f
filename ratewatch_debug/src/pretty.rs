// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are host milliseconds.

use std::io::Write;

use ratewatch_core::input::Gesture;
use ratewatch_core::trace::{
    ApplyEvent, ApplyOutcome, AttachEvent, DetachEvent, DetachReason, GestureEvent, ReconcileEvent,
    SignalEvent, SpeedChangeEvent, TraceSink,
};
use ratewatch_core::watch::Signal;

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink, returning its writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

pub(crate) fn reason_name(reason: DetachReason) -> &'static str {
    match reason {
        DetachReason::Invalid => "invalid",
        DetachReason::Repair => "repair",
        DetachReason::Requested => "requested",
    }
}

pub(crate) fn signal_name(signal: Signal) -> &'static str {
    match signal {
        Signal::Structure => "structure",
        Signal::Location => "location",
        Signal::Visibility => "visibility",
    }
}

pub(crate) fn gesture_name(gesture: Gesture) -> &'static str {
    match gesture {
        Gesture::Cycle => "cycle",
        Gesture::Reset => "reset",
        Gesture::Custom => "custom",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_attach(&mut self, e: &AttachEvent) {
        let _ = writeln!(
            self.writer,
            "[attach] {}ms id={} speed={:.2}",
            e.at.millis(), e.id, e.speed,
        );
    }

    fn on_detach(&mut self, e: &DetachEvent) {
        let _ = writeln!(
            self.writer,
            "[detach] {}ms id={} reason={}",
            e.at.millis(),
            e.id,
            reason_name(e.reason),
        );
    }

    fn on_signal(&mut self, e: &SignalEvent) {
        let _ = writeln!(
            self.writer,
            "[signal] {}ms {} due={}ms",
            e.at.millis(),
            signal_name(e.signal),
            e.due.millis(),
        );
    }

    fn on_reconcile(&mut self, e: &ReconcileEvent) {
        let r = &e.report;
        let _ = writeln!(
            self.writer,
            "[reconcile] {}ms +{} -{} repaired={} strays={} failed={} tracked={}",
            e.at.millis(), r.attached, r.detached, r.repaired, r.strays_removed, r.failed, r.tracked,
        );
    }

    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        let origin = e
            .origin
            .map_or_else(|| "api".to_string(), |id| id.to_string());
        let _ = writeln!(
            self.writer,
            "[speed] {}ms {:.2} -> {:.2} origin={origin}",
            e.at.millis(), e.from, e.to,
        );
    }

    fn on_gesture(&mut self, e: &GestureEvent) {
        let _ = writeln!(
            self.writer,
            "[gesture] {}ms target={} {}",
            e.at.millis(),
            e.target,
            gesture_name(e.gesture),
        );
    }

    fn on_apply(&mut self, e: &ApplyEvent) {
        let outcome = match e.outcome {
            ApplyOutcome::Applied => "ok",
            ApplyOutcome::Failed => "FAILED",
        };
        let deferred = if e.deferred { " deferred" } else { "" };
        let _ = writeln!(
            self.writer,
            "[apply] {}ms id={} rate={:.2}{deferred} {outcome}",
            e.at.millis(), e.id, e.rate,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratewatch_core::engine::ReconcileReport;
    use ratewatch_core::time::HostTime;

    fn lines(sink: PrettyPrintSink<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn pretty_print_speed_change() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_speed_change(&SpeedChangeEvent {
            from: 1.0,
            to: 2.5,
            origin: None,
            at: HostTime(1200),
        });
        let output = lines(sink);
        assert!(output.contains("[speed]"), "got: {output}");
        assert!(output.contains("1.00 -> 2.50"), "got: {output}");
        assert!(output.contains("origin=api"), "got: {output}");
    }

    #[test]
    fn pretty_print_reconcile_summary() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_reconcile(&ReconcileEvent {
            at: HostTime(5),
            report: ReconcileReport {
                attached: 2,
                detached: 1,
                tracked: 3,
                ..ReconcileReport::default()
            },
        });
        let output = lines(sink);
        assert!(output.starts_with("[reconcile]"), "got: {output}");
        assert!(output.contains("+2 -1"), "got: {output}");
        assert!(output.contains("tracked=3"), "got: {output}");
    }

    #[test]
    fn one_line_per_event() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        let id = "0.0".parse().unwrap();
        sink.on_attach(&AttachEvent {
            id,
            speed: 1.0,
            at: HostTime(0),
        });
        sink.on_detach(&DetachEvent {
            id,
            reason: DetachReason::Invalid,
            at: HostTime(10),
        });
        let output = lines(sink);
        assert_eq!(output.lines().count(), 2, "got: {output}");
        assert!(output.contains("reason=invalid"), "got: {output}");
    }
}
