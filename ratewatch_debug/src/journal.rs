// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON event journal.
//!
//! [`JournalSink`] keeps every trace event as a JSON object and exports them
//! as one array, suitable for attaching to bug reports or diffing between
//! runs. Install it through an `Rc<RefCell<JournalSink>>` to read it back
//! while the engine still owns the sink.
//!
//! Every entry has `"kind"` and `"at"` (host milliseconds); the remaining
//! fields depend on the kind.

use std::io::{self, Write};

use serde_json::{Value, json};

use ratewatch_core::registry::TrackId;
use ratewatch_core::trace::{
    ApplyEvent, ApplyOutcome, AttachEvent, DetachEvent, GestureEvent, ReconcileEvent, SignalEvent,
    SpeedChangeEvent, TraceSink,
};

use crate::pretty::{gesture_name, reason_name, signal_name};

/// Records trace events as JSON values.
#[derive(Debug, Default)]
pub struct JournalSink {
    entries: Vec<Value>,
    capacity: Option<usize>,
    dropped: u64,
}

impl JournalSink {
    /// Creates an unbounded journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal that keeps only the newest `capacity` entries.
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    /// Recorded entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    /// Number of entries evicted by the capacity bound.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }

    /// The journal as a JSON array.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.entries.clone())
    }

    /// Writes the journal as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Propagates I/O errors from `writer`.
    pub fn export(&self, writer: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *writer, &self.entries)?;
        writeln!(writer)
    }

    fn push(&mut self, entry: Value) {
        if let Some(capacity) = self.capacity
            && self.entries.len() >= capacity
        {
            self.entries.remove(0);
            self.dropped += 1;
        }
        self.entries.push(entry);
    }
}

fn id(id: TrackId) -> String {
    id.to_string()
}

impl TraceSink for JournalSink {
    fn on_attach(&mut self, e: &AttachEvent) {
        self.push(json!({
            "kind": "attach",
            "at": e.at.millis(),
            "id": id(e.id),
            "speed": e.speed,
        }));
    }

    fn on_detach(&mut self, e: &DetachEvent) {
        self.push(json!({
            "kind": "detach",
            "at": e.at.millis(),
            "id": id(e.id),
            "reason": reason_name(e.reason),
        }));
    }

    fn on_signal(&mut self, e: &SignalEvent) {
        self.push(json!({
            "kind": "signal",
            "at": e.at.millis(),
            "signal": signal_name(e.signal),
            "due": e.due.millis(),
        }));
    }

    fn on_reconcile(&mut self, e: &ReconcileEvent) {
        let r = &e.report;
        self.push(json!({
            "kind": "reconcile",
            "at": e.at.millis(),
            "strays_removed": r.strays_removed,
            "repaired": r.repaired,
            "attached": r.attached,
            "detached": r.detached,
            "failed": r.failed,
            "tracked": r.tracked,
        }));
    }

    fn on_speed_change(&mut self, e: &SpeedChangeEvent) {
        self.push(json!({
            "kind": "speed_change",
            "at": e.at.millis(),
            "from": e.from,
            "to": e.to,
            "origin": e.origin.map(id),
        }));
    }

    fn on_gesture(&mut self, e: &GestureEvent) {
        self.push(json!({
            "kind": "gesture",
            "at": e.at.millis(),
            "target": id(e.target),
            "gesture": gesture_name(e.gesture),
        }));
    }

    fn on_apply(&mut self, e: &ApplyEvent) {
        self.push(json!({
            "kind": "apply",
            "at": e.at.millis(),
            "id": id(e.id),
            "rate": e.rate,
            "deferred": e.deferred,
            "ok": e.outcome == ApplyOutcome::Applied,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratewatch_core::input::Gesture;
    use ratewatch_core::time::HostTime;

    fn track(s: &str) -> TrackId {
        s.parse().unwrap()
    }

    #[test]
    fn records_fields_per_kind() {
        let mut journal = JournalSink::new();
        journal.on_gesture(&GestureEvent {
            target: track("2.1"),
            gesture: Gesture::Reset,
            at: HostTime(300),
        });
        journal.on_speed_change(&SpeedChangeEvent {
            from: 2.0,
            to: 1.0,
            origin: Some(track("2.1")),
            at: HostTime(300),
        });

        let entries = journal.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["kind"], "gesture");
        assert_eq!(entries[0]["target"], "2.1");
        assert_eq!(entries[0]["gesture"], "reset");
        assert_eq!(entries[1]["origin"], "2.1");
        assert_eq!(entries[1]["to"], 1.0);
    }

    #[test]
    fn api_origin_is_null() {
        let mut journal = JournalSink::new();
        journal.on_speed_change(&SpeedChangeEvent {
            from: 1.0,
            to: 1.5,
            origin: None,
            at: HostTime(0),
        });
        assert!(journal.entries()[0]["origin"].is_null());
    }

    #[test]
    fn bounded_journal_drops_oldest() {
        let mut journal = JournalSink::bounded(2);
        for at in 0..3 {
            journal.on_apply(&ApplyEvent {
                id: track("0.0"),
                rate: 1.25,
                deferred: at > 0,
                outcome: ApplyOutcome::Applied,
                at: HostTime(at),
            });
        }
        assert_eq!(journal.entries().len(), 2);
        assert_eq!(journal.dropped(), 1);
        assert_eq!(journal.entries()[0]["at"], 1);
    }

    #[test]
    fn export_writes_a_json_array() {
        let mut journal = JournalSink::new();
        journal.on_signal(&SignalEvent {
            signal: ratewatch_core::watch::Signal::Location,
            at: HostTime(10),
            due: HostTime(260),
        });
        let mut out = Vec::new();
        journal.export(&mut out).unwrap();
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, journal.to_json());
        assert_eq!(parsed[0]["due"], 260);
    }
}
