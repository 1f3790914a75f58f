// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reconciliation engine.
//!
//! [`Engine`] is the one context object a host holds. It owns the host, the
//! registry, the speed state, both debounces, and the deferred-apply queue.
//! Every host callback borrows it mutably for the duration of the callback,
//! so passes never overlap.
//!
//! # Event flow
//!
//! ```text
//!   MutationRecord ─┐
//!   NavigationEvent ├─► Signal ──► RescanDebounce ──► reconcile_all()
//!   visibility ─────┘                                    │
//!                                                        ▼
//!                                     attach / detach / repair overlays
//!
//!   PointerKind ──► ClickGate ──► Gesture ──► propagate_speed()
//!                                                │
//!                       origin: apply now ◄──────┤
//!                       others: deferred queue ◄─┘ ──► poll()
//! ```
//!
//! Time only enters through the `now` arguments. After each callback the host
//! asks [`Engine::next_deadline`] when to call [`Engine::poll`] next.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::config::EngineConfig;
use crate::error::{AttachError, SpeedError};
use crate::host::{
    KeyValueStore, MediaHost, MutationRecord, NavigationEvent, PointerKind, SpeedPrompt,
    WatchedAttr,
};
use crate::input::{ClickGate, Gesture, next_preset};
use crate::overlay::{place_overlay, resolve_container, still_contains};
use crate::registry::{Registry, RegistryEntry, TrackId};
use crate::speed::{MAX_SPEED, MIN_SPEED, SourceKey, SpeedState, format_speed, parse_speed};
use crate::time::HostTime;
use crate::trace::{
    ApplyEvent, ApplyOutcome, AttachEvent, DetachEvent, DetachReason, GestureEvent,
    ReconcileEvent, SignalEvent, SpeedChangeEvent, TraceSink, Tracer,
};
use crate::validity::is_valid;
use crate::watch::{RescanDebounce, Signal};

/// What one reconciliation pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Overlays found in the document that no entry owned.
    pub strays_removed: usize,
    /// Entries whose overlay had vanished and were re-attached.
    pub repaired: usize,
    /// Newly tracked elements.
    pub attached: usize,
    /// Elements that left management.
    pub detached: usize,
    /// Valid elements that could not be attached.
    pub failed: usize,
    /// Tracked elements after the pass.
    pub tracked: usize,
}

impl ReconcileReport {
    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.strays_removed == 0
            && self.repaired == 0
            && self.attached == 0
            && self.detached == 0
            && self.failed == 0
    }
}

/// Registry and synchronization engine for playback-rate overlays.
pub struct Engine<H: MediaHost> {
    host: H,
    config: EngineConfig,
    prompt: Box<dyn SpeedPrompt>,
    store: Box<dyn KeyValueStore>,
    speed: SpeedState,
    registry: Registry<H>,
    clicks: ClickGate,
    rescan: RescanDebounce,
    deferred: VecDeque<TrackId>,
    now: HostTime,
    tracer: Tracer,
}

impl<H: MediaHost> fmt::Debug for Engine<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("speed", &self.speed)
            .field("registry", &self.registry)
            .field("clicks", &self.clicks)
            .field("rescan", &self.rescan)
            .field("deferred", &self.deferred.len())
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl<H: MediaHost> Engine<H> {
    /// Creates an engine over `host`.
    ///
    /// The configuration is [sanitized](EngineConfig::sanitized) and the
    /// custom-speed history is restored from `store`. Nothing is attached
    /// until [`start`](Self::start) or [`reconcile_all`](Self::reconcile_all).
    pub fn new(
        host: H,
        config: EngineConfig,
        prompt: Box<dyn SpeedPrompt>,
        store: Box<dyn KeyValueStore>,
    ) -> Self {
        let config = config.sanitized();
        let speed = SpeedState::load(&config, store.as_ref());
        Self {
            clicks: ClickGate::new(config.click_window),
            rescan: RescanDebounce::new(config.rescan_delay),
            host,
            config,
            prompt,
            store,
            speed,
            registry: Registry::new(),
            deferred: VecDeque::new(),
            now: HostTime::default(),
            tracer: Tracer::none(),
        }
    }

    /// Runs the initial reconciliation pass.
    pub fn start(&mut self, now: HostTime) -> ReconcileReport {
        self.now = now;
        tracing::debug!(speed = self.speed.get(), "starting");
        self.reconcile_all()
    }

    // -- Accessors --

    /// The host.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The host, mutably. Changes made here are only noticed through the
    /// usual signals.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The speed state.
    #[must_use]
    pub fn speed(&self) -> &SpeedState {
        &self.speed
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &Registry<H> {
        &self.registry
    }

    /// The persistence collaborator.
    #[must_use]
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    /// Number of tracked elements.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.registry.len()
    }

    /// Installs a trace sink, returning the previous one. Without the
    /// `trace` feature the sink is dropped.
    pub fn set_trace_sink(
        &mut self,
        sink: Option<Box<dyn TraceSink>>,
    ) -> Option<Box<dyn TraceSink>> {
        self.tracer.set_sink(sink)
    }

    /// Calls `f` for every tracked element.
    pub fn for_each_tracked(&self, mut f: impl FnMut(TrackId, &H::Element)) {
        for (id, entry) in self.registry.iter() {
            f(id, &entry.element);
        }
    }

    // -- Reconciliation --

    /// Brings the registry in line with the document.
    ///
    /// Removes stray overlays, repairs entries whose overlay disappeared or
    /// whose element moved out of its container, attaches valid unregistered elements, and detaches registered elements
    /// that are no longer valid. Idempotent on a stable document.
    pub fn reconcile_all(&mut self) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for overlay in self.host.overlays_in_document() {
            if !self.registry.owns_overlay(&self.host, &overlay) {
                tracing::debug!(?overlay, "removing stray overlay");
                self.host.remove_overlay(&overlay);
                report.strays_removed += 1;
            }
        }

        let broken: Vec<_> = self
            .registry
            .iter()
            .filter(|(_, e)| {
                !self.host.overlay_attached(&e.overlay, &e.container)
                    || !still_contains(&self.host, &e.container, &e.element, &self.config)
            })
            .map(|(id, e)| (id, e.element.clone()))
            .collect();
        for (id, element) in broken {
            self.remove_entry(id, DetachReason::Repair);
            if !is_valid(&self.host, &element) {
                report.detached += 1;
                continue;
            }
            match self.attach(element) {
                Ok(_) => report.repaired += 1,
                Err(err) => {
                    tracing::warn!(%id, %err, "repair failed");
                    report.detached += 1;
                }
            }
        }

        for element in self.host.media_elements() {
            if self.registry.lookup(&self.host, &element).is_some()
                || !is_valid(&self.host, &element)
            {
                continue;
            }
            match self.attach(element) {
                Ok(_) => report.attached += 1,
                Err(err) => {
                    tracing::warn!(%err, "attach failed");
                    report.failed += 1;
                }
            }
        }

        let invalid: Vec<_> = self
            .registry
            .iter()
            .filter(|(_, e)| !is_valid(&self.host, &e.element))
            .map(|(id, _)| id)
            .collect();
        for id in invalid {
            self.remove_entry(id, DetachReason::Invalid);
            report.detached += 1;
        }

        report.tracked = self.registry.len();
        if !report.is_noop() {
            tracing::debug!(?report, "reconciled");
        }
        self.tracer.reconcile(&ReconcileEvent {
            at: self.now,
            report,
        });
        report
    }

    /// Brings one element under management.
    ///
    /// # Errors
    ///
    /// Fails without side effects if the element is already tracked, is not
    /// valid, or has no parent. A host failure part-way through undoes what
    /// was already done, so no orphan overlay is left behind.
    pub fn attach(&mut self, element: H::Element) -> Result<TrackId, AttachError> {
        if let Some(id) = self.registry.lookup(&self.host, &element) {
            return Err(AttachError::AlreadyTracked(id));
        }
        if !is_valid(&self.host, &element) {
            return Err(AttachError::Invalid);
        }
        let container =
            resolve_container(&self.host, &element, &self.config).ok_or(AttachError::Detached)?;

        let id = self.registry.reserve();
        let entry = match self.build_entry(id, element, container) {
            Ok(entry) => entry,
            Err(err) => {
                self.registry.release(id);
                return Err(err);
            }
        };
        self.host.set_track_tag(&entry.element, Some(id));
        let rate = self.speed.recall(entry.source_key.as_ref());
        let text = format_speed(rate);
        self.host.set_overlay_text(&entry.overlay, &text);
        self.registry.insert(id, entry);

        self.apply_now(id, rate, false);
        self.reposition(id);

        tracing::debug!(%id, rate, "attached");
        self.tracer.attach(&AttachEvent {
            id,
            speed: rate,
            at: self.now,
        });
        Ok(id)
    }

    /// Creates, wires, and watches. Undoes completed steps on failure.
    fn build_entry(
        &mut self,
        id: TrackId,
        element: H::Element,
        container: H::Element,
    ) -> Result<RegistryEntry<H>, AttachError> {
        let overlay = self.host.create_overlay(&container)?;
        let listener = match self.host.wire_overlay(&overlay, id) {
            Ok(listener) => listener,
            Err(err) => {
                self.host.remove_overlay(&overlay);
                return Err(err.into());
            }
        };
        let watch = match self.host.watch_attributes(&element, id, &WatchedAttr::ALL) {
            Ok(watch) => watch,
            Err(err) => {
                self.host.unwire_overlay(listener);
                self.host.remove_overlay(&overlay);
                return Err(err.into());
            }
        };

        let source_key = self.source_key(&element);
        let mut entry = RegistryEntry::new(element, container, overlay);
        entry.listener = Some(listener);
        entry.watch = Some(watch);
        entry.source_key = source_key;
        Ok(entry)
    }

    fn source_key(&self, element: &H::Element) -> Option<SourceKey> {
        self.host
            .source(element)
            .and_then(|src| SourceKey::from_source(&src, self.config.source_keys))
    }

    /// Releases an element. Returns whether it was tracked.
    pub fn detach(&mut self, element: &H::Element) -> bool {
        match self.registry.lookup(&self.host, element) {
            Some(id) => self.remove_entry(id, DetachReason::Requested),
            None => false,
        }
    }

    /// Releases an element by handle. Returns whether the handle was live.
    pub fn detach_id(&mut self, id: TrackId) -> bool {
        self.remove_entry(id, DetachReason::Requested)
    }

    fn remove_entry(&mut self, id: TrackId, reason: DetachReason) -> bool {
        let Some(entry) = self.registry.get_mut(id) else {
            return false;
        };
        if let Some(listener) = entry.listener.take() {
            self.host.unwire_overlay(listener);
        }
        self.host.remove_overlay(&entry.overlay);
        if let Some(watch) = entry.watch.take() {
            self.host.unwatch(watch);
        }
        if self.host.track_tag(&entry.element) == Some(id) {
            self.host.set_track_tag(&entry.element, None);
        }
        self.registry.remove(id);

        tracing::debug!(%id, ?reason, "detached");
        self.tracer.detach(&DetachEvent {
            id,
            reason,
            at: self.now,
        });
        true
    }

    /// Moves an overlay to its anchored corner. Returns whether `id` was live.
    pub fn reposition(&mut self, id: TrackId) -> bool {
        let Some(entry) = self.registry.get(id) else {
            return false;
        };
        let origin = place_overlay(
            self.host.bounds(&entry.container),
            self.host.bounds(&entry.element),
            self.host.overlay_size(&entry.overlay),
            self.config.anchor,
            self.config.anchor_inset,
            self.config.edge_margin,
        );
        self.host.move_overlay(&entry.overlay, origin);
        true
    }

    // -- Speed --

    /// Sets the global speed and brings every tracked element to it.
    ///
    /// `origin` (if live) is applied synchronously; everyone else goes
    /// through the deferred queue. Every overlay shows the new speed right
    /// away, whether or not its apply succeeds later.
    ///
    /// # Errors
    ///
    /// Returns [`SpeedError::OutOfRange`] and changes nothing if `speed` is
    /// unusable.
    pub fn propagate_speed(
        &mut self,
        speed: f64,
        origin: Option<TrackId>,
    ) -> Result<(), SpeedError> {
        let from = self.speed.get();
        self.speed.set_global(speed)?;
        let snapshot = self.speed.get();
        tracing::debug!(from, to = snapshot, ?origin, "speed changed");
        self.tracer.speed_change(&SpeedChangeEvent {
            from,
            to: snapshot,
            origin,
            at: self.now,
        });

        let origin = origin.filter(|&id| self.registry.is_alive(id));
        if let Some(id) = origin {
            if let Some(entry) = self.registry.get_mut(id) {
                entry.pending_rate = None;
            }
            self.apply_now(id, snapshot, false);
        }
        for id in self.registry.ids() {
            if Some(id) != origin {
                self.defer(id, snapshot);
            }
        }

        let text = format_speed(snapshot);
        for (_, entry) in self.registry.iter() {
            self.host.set_overlay_text(&entry.overlay, &text);
        }
        Ok(())
    }

    fn defer(&mut self, id: TrackId, rate: f64) {
        let Some(entry) = self.registry.get_mut(id) else {
            return;
        };
        if entry.pending_rate.replace(rate).is_none() {
            self.deferred.push_back(id);
        }
    }

    /// Applies `rate` to one element. Failures are logged and traced.
    ///
    /// The apply runs to completion under `&mut self`, so no second apply to
    /// the same element can start while one is in flight.
    fn apply_now(&mut self, id: TrackId, rate: f64, deferred: bool) {
        let Some(entry) = self.registry.get_mut(id) else {
            return;
        };

        let playing = self.host.is_playing(&entry.element);
        let position = self.host.current_time(&entry.element);
        let result = self
            .host
            .set_playback_rate(&entry.element, rate)
            .and_then(|()| {
                if let Some(key) = &entry.source_key {
                    self.speed.remember_for_source(key, rate);
                }
                if playing {
                    self.host.resume_at(&entry.element, position)
                } else {
                    Ok(())
                }
            });

        let outcome = match result {
            Ok(()) => ApplyOutcome::Applied,
            Err(err) => {
                tracing::warn!(%id, rate, %err, "apply failed");
                ApplyOutcome::Failed
            }
        };
        self.tracer.apply(&ApplyEvent {
            id,
            rate,
            deferred,
            outcome,
            at: self.now,
        });
    }

    /// Whether deferred applies are waiting. The host should poll again
    /// promptly while this holds.
    #[must_use]
    pub fn has_deferred_work(&self) -> bool {
        !self.deferred.is_empty()
    }

    fn drain_deferred(&mut self) {
        let batch: Vec<_> = self.deferred.drain(..).collect();
        for id in batch {
            let Some(rate) = self
                .registry
                .get_mut(id)
                .and_then(|entry| entry.pending_rate.take())
            else {
                continue;
            };
            self.apply_now(id, rate, true);
        }
    }

    // -- Gestures --

    /// Handles a pointer gesture on the overlay of `target`.
    pub fn on_pointer(&mut self, target: TrackId, kind: PointerKind, now: HostTime) {
        self.now = now;
        if let Some((pending, gesture)) = self.clicks.expire(now) {
            self.run_gesture(pending, gesture);
        }
        if !self.registry.is_alive(target) {
            tracing::debug!(%target, ?kind, "pointer on untracked overlay");
            return;
        }
        if let Some(gesture) = self.clicks.pointer(kind, target, now) {
            self.run_gesture(target, gesture);
        }
    }

    fn run_gesture(&mut self, target: TrackId, gesture: Gesture) {
        tracing::debug!(%target, ?gesture, "gesture");
        self.tracer.gesture(&GestureEvent {
            target,
            gesture,
            at: self.now,
        });
        let result = match gesture {
            Gesture::Cycle => {
                let next = next_preset(&self.config.presets, self.speed.get());
                self.propagate_speed(next, Some(target))
            }
            Gesture::Reset => self.propagate_speed(self.config.default_speed, Some(target)),
            Gesture::Custom => {
                self.prompt_custom(target);
                Ok(())
            }
        };
        if let Err(err) = result {
            tracing::warn!(%target, %err, "gesture rejected");
        }
    }

    fn prompt_custom(&mut self, target: TrackId) {
        let recent = self.speed.custom_speeds();
        let mut message = format!("Enter playback speed ({MIN_SPEED}-{MAX_SPEED}):");
        if !recent.is_empty() {
            let list: Vec<String> = recent.iter().map(ToString::to_string).collect();
            message.push_str("\nRecent: ");
            message.push_str(&list.join(", "));
        }
        let current = self.speed.get().to_string();

        let Some(answer) = self.prompt.ask(&message, &current) else {
            return;
        };
        match parse_speed(&answer) {
            Ok(speed) => {
                self.speed.record_custom(speed, self.store.as_mut());
                if let Err(err) = self.propagate_speed(speed, Some(target)) {
                    tracing::warn!(%err, "custom speed rejected");
                }
            }
            Err(err) => {
                tracing::debug!(%err, "invalid custom speed");
                self.prompt.notify(&format!("Invalid speed: {err}"));
            }
        }
    }

    // -- Signals --

    /// Handles a summarized mutation under the document root.
    pub fn on_mutation(&mut self, record: MutationRecord, now: HostTime) {
        if let Some(signal) = Signal::from_mutation(record) {
            self.signal(signal, now);
        }
    }

    /// Handles a same-document navigation.
    pub fn on_navigation(&mut self, event: NavigationEvent, now: HostTime) {
        self.signal(Signal::from_navigation(event), now);
    }

    /// Handles a change of document visibility.
    pub fn on_visibility_change(&mut self, now: HostTime) {
        self.signal(Signal::Visibility, now);
    }

    fn signal(&mut self, signal: Signal, now: HostTime) {
        self.now = now;
        self.rescan.request(now);
        let due = self.rescan.deadline().unwrap_or(now);
        self.tracer.signal(&SignalEvent {
            signal,
            at: now,
            due,
        });
    }

    /// Handles a change to a watched attribute of a tracked element.
    pub fn on_attribute_changed(&mut self, id: TrackId, attr: WatchedAttr, now: HostTime) {
        self.now = now;
        let Some(element) = self.registry.get(id).map(|e| e.element.clone()) else {
            return;
        };
        match attr {
            WatchedAttr::Source => {
                let key = self.source_key(&element);
                let rate = self.speed.recall(key.as_ref());
                if let Some(entry) = self.registry.get_mut(id) {
                    entry.source_key = key;
                    entry.pending_rate = None;
                    let text = format_speed(rate);
                    self.host.set_overlay_text(&entry.overlay, &text);
                }
                tracing::debug!(%id, rate, "source changed");
                self.apply_now(id, rate, false);
            }
            WatchedAttr::Size => {
                self.reposition(id);
            }
            WatchedAttr::Style | WatchedAttr::Class => {
                self.reposition(id);
                // May have hidden the element.
                self.signal(Signal::Structure, now);
            }
        }
    }

    // -- Timers --

    /// Drains deferred applies, resolves an expired click, and runs a due
    /// rescan.
    pub fn poll(&mut self, now: HostTime) {
        self.now = now;
        self.drain_deferred();
        if let Some((target, gesture)) = self.clicks.expire(now) {
            self.run_gesture(target, gesture);
        }
        if let Some(coalesced) = self.rescan.take_due(now) {
            tracing::debug!(coalesced, "rescan due");
            self.reconcile_all();
        }
    }

    /// When the host should call [`poll`](Self::poll) next. Returns the last
    /// seen time when deferred applies are waiting.
    #[must_use]
    pub fn next_deadline(&self) -> Option<HostTime> {
        let timers = match (self.clicks.deadline(), self.rescan.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if self.has_deferred_work() {
            Some(self.now)
        } else {
            timers
        }
    }
}
