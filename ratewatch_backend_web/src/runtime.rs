// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared engine owner for browser callbacks.
//!
//! Every JS callback (overlay listeners, attribute observers, the document
//! observer, history hooks, the timer) reports a [`HostEvent`] through an
//! [`EventSink`]. The runtime queues it and, if nobody else holds the engine,
//! drains the queue right away. Callbacks that fire while the engine is
//! borrowed (a blocking `prompt`, a synchronous `play()` side effect) stay in
//! the backlog until the current holder finishes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use ratewatch_core::config::EngineConfig;
use ratewatch_core::engine::Engine;
use ratewatch_core::host::{MediaHost, MutationRecord, NavigationEvent, PointerKind, WatchedAttr};
use ratewatch_core::registry::TrackId;
use ratewatch_core::time::HostTime;
use wasm_bindgen::JsValue;
use web_sys::{Document, Window};

use crate::dom_host::DomHost;
use crate::observer::DocumentObserver;
use crate::storage::{LocalStorage, WindowPrompt};
use crate::timer::Timer;

/// Something a browser callback wants the engine to hear about.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum HostEvent {
    /// A gesture on the overlay for `target`.
    Pointer { target: TrackId, kind: PointerKind },
    /// A watched attribute changed on a tracked element.
    Attribute { id: TrackId, attr: WatchedAttr },
    /// A summarized document mutation.
    Mutation(MutationRecord),
    /// A same-document navigation.
    Navigation(NavigationEvent),
    /// `document.visibilityState` changed.
    VisibilityChange,
    /// The timer armed from `next_deadline` fired.
    Timer,
}

/// Callback handed to everything that produces [`HostEvent`]s.
pub(crate) type EventSink = Rc<dyn Fn(HostEvent)>;

/// Routes one event into the engine.
pub(crate) fn deliver<H: MediaHost>(engine: &mut Engine<H>, event: HostEvent, now: HostTime) {
    match event {
        HostEvent::Pointer { target, kind } => engine.on_pointer(target, kind, now),
        HostEvent::Attribute { id, attr } => engine.on_attribute_changed(id, attr, now),
        HostEvent::Mutation(record) => engine.on_mutation(record, now),
        HostEvent::Navigation(event) => engine.on_navigation(event, now),
        HostEvent::VisibilityChange => engine.on_visibility_change(now),
        HostEvent::Timer => engine.poll(now),
    }
}

/// Owns the engine and every browser hook feeding it.
///
/// Dropping the runtime disconnects the document observer, restores the
/// wrapped `history` methods, detaches every tracked element, and cancels the
/// timer.
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

struct RuntimeInner {
    engine: RefCell<Engine<DomHost>>,
    backlog: RefCell<VecDeque<HostEvent>>,
    timer: Timer,
    observer: RefCell<Option<DocumentObserver>>,
}

impl core::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Runtime")
            .field("backlog", &self.inner.backlog.borrow().len())
            .field("timer", &self.inner.timer)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Builds the engine over `document`, installs the document observer and
    /// navigation hooks, and runs the first reconciliation pass.
    ///
    /// # Errors
    ///
    /// Fails when the document has no root element or the browser refuses to
    /// install an observer or hook.
    pub fn install(
        window: &Window,
        document: &Document,
        config: EngineConfig,
    ) -> Result<Self, JsValue> {
        let inner = Rc::new_cyclic(|weak: &Weak<RuntimeInner>| {
            let sink = sink_for(weak.clone());
            let timer = {
                let sink = Rc::clone(&sink);
                Timer::new(move || sink(HostEvent::Timer))
            };
            let host = DomHost::new(window.clone(), document.clone(), sink);
            let engine = Engine::new(
                host,
                config,
                Box::new(WindowPrompt::new(window.clone())),
                Box::new(LocalStorage::new(window)),
            );
            RuntimeInner {
                engine: RefCell::new(engine),
                backlog: RefCell::new(VecDeque::new()),
                timer,
                observer: RefCell::new(None),
            }
        });

        let observer = DocumentObserver::install(window, document, sink_for(Rc::downgrade(&inner)))?;
        *inner.observer.borrow_mut() = Some(observer);

        let runtime = Self { inner };
        let report = runtime.with_engine(|engine| engine.start(crate::now()));
        tracing::info!(?report, "ratewatch started");
        Ok(runtime)
    }

    /// Runs `f` against the engine, then drains the backlog and re-arms the
    /// timer. Returns `None` when the engine is already borrowed.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<DomHost>) -> R) -> Option<R> {
        self.inner.with_engine(f)
    }

    /// A handle that does not keep the runtime alive.
    pub(crate) fn downgrade(&self) -> WeakRuntime {
        WeakRuntime(Rc::downgrade(&self.inner))
    }
}

/// Non-owning [`Runtime`] handle for long-lived JS closures.
#[derive(Clone)]
pub(crate) struct WeakRuntime(Weak<RuntimeInner>);

impl core::fmt::Debug for WeakRuntime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("WeakRuntime")
            .field(&(self.0.strong_count() > 0))
            .finish()
    }
}

impl WeakRuntime {
    /// Like [`Runtime::with_engine`]; `None` once the runtime is gone.
    pub(crate) fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<DomHost>) -> R) -> Option<R> {
        self.0.upgrade()?.with_engine(f)
    }
}

fn sink_for(weak: Weak<RuntimeInner>) -> EventSink {
    Rc::new(move |event| {
        if let Some(inner) = weak.upgrade() {
            inner.dispatch(event);
        }
    })
}

impl RuntimeInner {
    fn dispatch(&self, event: HostEvent) {
        self.backlog.borrow_mut().push_back(event);
        if self.with_engine(|_| ()).is_none() {
            tracing::trace!(?event, "engine busy, event queued");
        }
    }

    fn with_engine<R>(&self, f: impl FnOnce(&mut Engine<DomHost>) -> R) -> Option<R> {
        let mut engine = self.engine.try_borrow_mut().ok()?;
        let result = f(&mut *engine);
        loop {
            // Released before delivery: handlers may queue more events.
            let next = self.backlog.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            deliver(&mut *engine, event, crate::now());
        }
        match engine.next_deadline() {
            Some(at) => self.timer.arm(at, crate::now()),
            None => self.timer.cancel(),
        }
        Some(result)
    }
}

impl Drop for RuntimeInner {
    fn drop(&mut self) {
        self.observer.get_mut().take();
        // Overlay listeners must be unwired before their closures drop.
        let engine = self.engine.get_mut();
        for id in engine.registry().ids() {
            engine.detach_id(id);
        }
    }
}
