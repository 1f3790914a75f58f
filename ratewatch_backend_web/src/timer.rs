// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `setTimeout` wake-up source.
//!
//! The engine never schedules anything itself; it reports the next time it
//! wants to be polled. [`Timer`] turns that deadline into a single pending
//! `setTimeout`. A zero delay puts the poll at the back of the task queue,
//! which is where deferred playback-rate applies belong.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ratewatch_core::time::HostTime;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = performance, js_name = "now")]
    pub(crate) fn performance_now() -> f64;

    #[wasm_bindgen(js_name = "setTimeout")]
    fn set_timeout(callback: &JsValue, delay_ms: i32) -> i32;

    #[wasm_bindgen(js_name = "clearTimeout")]
    fn clear_timeout(handle: i32);
}

/// Milliseconds from `now` until `at`, as a `setTimeout` delay.
pub(crate) fn delay_ms(at: HostTime, now: HostTime) -> i32 {
    i32::try_from(at.saturating_duration_since(now).millis()).unwrap_or(i32::MAX)
}

/// A one-shot `setTimeout` that always targets the earliest requested
/// deadline.
pub struct Timer {
    inner: Rc<TimerInner>,
}

type TimeoutClosure = Closure<dyn FnMut()>;

struct TimerInner {
    /// Registered with every `setTimeout`. Holds only a weak reference back.
    closure: RefCell<Option<TimeoutClosure>>,
    callback: RefCell<Box<dyn FnMut()>>,
    /// Handle and deadline of the pending timeout, if any.
    pending: Cell<Option<(i32, HostTime)>>,
    fired: Cell<u64>,
}

impl Timer {
    /// Creates an idle timer that calls `callback` whenever it fires.
    pub fn new(callback: impl FnMut() + 'static) -> Self {
        let inner = Rc::new(TimerInner {
            closure: RefCell::new(None),
            callback: RefCell::new(Box::new(callback)),
            pending: Cell::new(None),
            fired: Cell::new(0),
        });

        let weak = Rc::downgrade(&inner);
        let closure = Closure::wrap(Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.pending.set(None);
            inner.fired.set(inner.fired.get() + 1);
            if let Ok(mut callback) = inner.callback.try_borrow_mut() {
                callback();
            }
        }) as Box<dyn FnMut()>);
        *inner.closure.borrow_mut() = Some(closure);

        Self { inner }
    }

    /// Makes sure the callback runs no later than `at`.
    ///
    /// A pending timeout for an earlier or equal deadline is kept; a later
    /// one is replaced.
    pub fn arm(&self, at: HostTime, now: HostTime) {
        if let Some((_, pending_at)) = self.inner.pending.get()
            && pending_at <= at
        {
            return;
        }
        self.cancel();
        if let Some(ref closure) = *self.inner.closure.borrow() {
            let handle = set_timeout(closure.as_ref().unchecked_ref(), delay_ms(at, now));
            self.inner.pending.set(Some((handle, at)));
        }
    }

    /// Cancels the pending timeout, if any.
    pub fn cancel(&self) {
        if let Some((handle, _)) = self.inner.pending.take() {
            clear_timeout(handle);
        }
    }

    /// Returns `true` while a timeout is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.pending.get().is_some()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
        self.inner.closure.borrow_mut().take();
    }
}

impl core::fmt::Debug for Timer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Timer")
            .field("pending", &self.inner.pending.get().map(|(_, at)| at))
            .field("fired", &self.inner.fired.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_is_zero_for_past_deadlines() {
        assert_eq!(delay_ms(HostTime(100), HostTime(250)), 0);
        assert_eq!(delay_ms(HostTime(250), HostTime(250)), 0);
    }

    #[test]
    fn delay_counts_remaining_millis() {
        assert_eq!(delay_ms(HostTime(550), HostTime(250)), 300);
    }

    #[test]
    fn delay_saturates_at_i32_max() {
        assert_eq!(delay_ms(HostTime(u64::MAX), HostTime(0)), i32::MAX);
    }
}
