// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Web backend for ratewatch.
//!
//! This crate wires [`ratewatch_core`] into a browser page:
//!
//! - [`DomHost`]: the [`MediaHost`] over the live DOM
//! - [`Timer`]: `setTimeout` wake-ups driven by `Engine::next_deadline`
//! - [`LocalStorage`] / [`WindowPrompt`]: persistence and dialogs
//! - [`Runtime`]: owns the engine and routes every browser callback into it
//! - [`start`]: the `wasm-bindgen` entry point, which also installs console
//!   logging and the `window.__ratewatch` debug handle
//!
//! Unlike the core, this crate uses `std`: `tracing-subscriber`'s formatter
//! needs it.
//!
//! [`MediaHost`]: ratewatch_core::host::MediaHost

#![cfg_attr(
    not(target_arch = "wasm32"),
    allow(dead_code, reason = "this crate only runs in the browser")
)]

mod console;
mod debug;
mod dom_host;
mod observer;
mod runtime;
mod storage;
mod timer;

use std::cell::RefCell;

pub use console::{ConsoleMakeWriter, ConsoleWriter, init_console_logging};
pub use dom_host::{AttributeWatch, DomHost, OverlayListener};
pub use runtime::Runtime;
pub use storage::{LocalStorage, WindowPrompt};
pub use timer::Timer;

use ratewatch_core::config::EngineConfig;
use ratewatch_core::time::HostTime;
use wasm_bindgen::prelude::*;

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

/// Returns the current host time from `performance.now()`.
#[must_use]
pub fn now() -> HostTime {
    HostTime::from_millis_f64(timer::performance_now())
}

/// Reads an optional JS configuration object. `undefined` and `null` select
/// [`EngineConfig::web`]; missing fields take their web defaults.
///
/// # Errors
///
/// Returns the deserialization error for objects of the wrong shape.
pub fn config_from_js(value: JsValue) -> Result<EngineConfig, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(EngineConfig::web());
    }
    serde_wasm_bindgen::from_value(value).map_err(JsValue::from)
}

/// Starts ratewatch on the current page.
///
/// `config` is an optional object with [`EngineConfig`] fields in
/// `snake_case`. `log` is an optional `tracing` filter such as
/// `"ratewatch_core=debug"`. Calling `start` again is a no-op.
///
/// # Errors
///
/// Fails without a window or document, on a malformed `config`, or when the
/// document observer cannot be installed.
#[wasm_bindgen(js_name = "start")]
pub fn start(config: JsValue, log: Option<String>) -> Result<(), JsValue> {
    init_console_logging(log.as_deref());

    if RUNTIME.with(|slot| slot.borrow().is_some()) {
        tracing::warn!("already started");
        return Ok(());
    }

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;
    let config = config_from_js(config)?;

    let runtime = Runtime::install(&window, &document, config)?;
    debug::expose(&window, &runtime.downgrade());
    RUNTIME.with(|slot| *slot.borrow_mut() = Some(runtime));
    Ok(())
}

/// Tears down the running instance, removing every overlay and hook.
#[wasm_bindgen(js_name = "stop")]
pub fn stop() {
    let runtime = RUNTIME.with(|slot| slot.borrow_mut().take());
    if runtime.is_some() {
        tracing::info!("ratewatch stopped");
    }
}
