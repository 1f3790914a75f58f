// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `window.__ratewatch` console handle.
//!
//! Exposes the [`Inspector`] operations to page scripts and the devtools
//! console:
//!
//! | JS                       | Returns                                  |
//! |--------------------------|------------------------------------------|
//! | `getCurrentSpeed()`      | global speed, `NaN` while busy           |
//! | `setSpeed(x)`            | `true` if `x` was accepted               |
//! | `getCustomSpeeds()`      | array of recent custom speeds            |
//! | `refresh()`              | tracked element count after a pass       |
//! | `getVideoCount()`        | tracked element count                    |

use js_sys::{Object, Reflect};
use ratewatch_core::inspect::Inspector;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast as _, JsValue};
use web_sys::Window;

use crate::runtime::WeakRuntime;

/// Property name of the handle on `window`.
pub(crate) const HANDLE_NAME: &str = "__ratewatch";

fn to_count(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn export(api: &Object, name: &str, function: &JsValue) {
    if let Err(err) = Reflect::set(api, &JsValue::from_str(name), function) {
        tracing::warn!(name, ?err, "debug export failed");
    }
}

/// Installs the handle on `window`. The closures hold only a weak runtime
/// reference and are leaked for the lifetime of the page.
pub(crate) fn expose(window: &Window, runtime: &WeakRuntime) {
    let api = Object::new();

    let rt = runtime.clone();
    let get_current_speed = Closure::wrap(Box::new(move || {
        rt.with_engine(|engine| Inspector::new(engine).current_speed())
            .unwrap_or(f64::NAN)
    }) as Box<dyn Fn() -> f64>);
    export(&api, "getCurrentSpeed", get_current_speed.as_ref().unchecked_ref());
    get_current_speed.forget();

    let rt = runtime.clone();
    let set_speed = Closure::wrap(Box::new(move |speed: f64| {
        match rt.with_engine(|engine| Inspector::new(engine).set_speed(speed)) {
            Some(Ok(())) => true,
            Some(Err(err)) => {
                tracing::warn!(%err, "setSpeed rejected");
                false
            }
            None => false,
        }
    }) as Box<dyn Fn(f64) -> bool>);
    export(&api, "setSpeed", set_speed.as_ref().unchecked_ref());
    set_speed.forget();

    let rt = runtime.clone();
    let get_custom_speeds = Closure::wrap(Box::new(move || {
        let speeds = rt
            .with_engine(|engine| Inspector::new(engine).custom_speeds())
            .unwrap_or_default();
        serde_wasm_bindgen::to_value(&speeds).unwrap_or(JsValue::UNDEFINED)
    }) as Box<dyn Fn() -> JsValue>);
    export(&api, "getCustomSpeeds", get_custom_speeds.as_ref().unchecked_ref());
    get_custom_speeds.forget();

    let rt = runtime.clone();
    let refresh = Closure::wrap(Box::new(move || {
        rt.with_engine(|engine| {
            let mut inspector = Inspector::new(engine);
            let report = inspector.refresh();
            tracing::debug!(?report, "manual refresh");
            to_count(inspector.video_count())
        })
        .unwrap_or(0)
    }) as Box<dyn Fn() -> u32>);
    export(&api, "refresh", refresh.as_ref().unchecked_ref());
    refresh.forget();

    let rt = runtime.clone();
    let get_video_count = Closure::wrap(Box::new(move || {
        rt.with_engine(|engine| to_count(Inspector::new(engine).video_count()))
            .unwrap_or(0)
    }) as Box<dyn Fn() -> u32>);
    export(&api, "getVideoCount", get_video_count.as_ref().unchecked_ref());
    get_video_count.forget();

    export(window, HANDLE_NAME, &api);
    tracing::debug!("debug handle exposed on window.{HANDLE_NAME}");
}
