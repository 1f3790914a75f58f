// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registry and synchronization engine for playback-rate overlays.
//!
//! `ratewatch_core` keeps a live binding between the media elements of a
//! continuously mutating document and one small overlay per element that
//! shows and changes its playback rate. It is `no_std` compatible (with
//! `alloc`) and never touches a document directly: everything goes through
//! the [`MediaHost`](host::MediaHost) trait a platform backend implements.
//!
//! # Architecture
//!
//! ```text
//!   Host (document, timers, input)
//!       │ mutations / navigation / visibility / pointer / attribute events
//!       ▼
//!   Engine ──► reconcile_all() ──► Registry (one entry per element)
//!       │                              │
//!       │                              ▼
//!       │                      MediaHost: overlays, wiring, watches
//!       ▼
//!   propagate_speed() ──► SpeedState ──► MediaHost: playback rate
//! ```
//!
//! **[`engine`]**: The [`Engine`](engine::Engine) context object. Runs
//! reconciliation passes, speed propagation, the deferred-apply queue, and
//! both debounces.
//!
//! **[`registry`]**: Slot storage for tracked elements with generational
//! [`TrackId`](registry::TrackId) handles.
//!
//! **[`speed`]**: Global speed, per-source remembered speeds, and the
//! persisted custom-speed history.
//!
//! **[`validity`]**: The predicate deciding which elements get an overlay.
//!
//! **[`overlay`]**: Container resolution and overlay placement.
//!
//! **[`input`]**: Single versus double click disambiguation and preset
//! cycling.
//!
//! **[`watch`]**: Rescan signals and their trailing debounce.
//!
//! **[`host`]**: The [`MediaHost`](host::MediaHost),
//! [`SpeedPrompt`](host::SpeedPrompt), and
//! [`KeyValueStore`](host::KeyValueStore) contracts.
//!
//! **[`inspect`]**: A debug façade over a running engine.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types, with
//! a zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `serde` (disabled by default): `Deserialize` for
//!   [`EngineConfig`](config::EngineConfig).
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod config;
pub mod engine;
pub mod error;
mod history;
pub mod host;
pub mod input;
pub mod inspect;
pub mod overlay;
pub mod registry;
pub mod speed;
pub mod time;
pub mod trace;
pub mod validity;
pub mod watch;

#[cfg(test)]
mod testing;
