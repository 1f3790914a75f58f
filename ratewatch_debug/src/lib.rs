// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pretty-printing, JSON journals, and log setup for ratewatch diagnostics.
//!
//! This crate provides [`TraceSink`](ratewatch_core::trace::TraceSink)
//! implementations for development and bug reports:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`journal::JournalSink`]: records events and exports them as a JSON
//!   array.
//!
//! [`logging::init_logging`] installs a `tracing` subscriber filtered by
//! `RATEWATCH_LOG` or `RUST_LOG`.

pub mod journal;
pub mod logging;
pub mod pretty;
