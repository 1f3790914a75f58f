// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `tracing` subscriber setup for native tools and tests.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "RATEWATCH_LOG";

/// Picks the filter from `RATEWATCH_LOG`, then `RUST_LOG`, then `debug` or
/// `info` depending on `verbose`. Malformed directives fall back to `info`.
#[must_use]
pub fn filter_from_env(verbose: bool) -> EnvFilter {
    std::env::var(LOG_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .map_or_else(
            |_| {
                if verbose {
                    EnvFilter::new("debug")
                } else {
                    EnvFilter::new("info")
                }
            },
            |value| EnvFilter::try_new(value).unwrap_or_else(|_| EnvFilter::new("info")),
        )
}

/// Installs a global formatting subscriber on stderr.
///
/// Later calls keep the first subscriber and report the failure on stderr.
pub fn init_logging(verbose: bool) {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter_from_env(verbose))
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {err}");
    }
}
