// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `tracing` output to the browser console.

use std::io;

use tracing::{Level, Metadata};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use wasm_bindgen::JsValue;

/// Default filter when none is given.
pub(crate) const DEFAULT_FILTER: &str = "ratewatch_core=info,ratewatch_backend_web=info";

/// [`MakeWriter`] that sends each formatted event to the matching
/// `console.*` method.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleMakeWriter;

/// Buffers one formatted event and writes it to the console on drop.
#[derive(Debug)]
pub struct ConsoleWriter {
    level: Level,
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        let line = JsValue::from_str(text.trim_end());
        match self.level {
            Level::ERROR => web_sys::console::error_1(&line),
            Level::WARN => web_sys::console::warn_1(&line),
            Level::INFO => web_sys::console::info_1(&line),
            _ => web_sys::console::debug_1(&line),
        }
    }
}

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter {
            level: Level::INFO,
            buf: Vec::new(),
        }
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        ConsoleWriter {
            level: *meta.level(),
            buf: Vec::new(),
        }
    }
}

/// Parses `directives`, falling back to [`DEFAULT_FILTER`] when they are
/// missing or malformed.
pub(crate) fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a global console subscriber. Returns `false` if one was already
/// installed.
pub fn init_console_logging(directives: Option<&str>) -> bool {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter_from(directives))
        .without_time()
        .with_target(true)
        .with_writer(ConsoleMakeWriter)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_directives_fall_back_to_default() {
        let filter = filter_from(Some("ratewatch_core=notalevel"));
        assert_eq!(filter.to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
    }

    #[test]
    fn explicit_directives_are_used() {
        let filter = filter_from(Some("debug"));
        assert_ne!(
            filter.to_string(),
            EnvFilter::new(DEFAULT_FILTER).to_string(),
            "valid directives replace the default"
        );
    }

    #[test]
    fn missing_directives_use_default() {
        assert_eq!(
            filter_from(None).to_string(),
            EnvFilter::new(DEFAULT_FILTER).to_string()
        );
    }
}
