// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `localStorage` persistence and `prompt`/`alert` dialogs.

use ratewatch_core::host::{KeyValueStore, SpeedPrompt};
use web_sys::{Storage, Window};

/// [`KeyValueStore`] over `window.localStorage`.
///
/// Storage can be unavailable (sandboxed frames, disabled cookies) or full.
/// Reads then return the default and writes are dropped with a warning.
pub struct LocalStorage {
    storage: Option<Storage>,
}

impl core::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LocalStorage")
            .field("available", &self.storage.is_some())
            .finish_non_exhaustive()
    }
}

impl LocalStorage {
    /// Opens the window's local storage.
    #[must_use]
    pub fn new(window: &Window) -> Self {
        let storage = match window.local_storage() {
            Ok(storage) => storage,
            Err(err) => {
                tracing::warn!(?err, "localStorage unavailable; custom speeds won't persist");
                None
            }
        };
        Self { storage }
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str, default: &str) -> String {
        self.storage
            .as_ref()
            .and_then(|storage| storage.get_item(key).ok().flatten())
            .unwrap_or_else(|| default.to_owned())
    }

    fn set(&mut self, key: &str, value: &str) {
        let Some(storage) = &self.storage else {
            return;
        };
        if let Err(err) = storage.set_item(key, value) {
            tracing::warn!(key, ?err, "localStorage write failed");
        }
    }
}

/// [`SpeedPrompt`] over the window's blocking `prompt` and `alert`.
#[derive(Debug)]
pub struct WindowPrompt {
    window: Window,
}

impl WindowPrompt {
    /// Uses `window` for dialogs.
    #[must_use]
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl SpeedPrompt for WindowPrompt {
    fn ask(&mut self, message: &str, default: &str) -> Option<String> {
        self.window
            .prompt_with_message_and_default(message, default)
            .ok()
            .flatten()
    }

    fn notify(&mut self, message: &str) {
        if self.window.alert_with_message(message).is_err() {
            tracing::warn!(notice = message, "alert blocked");
        }
    }
}
