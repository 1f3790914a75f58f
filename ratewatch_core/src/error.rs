// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! None of these are fatal. Speed errors are shown to the user and leave the
//! state unchanged; host and attach errors are logged and the engine carries
//! on with the remaining elements.

use alloc::string::String;

use thiserror::Error;

use crate::registry::TrackId;
use crate::speed::{MAX_SPEED, MIN_SPEED};

/// A requested speed could not be used.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SpeedError {
    /// The input did not parse as a number.
    #[error("`{0}` is not a number")]
    NotANumber(String),
    /// The value is NaN, infinite, or outside the supported range.
    #[error("speed {0} is outside {min}..={max}", min = MIN_SPEED, max = MAX_SPEED)]
    OutOfRange(f64),
}

/// A host operation failed for one element or overlay.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HostError {
    /// The node is no longer connected to the document.
    #[error("node is detached from the document")]
    Detached,
    /// The host refused the operation.
    #[error("host rejected the operation: {0}")]
    Rejected(String),
}

/// An element could not be brought under management.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AttachError {
    /// The element already has a registry entry.
    #[error("element is already tracked as {0}")]
    AlreadyTracked(TrackId),
    /// The element is not a visible, connected media element.
    #[error("element is not a valid media target")]
    Invalid,
    /// The element has no parent to host an overlay.
    #[error("element has no parent to position an overlay in")]
    Detached,
    /// A host call failed part-way through attaching.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// The persisted custom-speed history could not be read.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HistoryError {
    /// The stored value is not a JSON array of numbers.
    #[error("stored custom speeds are malformed: {0}")]
    Malformed(String),
}
