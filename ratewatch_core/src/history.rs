// Copyright 2026 the Ratewatch Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded most-recent history.

use alloc::collections::VecDeque;

/// Bounded FIFO with a `drop_oldest` overflow policy.
///
/// Once full, new pushes remove the oldest item before inserting the newest.
#[derive(Debug, Clone)]
pub(crate) struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            let _ = self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
