//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Accounting for live payload buffers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts payload buffer acquisitions and releases.
///
/// Every [`PayloadBuffer`](super::PayloadBuffer) created with
/// [`PayloadBuffer::tracked`](super::PayloadBuffer::tracked) is one
/// acquisition. It is released when its last handle is dropped or released,
/// which happens exactly once per acquisition. The difference between the two
/// counters is the number of buffers still alive.
///
/// Cloning a tracker yields a handle to the same counters.
///
/// # Examples
///
/// ```rust
/// use tchannel::buffer::{BufferTracker, PayloadBuffer};
///
/// let tracker = BufferTracker::new();
/// let buffer = PayloadBuffer::tracked("hello", &tracker);
/// assert_eq!(tracker.live(), 1);
///
/// buffer.release();
/// assert_eq!(tracker.live(), 0);
/// assert_eq!(tracker.released(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferTracker {
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
}

impl BufferTracker {
    /// Creates a tracker with both counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers acquired and not yet released.
    #[must_use]
    pub fn live(&self) -> u64 {
        // Read `released` first so a concurrent acquire/release pair can only
        // make the result larger, never wrap.
        let released = self.counters.released.load(Ordering::Acquire);
        let acquired = self.counters.acquired.load(Ordering::Acquire);
        acquired.saturating_sub(released)
    }

    /// Total acquisitions since the tracker was created.
    #[must_use]
    pub fn acquired(&self) -> u64 {
        self.counters.acquired.load(Ordering::Acquire)
    }

    /// Total releases since the tracker was created.
    #[must_use]
    pub fn released(&self) -> u64 {
        self.counters.released.load(Ordering::Acquire)
    }

    pub(super) fn acquire(&self) {
        self.counters.acquired.fetch_add(1, Ordering::AcqRel);
    }

    pub(super) fn release(&self) {
        let previous = self.counters.released.fetch_add(1, Ordering::AcqRel);
        debug_assert!(
            previous < self.counters.acquired.load(Ordering::Acquire),
            "payload buffer released more times than it was acquired"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_tracker_is_empty() {
        let tracker = BufferTracker::new();
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.acquired(), 0);
        assert_eq!(tracker.released(), 0);
    }

    #[test]
    fn test_acquire_release_balance() {
        let tracker = BufferTracker::new();
        tracker.acquire();
        tracker.acquire();
        assert_eq!(tracker.live(), 2);
        tracker.release();
        assert_eq!(tracker.live(), 1);
        tracker.release();
        assert_eq!(tracker.live(), 0);
        assert_eq!(tracker.acquired(), 2);
        assert_eq!(tracker.released(), 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let tracker = BufferTracker::new();
        let other = tracker.clone();
        tracker.acquire();
        assert_eq!(other.live(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "released more times")]
    fn test_over_release_fails_fast() {
        let tracker = BufferTracker::new();
        tracker.release();
    }
}
