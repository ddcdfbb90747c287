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

//! Deadline tracking for pending calls.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct Deadlines {
    by_time: BTreeSet<(Instant, u32)>,
    by_id: HashMap<u32, Instant>,
}

/// Schedules one deadline per pending call.
///
/// A single timer task per connection waits on
/// [`next_expired`](Self::next_expired) and resolves whatever it returns
/// with a timeout. Cancelling a deadline when its call resolves keeps a
/// stale timer from firing on an id that is later reused.
///
/// # Example
///
/// ```rust
/// use tchannel::connection::TimeoutManager;
/// use tokio::time::{Duration, Instant};
///
/// let timeouts = TimeoutManager::new();
/// let now = Instant::now();
/// timeouts.schedule(7, now + Duration::from_millis(10));
/// timeouts.schedule(8, now + Duration::from_secs(10));
///
/// assert_eq!(timeouts.expired(now + Duration::from_secs(1)), vec![7]);
/// assert!(timeouts.cancel(8));
/// assert!(timeouts.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct TimeoutManager {
    deadlines: Mutex<Deadlines>,
    changed: Notify,
}

impl TimeoutManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules (or reschedules) the deadline for `id`.
    pub fn schedule(&self, id: u32, deadline: Instant) {
        {
            let mut deadlines = self.deadlines.lock();
            if let Some(previous) = deadlines.by_id.insert(id, deadline) {
                deadlines.by_time.remove(&(previous, id));
            }
            deadlines.by_time.insert((deadline, id));
        }
        self.changed.notify_one();
    }

    /// Cancels the deadline for `id`. Returns `false` if none was scheduled.
    pub fn cancel(&self, id: u32) -> bool {
        let mut deadlines = self.deadlines.lock();
        match deadlines.by_id.remove(&id) {
            Some(deadline) => {
                deadlines.by_time.remove(&(deadline, id));
                true
            }
            None => false,
        }
    }

    /// Cancels every deadline.
    pub fn clear(&self) {
        let mut deadlines = self.deadlines.lock();
        deadlines.by_time.clear();
        deadlines.by_id.clear();
    }

    /// The earliest scheduled deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines
            .lock()
            .by_time
            .first()
            .map(|(deadline, _)| *deadline)
    }

    /// Removes and returns the ids whose deadline is at or before `now`,
    /// earliest first.
    pub fn expired(&self, now: Instant) -> Vec<u32> {
        let mut deadlines = self.deadlines.lock();
        let mut ids = Vec::new();
        while let Some(&(deadline, id)) = deadlines.by_time.first() {
            if deadline > now {
                break;
            }
            deadlines.by_time.remove(&(deadline, id));
            deadlines.by_id.remove(&id);
            ids.push(id);
        }
        ids
    }

    /// Waits until at least one deadline passes and returns the expired ids.
    pub async fn next_expired(&self) -> Vec<u32> {
        loop {
            let changed = self.changed.notified();
            match self.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {
                            let ids = self.expired(Instant::now());
                            if !ids.is_empty() {
                                return ids;
                            }
                        }
                        _ = changed => {}
                    }
                }
                None => changed.await,
            }
        }
    }

    /// Number of scheduled deadlines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deadlines.lock().by_id.len()
    }

    /// Returns `true` if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deadlines.lock().by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_expired_in_deadline_order() {
        let timeouts = TimeoutManager::new();
        let now = Instant::now();
        timeouts.schedule(3, now + Duration::from_millis(30));
        timeouts.schedule(1, now + Duration::from_millis(10));
        timeouts.schedule(2, now + Duration::from_millis(20));

        assert_eq!(timeouts.expired(now + Duration::from_millis(25)), vec![1, 2]);
        assert_eq!(timeouts.len(), 1);
        assert_eq!(timeouts.next_deadline(), Some(now + Duration::from_millis(30)));
    }

    #[test]
    fn test_reschedule_replaces_deadline() {
        let timeouts = TimeoutManager::new();
        let now = Instant::now();
        timeouts.schedule(1, now + Duration::from_millis(10));
        timeouts.schedule(1, now + Duration::from_secs(10));

        assert!(timeouts.expired(now + Duration::from_secs(1)).is_empty());
        assert_eq!(timeouts.len(), 1);
    }

    #[test]
    fn test_cancel_and_clear() {
        let timeouts = TimeoutManager::new();
        let now = Instant::now();
        timeouts.schedule(1, now);
        timeouts.schedule(2, now);

        assert!(timeouts.cancel(1));
        assert!(!timeouts.cancel(1));
        timeouts.clear();
        assert!(timeouts.is_empty());
        assert_eq!(timeouts.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_expired_waits_for_deadline() {
        let timeouts = Arc::new(TimeoutManager::new());
        let start = Instant::now();
        timeouts.schedule(5, start + Duration::from_millis(100));

        let ids = timeouts.next_expired().await;
        assert_eq!(ids, vec![5]);
        assert!(Instant::now() >= start + Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_expired_sees_later_schedule() {
        let timeouts = Arc::new(TimeoutManager::new());
        let waiter = {
            let timeouts = Arc::clone(&timeouts);
            tokio::spawn(async move { timeouts.next_expired().await })
        };
        tokio::task::yield_now().await;

        timeouts.schedule(9, Instant::now() + Duration::from_millis(50));
        assert_eq!(waiter.await.unwrap(), vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_deadline_does_not_fire() {
        let timeouts = Arc::new(TimeoutManager::new());
        let now = Instant::now();
        timeouts.schedule(1, now + Duration::from_millis(10));
        timeouts.schedule(2, now + Duration::from_millis(20));
        timeouts.cancel(1);

        assert_eq!(timeouts.next_expired().await, vec![2]);
    }
}
