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

//! Correlation id allocation.
//!
//! Ids tie a call's response frames to its request frames on one connection.
//! Id `0` is reserved for the init exchange and `0xFFFF_FFFF` addresses the
//! connection itself, so neither is ever handed out.

use crate::frame::{CONNECTION_FRAME_ID, INIT_FRAME_ID};

/// Allocates correlation ids for one connection.
///
/// Ids increase monotonically and wrap around the 32-bit space. An id still
/// in use is skipped, so an id is never issued twice while the call that
/// holds it is outstanding.
///
/// The allocator is not synchronized; the connection calls it while holding
/// the lock that guards its pending-call table.
///
/// # Example
///
/// ```rust
/// use tchannel::connection::CorrelationIds;
///
/// let mut ids = CorrelationIds::new();
/// assert_eq!(ids.next(|_| false), 1);
/// assert_eq!(ids.next(|id| id == 2), 3);
/// ```
#[derive(Debug)]
pub struct CorrelationIds {
    next: u32,
}

impl CorrelationIds {
    /// Creates an allocator whose first id is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Returns the next id for which `in_use` is `false`.
    ///
    /// The caller guarantees that fewer than `u32::MAX - 1` ids are in use.
    pub fn next(&mut self, in_use: impl Fn(u32) -> bool) -> u32 {
        loop {
            let id = self.next;
            self.next = self.next.wrapping_add(1);
            if id == INIT_FRAME_ID || id == CONNECTION_FRAME_ID || in_use(id) {
                continue;
            }
            return id;
        }
    }
}

impl Default for CorrelationIds {
    fn default() -> Self {
        Self::new()
    }
}
