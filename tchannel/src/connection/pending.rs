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

//! Calls awaiting a response on one connection.

use super::CorrelationIds;
use crate::error::CallError;
use crate::message::Response;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Completion side of an outbound call.
pub type CallSender = oneshot::Sender<Result<Response, CallError>>;

/// Caller side of an outbound call.
pub type CallReceiver = oneshot::Receiver<Result<Response, CallError>>;

/// Table of in-flight outbound calls, keyed by correlation id.
///
/// Each entry is resolved at most once: whichever of the response, the
/// timeout or the connection close removes the entry first delivers the
/// outcome, and the others find nothing to resolve.
///
/// The table also owns the correlation id allocator and the outstanding
/// pings, so that one lock covers every id issued on a connection.
/// Deadlines live in the connection's timeout manager, not here.
///
/// # Example
///
/// ```rust
/// use tchannel::connection::PendingCalls;
/// use tchannel::{CallError, ErrorType};
///
/// # async fn example() {
/// let mut pending = PendingCalls::new(16);
/// let (id, rx) = pending.register().unwrap();
///
/// pending.complete(id, Err(CallError::timeout("deadline exceeded")));
/// let outcome = rx.await.unwrap();
/// assert_eq!(outcome.unwrap_err().error_type(), ErrorType::Timeout);
/// # }
/// ```
#[derive(Debug)]
pub struct PendingCalls {
    calls: HashMap<u32, CallSender>,
    pings: HashMap<u32, oneshot::Sender<()>>,
    ids: CorrelationIds,
    limit: usize,
}

impl PendingCalls {
    /// Creates a table admitting at most `limit` concurrent calls.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            calls: HashMap::new(),
            pings: HashMap::new(),
            ids: CorrelationIds::new(),
            limit,
        }
    }

    fn allocate(&mut self) -> u32 {
        let Self { calls, pings, ids, .. } = self;
        ids.next(|id| calls.contains_key(&id) || pings.contains_key(&id))
    }

    /// Registers a call and returns its correlation id with the receiver
    /// its outcome will be delivered on.
    ///
    /// # Errors
    ///
    /// Returns a `Busy` error when `limit` calls are already pending.
    pub fn register(&mut self) -> Result<(u32, CallReceiver), CallError> {
        if self.calls.len() >= self.limit {
            return Err(CallError::busy(format!(
                "{} calls already pending on this connection",
                self.calls.len()
            )));
        }
        let id = self.allocate();
        let (sender, receiver) = oneshot::channel();
        self.calls.insert(id, sender);
        Ok((id, receiver))
    }

    /// Removes a call, returning its sender if it was still pending.
    pub fn take(&mut self, id: u32) -> Option<CallSender> {
        self.calls.remove(&id)
    }

    /// Resolves a call. Returns `false` if the id was not pending.
    pub fn complete(&mut self, id: u32, outcome: Result<Response, CallError>) -> bool {
        match self.take(id) {
            Some(sender) => {
                // The caller may have stopped waiting; nothing to do then.
                let _ = sender.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Removes every call and ping, returning the call senders.
    pub fn drain(&mut self) -> Vec<CallSender> {
        self.pings.clear();
        self.calls.drain().map(|(_, sender)| sender).collect()
    }

    /// Registers a ping and returns its id.
    pub fn register_ping(&mut self) -> (u32, oneshot::Receiver<()>) {
        let id = self.allocate();
        let (sender, receiver) = oneshot::channel();
        self.pings.insert(id, sender);
        (id, receiver)
    }

    /// Removes a ping, returning its sender if it was outstanding.
    pub fn take_ping(&mut self, id: u32) -> Option<oneshot::Sender<()>> {
        self.pings.remove(&id)
    }

    /// Number of pending calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns `true` if no calls are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
