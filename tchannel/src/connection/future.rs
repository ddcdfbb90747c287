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

//! The caller's handle on an in-flight call.

use crate::error::CallError;
use crate::message::Response;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolves to the outcome of a call.
///
/// The call is already in flight when the future is returned; polling only
/// observes it. Every failure, whether it happened at connect time, on the
/// wire or in the remote handler, arrives as an `Err(CallError)` through
/// this same future.
///
/// Dropping the future does not stop the call. Use
/// [`cancel`](Self::cancel) to withdraw it.
///
/// # Example
///
/// ```rust
/// use tchannel::connection::ResponseFuture;
/// use tchannel::{CallError, ErrorType};
///
/// # async fn example() {
/// let future = ResponseFuture::spawn(async {
///     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
///     Err(CallError::timeout("never"))
/// });
/// future.cancel();
/// let error = future.await.unwrap_err();
/// assert_eq!(error.error_type(), ErrorType::Cancelled);
/// # }
/// ```
#[derive(Debug)]
pub struct ResponseFuture {
    outcome: oneshot::Receiver<Result<Response, CallError>>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl ResponseFuture {
    /// Runs `call` on a new task and returns a future for its outcome.
    ///
    /// Cancelling drops `call` before it completes; the call is expected to
    /// clean up after itself on drop.
    pub fn spawn<F>(call: F) -> Self
    where
        F: Future<Output = Result<Response, CallError>> + Send + 'static,
    {
        let (outcome_tx, outcome) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        tokio::spawn(async move {
            let result = tokio::select! {
                result = call => result,
                Ok(()) = cancel_rx => Err(CallError::cancelled("call cancelled by caller")),
            };
            // Nobody may be waiting any more.
            let _ = outcome_tx.send(result);
        });
        Self {
            outcome,
            cancel: Mutex::new(Some(cancel_tx)),
        }
    }

    /// A future that is already resolved.
    #[must_use]
    pub fn ready(result: Result<Response, CallError>) -> Self {
        let (outcome_tx, outcome) = oneshot::channel();
        let _ = outcome_tx.send(result);
        Self {
            outcome,
            cancel: Mutex::new(None),
        }
    }

    /// Withdraws the call. If it has not resolved yet it resolves with
    /// `Cancelled` and the remote side is told to stop working on it.
    pub fn cancel(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            let _ = cancel.send(());
        }
    }
}

impl Future for ResponseFuture {
    type Output = Result<Response, CallError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.outcome).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(CallError::unexpected(
                "call ended without an outcome",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}
