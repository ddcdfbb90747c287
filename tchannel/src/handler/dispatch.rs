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

//! Inbound call dispatch.

use super::HandlerRegistry;
use crate::error::CallError;
use crate::message::{Request, Response};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves the handler for an inbound call and runs it.
///
/// Whatever the handler does, the dispatcher produces an outcome for the
/// caller: a missing handler is `BadRequest`, an overrun of the call's
/// time-to-live is `Timeout`, and a failing or panicking handler is
/// `UnexpectedError`. A handler fault never reaches the connection.
#[derive(Debug, Clone)]
pub struct CallDispatcher {
    registry: HandlerRegistry,
    default_timeout: Duration,
}

impl CallDispatcher {
    /// Creates a dispatcher over `registry`. Calls without a time-to-live
    /// are bounded by `default_timeout`.
    #[must_use]
    pub fn new(registry: HandlerRegistry, default_timeout: Duration) -> Self {
        Self {
            registry,
            default_timeout,
        }
    }

    /// The registry handlers are looked up in.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Runs the handler for `request` and returns the response to send back.
    ///
    /// A successful response carries the request's method name as its first
    /// argument.
    pub async fn dispatch(&self, request: Request) -> Result<Response, CallError> {
        let service = request.service().to_string();
        let method = request.method().into_owned();

        let Some(handler) = self.registry.lookup(&service, &method) else {
            debug!(%service, %method, "no handler registered");
            return Err(CallError::bad_request(format!(
                "no handler for service \"{service}\" and method \"{method}\""
            )));
        };

        let ttl = request.timeout().unwrap_or(self.default_timeout);
        let method_name = request.method_buffer().retain();
        debug!(%service, %method, ?ttl, "dispatching call");

        let outcome = tokio::time::timeout(
            ttl,
            AssertUnwindSafe(handler.handle(request)).catch_unwind(),
        )
        .await;

        match outcome {
            Ok(Ok(Ok(response))) => Ok(response.with_method(method_name)),
            Ok(Ok(Err(error))) => match error.downcast::<CallError>() {
                Ok(error) => {
                    debug!(%service, %method, %error, "handler declined the call");
                    Err(*error)
                }
                Err(error) => {
                    warn!(%service, %method, %error, "handler failed");
                    Err(CallError::unexpected(error.to_string()))
                }
            },
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                warn!(%service, %method, %message, "handler panicked");
                Err(CallError::unexpected(message))
            }
            Err(_) => {
                debug!(%service, %method, ?ttl, "handler exceeded the call's time-to-live");
                Err(CallError::timeout(format!(
                    "handler for {service}::{method} did not finish within {ttl:?}"
                )))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
