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

//! Request handlers and their dispatch.
//!
//! A handler implements one capability, [`RequestHandler::handle`]. Handlers
//! are registered per service and method on a [`SubChannel`]; the
//! [`CallDispatcher`] looks them up for every inbound call.
//!
//! # Examples
//!
//! ```rust
//! use tchannel::handler::{handler_fn, RequestHandler};
//! use tchannel::{Request, Response};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let echo = handler_fn(|request: Request| async move {
//!     Ok(Response::new(request.header().clone(), request.body().clone()))
//! });
//!
//! let request = Request::builder("server", "echo").header("h").body("b").build();
//! let response = echo.handle(request).await?;
//! assert_eq!(response.body(), "b");
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod registry;
mod subchannel;

pub use self::dispatch::CallDispatcher;
pub use self::registry::{HandlerRegistry, ServiceHandlers};
pub use self::subchannel::SubChannel;

use crate::message::{Request, Response};
use async_trait::async_trait;
use std::future::Future;

/// Error a handler may fail with.
///
/// Returning a [`CallError`](crate::CallError) sends its type and message to
/// the caller unchanged. Any other error reaches the caller as
/// `UnexpectedError` carrying the error's display text.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Serves calls to one method.
///
/// The handler owns the request it is given; buffers it does not move into
/// the response are released when the request is dropped.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Handles one call.
    async fn handle(&self, request: Request) -> Result<Response, HandlerError>;
}

/// Adapts an async closure into a [`RequestHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    FnHandler { f }
}

/// A [`RequestHandler`] backed by a closure. See [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    async fn handle(&self, request: Request) -> Result<Response, HandlerError> {
        (self.f)(request).await
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}
