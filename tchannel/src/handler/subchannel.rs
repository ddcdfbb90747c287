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

//! Per-service view of a channel.

use super::{handler_fn, HandlerError, RequestHandler, ServiceHandlers};
use crate::connection::ResponseFuture;
use crate::message::{Request, RequestBuilder, Response};
use crate::peer::PeerManager;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// A channel scoped to one service name.
///
/// Handlers registered here serve inbound calls addressed to this service.
/// Requests built here are addressed to the same service on the remote
/// side. Every sub-channel of a channel shares its connections.
///
/// # Example
///
/// ```rust,no_run
/// use tchannel::{Channel, Request, Response};
///
/// # async fn example() -> tchannel::Result<()> {
/// let channel = Channel::new("server")?;
/// let server = channel.make_sub_channel("server");
/// server.register_fn("echo", |request: Request| async move {
///     Ok(Response::new(request.header().clone(), request.body().clone()))
/// });
/// channel.listen().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SubChannel {
    service: String,
    handlers: Arc<ServiceHandlers>,
    peers: PeerManager,
}

impl SubChannel {
    pub(crate) fn new(service: String, handlers: Arc<ServiceHandlers>, peers: PeerManager) -> Self {
        Self {
            service,
            handlers,
            peers,
        }
    }

    /// The service this sub-channel serves and calls.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Registers `handler` for `method`, replacing any previous one.
    pub fn register<H: RequestHandler>(&self, method: impl Into<String>, handler: H) -> &Self {
        self.handlers.insert(method, Arc::new(handler));
        self
    }

    /// Registers an async closure for `method`.
    pub fn register_fn<F, Fut>(&self, method: impl Into<String>, f: F) -> &Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, HandlerError>> + Send + 'static,
    {
        self.register(method, handler_fn(f))
    }

    /// Methods with a registered handler, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<String> {
        self.handlers.methods()
    }

    /// Starts a request to `method` of this service.
    #[must_use]
    pub fn request(&self, method: impl Into<String>) -> RequestBuilder {
        Request::builder(self.service.clone(), method)
    }

    /// Sends `request` to `addr`. See [`PeerManager::send`].
    pub fn send(&self, request: Request, addr: SocketAddr) -> ResponseFuture {
        self.peers.send(request, addr)
    }
}

impl std::fmt::Debug for SubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubChannel")
            .field("service", &self.service)
            .field("methods", &self.methods())
            .finish()
    }
}
