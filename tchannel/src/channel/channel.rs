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

//! The top-level channel.

use super::{ChannelBuilder, ChannelConfig};
use crate::buffer::BufferTracker;
use crate::connection::{ConnectionContext, ResponseFuture};
use crate::error::{Result, TChannelError};
use crate::handler::{CallDispatcher, HandlerRegistry, RequestHandler, SubChannel};
use crate::message::Request;
use crate::peer::{ConnectionStats, PeerManager};
use crate::transport::{TcpTransport, TransportError};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct Listener {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

struct ChannelInner {
    service: String,
    host: String,
    port: u16,
    registry: HandlerRegistry,
    context: Arc<ConnectionContext>,
    peers: PeerManager,
    listener: Mutex<Option<Listener>>,
    shut_down: AtomicBool,
}

/// The RPC endpoint of one process.
///
/// A channel owns the handler registry for the services it serves, the
/// listening socket once [`listen`](Self::listen) was called, and every
/// connection through its [`PeerManager`]. Cloning yields another handle to
/// the same channel.
///
/// # Example
///
/// ```rust,no_run
/// use tchannel::{handler_fn, Channel, Request, Response};
///
/// # async fn example() -> tchannel::Result<()> {
/// let server = Channel::new("server")?;
/// server.register_handler(
///     "server",
///     "echo",
///     handler_fn(|request: Request| async move {
///         Ok(Response::new(request.header().clone(), request.body().clone()))
///     }),
/// );
/// let addr = server.listen().await?;
///
/// let client = Channel::new("client")?;
/// let request = Request::builder("server", "echo").body("hello").build();
/// let response = client.send(request, addr).await?;
/// assert_eq!(response.body(), "hello");
///
/// assert_eq!(client.stats().connections_out, 1);
/// client.shutdown().await;
/// server.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl Channel {
    /// Creates a channel for `service` with the default configuration.
    ///
    /// # Errors
    ///
    /// Fails if `service` is empty.
    pub fn new(service: impl Into<String>) -> Result<Self> {
        ChannelBuilder::new(service).build()
    }

    /// Starts a [`ChannelBuilder`].
    pub fn builder(service: impl Into<String>) -> ChannelBuilder {
        ChannelBuilder::new(service)
    }

    pub(crate) fn from_parts(service: String, host: String, port: u16, config: ChannelConfig) -> Self {
        let registry = HandlerRegistry::new();
        let dispatcher = CallDispatcher::new(registry.clone(), config.default_timeout);
        let context = Arc::new(ConnectionContext::new(
            service.clone(),
            config,
            dispatcher,
            BufferTracker::new(),
        ));
        let peers = PeerManager::new(Arc::clone(&context));
        Self {
            inner: Arc::new(ChannelInner {
                service,
                host,
                port,
                registry,
                context,
                peers,
                listener: Mutex::new(None),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// The local service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// The configuration every connection of this channel uses.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.inner.context.config
    }

    /// A sub-channel for `service`, sharing this channel's connections.
    #[must_use]
    pub fn make_sub_channel(&self, service: impl Into<String>) -> SubChannel {
        let service = service.into();
        let handlers = self.inner.registry.service(&service);
        SubChannel::new(service, handlers, self.inner.peers.clone())
    }

    /// Registers `handler` for calls to `service::method`.
    pub fn register_handler<H: RequestHandler>(
        &self,
        service: &str,
        method: impl Into<String>,
        handler: H,
    ) {
        self.inner.registry.service(service).insert(method, Arc::new(handler));
    }

    /// The handler registry inbound calls are dispatched against.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    /// Binds the listening socket and starts accepting connections.
    ///
    /// Returns the bound address, whose port is the ephemeral one chosen by
    /// the OS when the channel was built with port 0. Once listening, the
    /// address is advertised to every peer in the init exchange. Calling
    /// this again returns the address already bound.
    ///
    /// # Errors
    ///
    /// Returns [`TChannelError::ShutDown`] after [`shutdown`](Self::shutdown)
    /// and a transport error if the address cannot be bound.
    pub async fn listen(&self) -> Result<SocketAddr> {
        if self.is_shut_down() {
            return Err(TChannelError::ShutDown);
        }
        if let Some(addr) = self.listening_addr() {
            return Ok(addr);
        }

        let listener = TcpTransport::bind(format!("{}:{}", self.inner.host, self.inner.port)).await?;
        let addr = listener.local_addr().map_err(TransportError::from)?;

        let mut slot = self.inner.listener.lock();
        if let Some(existing) = slot.as_ref() {
            return Ok(existing.addr);
        }
        if self.is_shut_down() {
            return Err(TChannelError::ShutDown);
        }
        self.inner.context.set_listening_addr(addr);
        let task = tokio::spawn(accept_loop(listener, self.inner.peers.clone()));
        *slot = Some(Listener { addr, task });
        info!(service = %self.inner.service, %addr, "channel listening");
        Ok(addr)
    }

    /// The bound listening address, if [`listen`](Self::listen) succeeded.
    #[must_use]
    pub fn listening_addr(&self) -> Option<SocketAddr> {
        self.inner.listener.lock().as_ref().map(|listener| listener.addr)
    }

    /// Sends `request` to the process listening on `addr`.
    ///
    /// The returned future resolves with the response or with a
    /// [`CallError`](crate::CallError); see [`PeerManager::send`].
    pub fn send(&self, request: Request, addr: SocketAddr) -> ResponseFuture {
        self.inner.peers.send(request, addr)
    }

    /// Established connections per direction.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.inner.peers.stats()
    }

    /// The peer manager owning this channel's connections.
    #[must_use]
    pub fn peer_manager(&self) -> &PeerManager {
        &self.inner.peers
    }

    /// Accounting for the argument buffers this channel created.
    #[must_use]
    pub fn buffer_tracker(&self) -> &BufferTracker {
        &self.inner.context.tracker
    }

    /// Buffer acquisitions not yet released.
    #[must_use]
    pub fn live_buffers(&self) -> u64 {
        self.inner.context.tracker.live()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Stops listening and closes every connection.
    ///
    /// Calls still pending fail with a `NetworkError` before this returns.
    /// Calling it again has no further effect.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            debug!(service = %self.inner.service, "channel already shut down");
            return;
        }
        info!(service = %self.inner.service, "shutting down channel");

        if let Some(listener) = self.inner.listener.lock().take() {
            listener.task.abort();
        }
        self.inner.peers.shutdown().await;
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("service", &self.inner.service)
            .field("listening_addr", &self.listening_addr())
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

async fn accept_loop(listener: TcpListener, peers: PeerManager) {
    loop {
        match TcpTransport::accept(&listener).await {
            Ok((transport, remote_addr)) => {
                debug!(%remote_addr, "accepted connection");
                let peers = peers.clone();
                tokio::spawn(async move {
                    peers.register_inbound(transport).await;
                });
            }
            Err(e) => {
                error!(error = %e, "error accepting connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
