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

//! Peer bookkeeping and call routing.
//!
//! The [`PeerManager`] maps remote addresses to [`Peer`]s, reuses an
//! established connection for every call to the same address, opens a new
//! outbound connection when none exists and forgets connections once they
//! close.

use super::{ConnectionStats, Peer};
use crate::connection::{Connection, ConnectionContext, Direction, ResponseFuture};
use crate::error::{CallError, TChannelError, CONNECTION_CLOSED_MESSAGE, CONNECT_FAILED_MESSAGE};
use crate::message::{headers, Request};
use crate::transport::{TcpTransport, Transport, TransportError};
use futures_util::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::time::Instant;
use tracing::{debug, info, warn};

struct ManagerInner {
    peers: RwLock<HashMap<SocketAddr, Peer>>,
    context: Arc<ConnectionContext>,
    shutting_down: AtomicBool,
}

/// Owns every connection of a channel, grouped by peer.
///
/// Cloning yields another handle to the same manager.
#[derive(Clone)]
pub struct PeerManager {
    inner: Arc<ManagerInner>,
}

impl PeerManager {
    pub(crate) fn new(context: Arc<ConnectionContext>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                peers: RwLock::new(HashMap::new()),
                context,
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Sends `request` to the process listening on `addr`.
    ///
    /// The call starts right away. Connect failures, timeouts and remote
    /// errors all resolve the returned future with an error; nothing is
    /// raised at the call site.
    pub fn send(&self, mut request: Request, addr: SocketAddr) -> ResponseFuture {
        if self.is_shutting_down() {
            return ResponseFuture::ready(Err(CallError::network(
                CONNECTION_CLOSED_MESSAGE,
            )));
        }

        let context = &self.inner.context;
        let timeout = request.set_timeout_if_absent(context.config.default_timeout);
        request.set_transport_header_if_absent(headers::CALLER_NAME, &context.service);

        let manager = self.clone();
        ResponseFuture::spawn(async move {
            let deadline = Instant::now() + timeout;
            let connection = manager.get_or_create_outbound(addr, deadline).await?;
            connection.send(request, deadline).await
        })
    }

    /// An established connection to `addr`, opening one if needed.
    ///
    /// Concurrent callers for the same address wait on one connection
    /// attempt. Opening a connection is bounded by `deadline` on top of the
    /// configured connect and handshake timeouts. Any failure to connect or
    /// to complete the init exchange, running out of time included, yields
    /// a `NetworkError` reading "Failed to connect to the host".
    pub async fn get_or_create_outbound(
        &self,
        addr: SocketAddr,
        deadline: Instant,
    ) -> Result<Connection, CallError> {
        let peer = self.peer_entry(addr);
        if let Some(connection) = peer.best_connection() {
            return Ok(connection);
        }

        let Ok(_guard) = tokio::time::timeout_at(deadline, peer.connect_guard()).await else {
            debug!(peer = %addr, "deadline passed waiting on another connection attempt");
            return Err(CallError::network(CONNECT_FAILED_MESSAGE));
        };
        // The entry may have been pruned and replaced while this caller waited.
        if let Some(connection) = self.peer(addr).and_then(|peer| peer.best_connection()) {
            return Ok(connection);
        }
        if self.is_shutting_down() {
            return Err(CallError::network(CONNECTION_CLOSED_MESSAGE));
        }

        match self.connect(addr, deadline).await {
            Ok(connection) => {
                if self.attach(addr, connection.clone()) {
                    Ok(connection)
                } else {
                    connection.close().await;
                    Err(CallError::network(CONNECTION_CLOSED_MESSAGE))
                }
            }
            Err(error) => {
                debug!(peer = %addr, %error, "outbound connection failed");
                self.prune(addr);
                Err(CallError::network(CONNECT_FAILED_MESSAGE))
            }
        }
    }

    async fn connect(&self, addr: SocketAddr, deadline: Instant) -> Result<Connection, TChannelError> {
        let context = &self.inner.context;
        let connect_timeout = context.config.connect_timeout;
        let establish = async {
            let transport = tokio::time::timeout(connect_timeout, TcpTransport::connect(addr))
                .await
                .map_err(|_| TransportError::Timeout {
                    duration: connect_timeout,
                })??;
            Ok::<_, TChannelError>(Connection::outbound(transport, Arc::clone(context)).await?)
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout_at(deadline, establish)
            .await
            .map_err(|_| TransportError::Timeout { duration: remaining })?
    }

    /// Runs the accepting side of the init exchange on `transport` and keeps
    /// the connection under the peer that announced itself.
    pub(crate) async fn register_inbound<T: Transport>(&self, mut transport: T) -> Option<Connection> {
        if self.is_shutting_down() {
            let _ = transport.shutdown().await;
            return None;
        }

        let remote_addr = transport.metadata().peer_addr;
        let connection = match Connection::inbound(transport, Arc::clone(&self.inner.context)).await {
            Ok(connection) => connection,
            Err(error) => {
                warn!(?remote_addr, %error, "inbound connection rejected");
                return None;
            }
        };
        let key = connection
            .remote_info()
            .advertised_addr()
            .or(connection.remote_addr())
            .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));
        if !self.attach(key, connection.clone()) {
            connection.close().await;
            return None;
        }
        Some(connection)
    }

    /// Files `connection` under the current peer entry for `addr` and drops
    /// it again once it closes.
    ///
    /// Returns `false` without filing anything once shutdown has begun; the
    /// caller owns closing the connection then.
    fn attach(&self, addr: SocketAddr, connection: Connection) -> bool {
        {
            let mut peers = self.inner.peers.write();
            // Shutdown raises the flag under this lock, so a connection is
            // either in its snapshot or refused here.
            if self.is_shutting_down() {
                return false;
            }
            peers
                .entry(addr)
                .or_insert_with(|| Peer::new(addr))
                .add(connection.clone());
        }
        info!(
            connection_id = connection.id(),
            direction = %connection.direction(),
            peer = %addr,
            "connection added to peer"
        );

        let manager: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            connection.closed().await;
            if let Some(inner) = manager.upgrade() {
                PeerManager { inner }.detach(addr, connection.id());
            }
        });
        true
    }

    fn detach(&self, addr: SocketAddr, connection_id: u64) {
        let mut peers = self.inner.peers.write();
        let Some(peer) = peers.get(&addr) else {
            return;
        };
        if peer.remove(connection_id) {
            debug!(connection_id, peer = %addr, "connection removed from peer");
            if peer.is_empty() {
                peers.remove(&addr);
            }
        }
    }

    fn peer_entry(&self, addr: SocketAddr) -> Peer {
        if let Some(peer) = self.inner.peers.read().get(&addr) {
            return peer.clone();
        }
        self.inner
            .peers
            .write()
            .entry(addr)
            .or_insert_with(|| Peer::new(addr))
            .clone()
    }

    fn prune(&self, addr: SocketAddr) {
        let mut peers = self.inner.peers.write();
        if peers.get(&addr).is_some_and(Peer::is_empty) {
            peers.remove(&addr);
        }
    }

    /// The peer for `addr`, if one is known.
    #[must_use]
    pub fn peer(&self, addr: SocketAddr) -> Option<Peer> {
        self.inner.peers.read().get(&addr).cloned()
    }

    /// Every known peer.
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.peers.read().values().cloned().collect()
    }

    /// Established connection counts over all peers.
    #[must_use]
    pub fn stats(&self) -> ConnectionStats {
        self.inner
            .peers
            .read()
            .values()
            .fold(ConnectionStats::default(), |stats, peer| ConnectionStats {
                connections_in: stats.connections_in + peer.established_count(Direction::Inbound),
                connections_out: stats.connections_out
                    + peer.established_count(Direction::Outbound),
            })
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::Acquire)
    }

    /// Closes every connection. Pending calls fail with a `NetworkError`.
    ///
    /// Calling this more than once has no further effect.
    pub async fn shutdown(&self) {
        let connections: Vec<Connection> = {
            let peers = self.inner.peers.write();
            if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
                return;
            }
            peers.values().flat_map(Peer::connections).collect()
        };
        info!(connections = connections.len(), "closing all connections");

        let grace = self.inner.context.config.shutdown_grace;
        let closing = join_all(connections.iter().map(Connection::close));
        if tokio::time::timeout(grace, closing).await.is_err() {
            warn!(?grace, "connections did not close within the grace period");
        }
        self.inner.peers.write().clear();
    }
}

impl std::fmt::Debug for PeerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerManager")
            .field("peers", &self.inner.peers.read().len())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use crate::connection::context::test_support::context;
    use crate::error::ErrorType;
    use crate::handler::{handler_fn, HandlerError, HandlerRegistry};
    use crate::message::Response;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn echo_registry() -> HandlerRegistry {
        let registry = HandlerRegistry::new();
        registry.service("svc").insert(
            "echo",
            Arc::new(handler_fn(|request: Request| async move {
                Ok::<_, HandlerError>(Response::new(
                    request.header().clone(),
                    request.body().clone(),
                ))
            })),
        );
        registry
    }

    fn manager(service: &str, registry: HandlerRegistry) -> PeerManager {
        PeerManager::new(context(service, registry, ChannelConfig::default()))
    }

    async fn unused_addr() -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        addr
    }

    #[tokio::test]
    async fn test_connect_failure_is_network_error() {
        let peers = manager("client", HandlerRegistry::new());
        let addr = unused_addr().await;

        let error = peers
            .send(Request::builder("svc", "echo").build(), addr)
            .await
            .unwrap_err();
        assert_eq!(error.error_type(), ErrorType::NetworkError);
        assert_eq!(error.message(), "Failed to connect to the host");
        assert!(peers.peer(addr).is_none());
        assert_eq!(peers.stats(), ConnectionStats::default());
    }

    /// Connects `client` to `server` over memory; only the server files its
    /// side of the link.
    async fn connected(client: &PeerManager, server: &PeerManager) -> (Connection, Connection) {
        let (a, b) = MemoryTransport::pair_default();
        let accepting = {
            let server = server.clone();
            tokio::spawn(async move { server.register_inbound(b).await })
        };
        let outbound = Connection::outbound(a, Arc::clone(&client.inner.context))
            .await
            .unwrap();
        let inbound = accepting.await.unwrap().unwrap();
        (outbound, inbound)
    }

    #[tokio::test]
    async fn test_inbound_connection_is_reused_for_calls() {
        let server = manager("server", echo_registry());
        let client = manager("client", echo_registry());
        let (outbound, inbound) = connected(&client, &server).await;
        assert_eq!(inbound.direction(), Direction::Inbound);

        let stats = server.stats();
        assert_eq!(stats.connections_in, 1);
        assert_eq!(stats.connections_out, 0);

        // The client never advertised a listening address, so the server
        // keys it by the unspecified address.
        let key = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let response = server
            .send(Request::builder("svc", "echo").body("back").build(), key)
            .await
            .unwrap();
        assert_eq!(response.body(), "back");

        outbound.close().await;
        inbound.closed().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(server.peer(key).is_none());
        assert_eq!(server.stats(), ConnectionStats::default());
    }

    #[tokio::test]
    async fn test_send_after_shutdown() {
        let peers = manager("client", HandlerRegistry::new());
        peers.shutdown().await;
        peers.shutdown().await;
        assert!(peers.is_shutting_down());

        let error = peers
            .send(Request::builder("svc", "echo").build(), unused_addr().await)
            .await
            .unwrap_err();
        assert_eq!(error.error_type(), ErrorType::NetworkError);
    }

    #[tokio::test]
    async fn test_connection_is_filed_under_the_current_entry() {
        let server = manager("server", echo_registry());
        let client = manager("client", HandlerRegistry::new());
        let addr: SocketAddr = "127.0.0.1:7000".parse().unwrap();

        // A failed attempt prunes the entry another caller still holds.
        let stale = client.peer_entry(addr);
        client.prune(addr);
        assert!(client.peer(addr).is_none());

        let (outbound, inbound) = connected(&client, &server).await;
        assert!(client.attach(addr, outbound.clone()));
        assert!(stale.is_empty());
        assert_eq!(client.stats().connections_out, 1);

        let deadline = Instant::now() + Duration::from_secs(1);
        let reused = client.get_or_create_outbound(addr, deadline).await.unwrap();
        assert_eq!(reused.id(), outbound.id());

        client.shutdown().await;
        assert_eq!(client.stats(), ConnectionStats::default());
        inbound.closed().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(server.stats(), ConnectionStats::default());
    }

    #[tokio::test]
    async fn test_attach_refused_after_shutdown() {
        let server = manager("server", echo_registry());
        let client = manager("client", HandlerRegistry::new());
        let (outbound, inbound) = connected(&client, &server).await;

        client.shutdown().await;
        assert!(!client.attach("127.0.0.1:7000".parse().unwrap(), outbound.clone()));
        assert!(client.peers().is_empty());

        outbound.close().await;
        inbound.closed().await;
    }

    #[tokio::test]
    async fn test_expired_deadline_is_network_error() {
        let client = manager("client", HandlerRegistry::new());
        let addr = unused_addr().await;

        let error = client
            .get_or_create_outbound(addr, Instant::now())
            .await
            .unwrap_err();
        assert_eq!(error.error_type(), ErrorType::NetworkError);
        assert_eq!(error.message(), "Failed to connect to the host");
    }
}
