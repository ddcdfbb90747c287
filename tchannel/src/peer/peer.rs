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

//! A remote destination and its connections.

use crate::connection::{Connection, Direction};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Connections {
    outbound: Vec<Connection>,
    inbound: Vec<Connection>,
}

impl Connections {
    fn list(&mut self, direction: Direction) -> &mut Vec<Connection> {
        match direction {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        }
    }
}

#[derive(Debug)]
struct PeerInner {
    addr: SocketAddr,
    connections: Mutex<Connections>,
    connect_lock: tokio::sync::Mutex<()>,
}

/// A remote process, identified by the address it listens on.
///
/// A peer holds the connections to that process in both directions,
/// tracked apart. Cloning yields another handle to the same peer.
#[derive(Debug, Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

impl Peer {
    /// Creates a peer with no connections.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(PeerInner {
                addr,
                connections: Mutex::new(Connections::default()),
                connect_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// The peer's address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// An established connection to use for a new call.
    ///
    /// Outbound connections are preferred; an inbound connection from the
    /// same process serves as well.
    #[must_use]
    pub fn best_connection(&self) -> Option<Connection> {
        let connections = self.inner.connections.lock();
        connections
            .outbound
            .iter()
            .chain(connections.inbound.iter())
            .find(|connection| connection.is_established())
            .cloned()
    }

    /// Adds a connection.
    pub fn add(&self, connection: Connection) {
        let direction = connection.direction();
        self.inner.connections.lock().list(direction).push(connection);
    }

    /// Removes the connection with id `connection_id`. Returns `false` if the
    /// peer did not hold it.
    pub fn remove(&self, connection_id: u64) -> bool {
        let mut connections = self.inner.connections.lock();
        let before = connections.outbound.len() + connections.inbound.len();
        connections.outbound.retain(|c| c.id() != connection_id);
        connections.inbound.retain(|c| c.id() != connection_id);
        before != connections.outbound.len() + connections.inbound.len()
    }

    /// Every connection, outbound first.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        let connections = self.inner.connections.lock();
        connections
            .outbound
            .iter()
            .chain(connections.inbound.iter())
            .cloned()
            .collect()
    }

    /// Number of established connections in `direction`.
    #[must_use]
    pub fn established_count(&self, direction: Direction) -> usize {
        self.inner
            .connections
            .lock()
            .list(direction)
            .iter()
            .filter(|connection| connection.is_established())
            .count()
    }

    /// Returns `true` if the peer holds no connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let connections = self.inner.connections.lock();
        connections.outbound.is_empty() && connections.inbound.is_empty()
    }

    /// Serializes connection attempts to this peer so that concurrent first
    /// calls share one connection.
    pub(crate) async fn connect_guard(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.connect_lock.lock().await
    }
}
