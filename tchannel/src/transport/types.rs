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

//! Transport identity and addressing.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a transport, shared by every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransportId(u64);

impl TransportId {
    /// Allocates the next id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What carries the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransportKind {
    /// A TCP socket.
    Tcp,
    /// An in-process pair.
    Memory,
}

impl TransportKind {
    /// Lower-case name, as used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity and endpoints of one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMetadata {
    /// Unique identifier for this transport
    pub id: TransportId,

    /// What carries the bytes
    pub kind: TransportKind,

    /// Local end, when the transport has an address
    pub local_addr: Option<SocketAddr>,

    /// Remote end, when the transport has an address
    pub peer_addr: Option<SocketAddr>,
}

impl TransportMetadata {
    /// Metadata for a new transport of `kind` with a fresh id and no
    /// addresses.
    #[must_use]
    pub fn new(kind: TransportKind) -> Self {
        Self {
            id: TransportId::next(),
            kind,
            local_addr: None,
            peer_addr: None,
        }
    }

    /// Records both endpoints.
    #[must_use]
    pub fn with_addrs(mut self, local: SocketAddr, peer: SocketAddr) -> Self {
        self.local_addr = Some(local);
        self.peer_addr = Some(peer);
        self
    }
}

impl fmt::Display for TransportMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.id)?;
        if let (Some(local), Some(peer)) = (self.local_addr, self.peer_addr) {
            write!(f, " {local} -> {peer}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let first = TransportMetadata::new(TransportKind::Tcp);
        let second = TransportMetadata::new(TransportKind::Memory);
        assert!(second.id > first.id);
    }

    #[test]
    fn test_display() {
        let local = "127.0.0.1:8080".parse().unwrap();
        let peer = "127.0.0.1:9090".parse().unwrap();
        let metadata = TransportMetadata::new(TransportKind::Tcp).with_addrs(local, peer);

        let shown = metadata.to_string();
        assert!(shown.starts_with("tcp#"));
        assert!(shown.ends_with("127.0.0.1:8080 -> 127.0.0.1:9090"));
        assert_eq!(metadata.peer_addr, Some(peer));
    }
}
