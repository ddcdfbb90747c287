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

//! State shared by every connection of one channel.

use super::PeerInfo;
use crate::buffer::BufferTracker;
use crate::channel::ChannelConfig;
use crate::frame::codec::EPHEMERAL_HOST_PORT;
use crate::handler::CallDispatcher;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a connection needs from its channel: configuration, the dispatcher
/// for inbound calls, buffer accounting and the identity it advertises.
#[derive(Debug)]
pub(crate) struct ConnectionContext {
    pub(crate) config: ChannelConfig,
    pub(crate) dispatcher: CallDispatcher,
    pub(crate) tracker: BufferTracker,
    pub(crate) service: String,
    local: RwLock<PeerInfo>,
    next_connection_id: AtomicU64,
}

impl ConnectionContext {
    pub(crate) fn new(
        service: impl Into<String>,
        config: ChannelConfig,
        dispatcher: CallDispatcher,
        tracker: BufferTracker,
    ) -> Self {
        let service = service.into();
        let process_name = config
            .process_name
            .clone()
            .unwrap_or_else(|| format!("{service}[{}]", std::process::id()));
        Self {
            local: RwLock::new(PeerInfo::new(EPHEMERAL_HOST_PORT, process_name)),
            config,
            dispatcher,
            tracker,
            service,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// The identity advertised in the init exchange.
    pub(crate) fn local_info(&self) -> PeerInfo {
        self.local.read().clone()
    }

    /// Advertises `addr` as the listening address from now on.
    pub(crate) fn set_listening_addr(&self, addr: SocketAddr) {
        self.local.write().host_port = addr.to_string();
    }

    pub(crate) fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::handler::HandlerRegistry;
    use std::sync::Arc;

    /// A context over `registry` with the given configuration.
    pub(crate) fn context(
        service: &str,
        registry: HandlerRegistry,
        config: ChannelConfig,
    ) -> Arc<ConnectionContext> {
        let dispatcher = CallDispatcher::new(registry, config.default_timeout);
        Arc::new(ConnectionContext::new(
            service,
            config,
            dispatcher,
            BufferTracker::new(),
        ))
    }
}
