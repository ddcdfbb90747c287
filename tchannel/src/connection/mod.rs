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

//! Connections and the per-connection call machinery.
//!
//! A [`Connection`] owns one transport link. It runs a reader task that
//! decodes and routes frames, a writer task that serializes outbound frames,
//! and a timer task that expires calls whose deadline passed. Outbound calls
//! are tracked in [`PendingCalls`] under ids from [`CorrelationIds`] with
//! deadlines held by the [`TimeoutManager`].

mod connection;
pub(crate) mod context;
mod correlation;
mod future;
mod handshake;
mod pending;
mod state;
mod timeout;

pub use self::connection::Connection;
pub(crate) use self::context::ConnectionContext;
pub use self::correlation::CorrelationIds;
pub use self::future::ResponseFuture;
pub use self::handshake::{HandshakeError, PeerInfo};
pub use self::pending::{CallReceiver, CallSender, PendingCalls};
pub use self::state::{CloseReason, ConnectionState, Direction};
pub use self::timeout::TimeoutManager;
