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

//! Connection lifecycle state.

use crate::error::{CONNECTION_CLOSED_MESSAGE, CONNECTION_RESET_MESSAGE, CallError};
use std::fmt;

/// Lifecycle of a connection.
///
/// ```text
/// Connecting ──► Established ──► Closing ──► Closed
///      │              │                        ▲
///      └──────────────┴────────────────────────┘
/// ```
///
/// The direct `Established → Closed` edge is taken when the remote side
/// resets or closes the link; a locally initiated close always passes
/// through `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// Transport connected, init handshake in progress.
    Connecting,
    /// Handshake complete; calls may be sent.
    Established,
    /// Local close in progress; new calls are refused.
    Closing,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Established)
                | (Connecting, Closed)
                | (Established, Closing)
                | (Established, Closed)
                | (Closing, Closed)
        )
    }

    /// Returns `true` for `Closed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed)
    }

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Established => "established",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Accepted by our listener.
    Inbound,
    /// Opened by us.
    Outbound,
}

impl Direction {
    /// `"in"` or `"out"`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed locally (shutdown or explicit close).
    Local,
    /// The peer closed the stream on a frame boundary.
    RemoteClosed,
    /// The transport failed mid-stream.
    Reset(String),
    /// The peer sent something we could not accept.
    Protocol(String),
}

impl CloseReason {
    /// The error delivered to calls still pending when the connection closes.
    #[must_use]
    pub fn call_error(&self) -> CallError {
        match self {
            CloseReason::Local => CallError::network(CONNECTION_CLOSED_MESSAGE),
            CloseReason::RemoteClosed | CloseReason::Reset(_) => {
                CallError::network(CONNECTION_RESET_MESSAGE)
            }
            CloseReason::Protocol(message) => CallError::protocol(message.clone()),
        }
    }

    /// The state a connection moves to when closed for this reason.
    ///
    /// Only a local close passes through `Closing`.
    #[must_use]
    pub const fn next_state(&self) -> ConnectionState {
        match self {
            CloseReason::Local => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Local => f.write_str("closed locally"),
            CloseReason::RemoteClosed => f.write_str("closed by peer"),
            CloseReason::Reset(detail) => write!(f, "reset: {detail}"),
            CloseReason::Protocol(detail) => write!(f, "protocol error: {detail}"),
        }
    }
}
