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

//! The init exchange that opens every connection.
//!
//! The initiator sends `InitReq`, the acceptor answers `InitRes`, both with
//! frame id `0`. Each side advertises the address it listens on and its
//! process name. Either side may answer with an `Error` frame instead, which
//! aborts the connection.

use crate::error::ErrorType;
use crate::frame::{
    CONNECTION_FRAME_ID, ErrorMessage, Frame, FrameError, FrameType, INIT_FRAME_ID, InitMessage,
    MAX_FRAME_PAYLOAD, PROTOCOL_VERSION, read_frame, write_frame,
};
use crate::frame::codec::{INIT_HOST_PORT, INIT_PROCESS_NAME};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Identity a peer advertises during the init exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerInfo {
    /// The `host:port` the peer listens on, or `0.0.0.0:0`.
    pub host_port: String,
    /// Free-form process name.
    pub process_name: String,
}

impl PeerInfo {
    /// Creates peer info.
    #[must_use]
    pub fn new(host_port: impl Into<String>, process_name: impl Into<String>) -> Self {
        Self {
            host_port: host_port.into(),
            process_name: process_name.into(),
        }
    }

    /// The advertised address, if it is one a connection could be opened to.
    ///
    /// Unspecified hosts and port `0` mean the peer is not listening.
    ///
    /// ```rust
    /// use tchannel::connection::PeerInfo;
    ///
    /// assert!(PeerInfo::new("127.0.0.1:4040", "p").advertised_addr().is_some());
    /// assert!(PeerInfo::new("0.0.0.0:0", "p").advertised_addr().is_none());
    /// ```
    #[must_use]
    pub fn advertised_addr(&self) -> Option<SocketAddr> {
        let addr: SocketAddr = self.host_port.parse().ok()?;
        if addr.ip().is_unspecified() || addr.port() == 0 {
            None
        } else {
            Some(addr)
        }
    }

    fn to_message(&self) -> InitMessage {
        InitMessage::new(self.host_port.clone(), self.process_name.clone())
    }

    fn from_message(message: &InitMessage) -> Result<Self, HandshakeError> {
        if message.version != PROTOCOL_VERSION {
            return Err(HandshakeError::Version(message.version));
        }
        let host_port = message
            .host_port()
            .ok_or(HandshakeError::MissingHeader(INIT_HOST_PORT))?;
        let process_name = message
            .process_name()
            .ok_or(HandshakeError::MissingHeader(INIT_PROCESS_NAME))?;
        Ok(Self::new(host_port, process_name))
    }
}

impl fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.host_port, self.process_name)
    }
}

/// Ways the init exchange can fail.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The exchange did not finish in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// Reading or writing a frame failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The peer answered with an error frame.
    #[error("peer rejected handshake: {0}")]
    Rejected(String),

    /// The peer closed the stream before answering.
    #[error("peer closed the connection during the handshake")]
    Closed,

    /// The peer speaks another protocol version.
    #[error("unsupported protocol version {0}")]
    Version(u16),

    /// A required init header is absent.
    #[error("missing init header {0:?}")]
    MissingHeader(&'static str),
}

/// Runs the initiating side of the exchange.
pub(crate) async fn initiate<R, W>(
    reader: &mut R,
    writer: &mut W,
    local: &PeerInfo,
    timeout: Duration,
) -> Result<PeerInfo, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tokio::time::timeout(timeout, send_init(reader, writer, local))
        .await
        .map_err(|_| HandshakeError::Timeout(timeout))?
}

/// Runs the accepting side of the exchange.
///
/// A malformed or unexpected `InitReq` is answered with a protocol error
/// frame before failing.
pub(crate) async fn accept<R, W>(
    reader: &mut R,
    writer: &mut W,
    local: &PeerInfo,
    timeout: Duration,
) -> Result<PeerInfo, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tokio::time::timeout(timeout, answer_init(reader, writer, local))
        .await
        .map_err(|_| HandshakeError::Timeout(timeout))?
}

async fn send_init<R, W>(
    reader: &mut R,
    writer: &mut W,
    local: &PeerInfo,
) -> Result<PeerInfo, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = Frame::new(FrameType::InitReq, INIT_FRAME_ID, local.to_message().encode()?);
    write_frame(writer, &request).await?;

    let frame = read_frame(reader).await?.ok_or(HandshakeError::Closed)?;
    match frame.frame_type {
        FrameType::InitRes => PeerInfo::from_message(&InitMessage::decode(&frame.payload)?),
        FrameType::Error => Err(HandshakeError::Rejected(
            ErrorMessage::decode(&frame.payload)?.message,
        )),
        frame_type => Err(FrameError::Unexpected {
            frame_type,
            id: frame.id,
        }
        .into()),
    }
}

async fn answer_init<R, W>(
    reader: &mut R,
    writer: &mut W,
    local: &PeerInfo,
) -> Result<PeerInfo, HandshakeError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let frame = read_frame(reader).await?.ok_or(HandshakeError::Closed)?;
    let remote = match frame.frame_type {
        FrameType::InitReq => InitMessage::decode(&frame.payload)
            .map_err(HandshakeError::from)
            .and_then(|message| PeerInfo::from_message(&message)),
        frame_type => Err(FrameError::Unexpected {
            frame_type,
            id: frame.id,
        }
        .into()),
    };

    match remote {
        Ok(remote) => {
            let response = Frame::new(FrameType::InitRes, INIT_FRAME_ID, local.to_message().encode()?);
            write_frame(writer, &response).await?;
            Ok(remote)
        }
        Err(error) => {
            let payload = ErrorMessage::new(ErrorType::ProtocolError, error.to_string())
                .encode(MAX_FRAME_PAYLOAD);
            let reply = Frame::new(FrameType::Error, CONNECTION_FRAME_ID, payload);
            // The peer may already be gone; report the handshake error either way.
            let _ = write_frame(writer, &reply).await;
            Err(error)
        }
    }
}
