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

//! TCP transport implementation.

use crate::transport::{Transport, TransportError, TransportKind, TransportMetadata};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, trace};

/// TCP transport.
///
/// Wraps a Tokio `TcpStream` with `TCP_NODELAY` enabled, since call frames
/// are small and latency sensitive.
///
/// # Examples
///
/// ```rust,no_run
/// use tchannel::transport::{Transport, TcpTransport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = TcpTransport::connect("127.0.0.1:4040".parse()?).await?;
/// println!("connected to {:?}", transport.metadata().peer_addr);
/// # Ok(())
/// # }
/// ```
pub struct TcpTransport {
    stream: TcpStream,
    metadata: TransportMetadata,
}

impl TcpTransport {
    /// Wraps an existing stream.
    pub fn from_stream(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let metadata = TransportMetadata::new(TransportKind::Tcp)
            .with_addrs(stream.local_addr()?, stream.peer_addr()?);
        trace!(transport = %metadata, "created TCP transport");

        Ok(Self { stream, metadata })
    }

    /// Connects to a remote TCP endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConnectionFailed`] if the connection cannot
    /// be established.
    pub async fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        debug!(address = %addr, "connecting");

        let stream = TcpStream::connect(addr).await.map_err(|e| {
            debug!(address = %addr, error = %e, "connect failed");
            TransportError::ConnectionFailed {
                address: addr.to_string(),
                source: e,
            }
        })?;

        Self::from_stream(stream).map_err(|e| TransportError::Io { source: e })
    }

    /// Binds a listener.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the address cannot be bound.
    pub async fn bind(addr: impl Into<String>) -> Result<TcpListener, TransportError> {
        let address = addr.into();

        let listener = TcpListener::bind(&address).await.map_err(|e| {
            debug!(%address, error = %e, "bind failed");
            TransportError::BindFailed {
                address: address.clone(),
                source: e,
            }
        })?;

        debug!(%address, "TCP listener bound");
        Ok(listener)
    }

    /// Accepts an incoming connection from a listener.
    pub async fn accept(listener: &TcpListener) -> Result<(Self, SocketAddr), TransportError> {
        let (stream, peer_addr) = listener
            .accept()
            .await
            .map_err(|e| TransportError::Io { source: e })?;

        debug!(%peer_addr, "accepted TCP connection");

        let transport = Self::from_stream(stream).map_err(|e| TransportError::Io { source: e })?;
        Ok((transport, peer_addr))
    }

    /// Returns the local address of this transport.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Returns the peer address of this transport.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}

impl Transport for TcpTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async move {
            self.stream
                .shutdown()
                .await
                .map_err(|e| TransportError::Io { source: e })
        })
    }
}

impl AsyncRead for TcpTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TcpTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_tcp_connect_and_echo() {
        let listener = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut transport, _) = TcpTransport::accept(&listener).await.unwrap();
            let mut buffer = vec![0u8; 1024];
            let n = transport.read(&mut buffer).await.unwrap();
            transport.write_all(&buffer[..n]).await.unwrap();
        });

        let mut client = TcpTransport::connect(addr).await.unwrap();
        client.write_all(b"frame bytes").await.unwrap();

        let mut buffer = vec![0u8; 1024];
        let n = client.read(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..n], b"frame bytes");

        Transport::shutdown(&mut client).await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_metadata() {
        let listener = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let _ = TcpTransport::accept(&listener).await;
        });

        let transport = TcpTransport::connect(addr).await.unwrap();
        let metadata = transport.metadata();

        assert_eq!(metadata.kind, TransportKind::Tcp);
        assert_eq!(metadata.peer_addr, Some(addr));
        assert!(transport.stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_tcp_connection_refused() {
        let listener = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        match TcpTransport::connect(addr).await {
            Err(TransportError::ConnectionFailed { address, .. }) => {
                assert_eq!(address, addr.to_string());
            }
            Err(other) => panic!("expected ConnectionFailed, got {other}"),
            Ok(_) => panic!("expected ConnectionFailed, got a connection"),
        }
    }

    #[tokio::test]
    async fn test_tcp_bind_conflict() {
        let listener = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let result = TcpTransport::bind(addr.to_string()).await;
        assert!(matches!(result, Err(TransportError::BindFailed { .. })));
    }
}
