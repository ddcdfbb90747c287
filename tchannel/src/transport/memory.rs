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

//! In-memory transport.
//!
//! A connected pair of transports backed by Tokio channels. Connections
//! run over it exactly as they run over TCP, which lets the connection state
//! machine be exercised without sockets.

use crate::transport::{Transport, TransportError, TransportKind, TransportMetadata};
use bytes::{Buf, Bytes};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// One end of an in-memory byte stream.
///
/// # Examples
///
/// ```rust
/// use tchannel::transport::MemoryTransport;
/// use tokio::io::{AsyncReadExt, AsyncWriteExt};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (mut client, mut server) = MemoryTransport::pair(16);
/// client.write_all(b"Hello").await?;
///
/// let mut buffer = [0u8; 5];
/// server.read_exact(&mut buffer).await?;
/// assert_eq!(&buffer, b"Hello");
/// # Ok(())
/// # }
/// ```
pub struct MemoryTransport {
    metadata: TransportMetadata,
    rx: mpsc::Receiver<Bytes>,
    current: Bytes,
    tx: Option<mpsc::Sender<Bytes>>,
}

impl MemoryTransport {
    /// Creates a connected pair. `buffer_size` bounds the number of writes
    /// in flight in each direction.
    pub fn pair(buffer_size: usize) -> (Self, Self) {
        let (tx1, rx1) = mpsc::channel(buffer_size.max(1));
        let (tx2, rx2) = mpsc::channel(buffer_size.max(1));

        let first = Self {
            metadata: TransportMetadata::new(TransportKind::Memory),
            rx: rx2,
            current: Bytes::new(),
            tx: Some(tx1),
        };
        let second = Self {
            metadata: TransportMetadata::new(TransportKind::Memory),
            rx: rx1,
            current: Bytes::new(),
            tx: Some(tx2),
        };
        (first, second)
    }

    /// Creates a connected pair with the default buffer size.
    pub fn pair_default() -> (Self, Self) {
        Self::pair(DEFAULT_BUFFER_SIZE)
    }

    /// Creates a connected pair whose metadata reports the given addresses,
    /// as if `a` had connected to `b`.
    pub fn pair_between(a: SocketAddr, b: SocketAddr) -> (Self, Self) {
        let (mut first, mut second) = Self::pair_default();
        first.metadata = first.metadata.with_addrs(a, b);
        second.metadata = second.metadata.with_addrs(b, a);
        (first, second)
    }
}

impl Transport for MemoryTransport {
    fn metadata(&self) -> &TransportMetadata {
        &self.metadata
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async move {
            self.tx = None;
            Ok(())
        })
    }
}

impl AsyncRead for MemoryTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.current.is_empty() {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => self.current = chunk,
                // All senders gone: end of stream.
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
        let n = self.current.len().min(buf.remaining());
        buf.put_slice(&self.current[..n]);
        self.current.advance(n);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MemoryTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let Some(tx) = this.tx.as_ref() else {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory transport shut down",
            )));
        };
        match tx.try_send(Bytes::copy_from_slice(buf)) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(mpsc::error::TrySendError::Full(_)) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "memory transport closed",
            ))),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().tx = None;
        Poll::Ready(Ok(()))
    }
}
