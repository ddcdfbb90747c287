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

//! The transport abstraction.

use crate::transport::{TransportError, TransportMetadata};
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

/// Read half of a split transport.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a split transport.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A bi-directional byte stream a connection can run over.
///
/// Combines Tokio's `AsyncRead` and `AsyncWrite` with metadata and an
/// orderly shutdown.
///
/// # Examples
///
/// ```rust
/// use tchannel::transport::{MemoryTransport, Transport, TransportKind};
///
/// let (client, _server) = MemoryTransport::pair_default();
/// assert_eq!(client.metadata().kind, TransportKind::Memory);
/// ```
pub trait Transport: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {
    /// Returns metadata about this transport.
    fn metadata(&self) -> &TransportMetadata;

    /// Flushes pending writes and closes the write direction.
    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>>;

    /// Splits the transport into independently owned read and write halves,
    /// so that a connection can read and write from separate tasks.
    fn split(self) -> (BoxedReader, BoxedWriter)
    where
        Self: Sized,
    {
        let (reader, writer) = tokio::io::split(self);
        (Box::new(reader), Box::new(writer))
    }
}
