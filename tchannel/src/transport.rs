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

//! Byte stream transports.
//!
//! A connection runs its frame loop over anything implementing
//! [`Transport`]: an async, bi-directional byte stream with metadata.
//!
//! - [`TcpTransport`]: TCP/IP, used by channels for every real connection
//! - [`MemoryTransport`]: an in-process pair, used to drive connections in
//!   tests without sockets
//!
//! # Examples
//!
//! ```rust,no_run
//! use tchannel::transport::TcpTransport;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = TcpTransport::bind("127.0.0.1:0").await?;
//! let addr = listener.local_addr()?;
//!
//! let client = TcpTransport::connect(addr).await?;
//! let (server, peer) = TcpTransport::accept(&listener).await?;
//! assert_eq!(client.local_addr()?, peer);
//! # drop(server);
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod tcp;
mod traits;
mod types;

pub use self::error::TransportError;
pub use self::memory::MemoryTransport;
pub use self::tcp::TcpTransport;
pub use self::traits::Transport;
pub use self::types::{TransportId, TransportKind, TransportMetadata};
