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

#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! The crate is organized in layers, each building on the one below:
//!
//! - **[`transport`]**: Byte streams (TCP, in-memory)
//! - **[`frame`]**: Checksummed frames, fragmentation and reassembly
//! - **[`message`]**: Requests, responses and transport headers
//! - **[`buffer`]**: Reference-counted argument bytes with release accounting
//! - **[`connection`]**: The per-connection state machine, call correlation and timeouts
//! - **[`peer`]**: Connection reuse per remote address and connection stats
//! - **[`handler`]**: Request handlers, sub-channels and inbound dispatch
//! - **[`channel`]**: The top-level endpoint tying everything together
//!
//! ## Error Handling
//!
//! Call outcomes arrive through the [`ResponseFuture`] returned by
//! [`Channel::send`]: a [`Response`] or a [`CallError`] whose [`ErrorType`]
//! says what went wrong. Channel-level operations such as binding the
//! listener return [`TChannelError`].
//!
//! ## Safety
//!
//! This crate is written in 100% safe Rust with `#![deny(unsafe_code)]`.

pub mod buffer;
pub mod channel;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handler;
pub mod message;
pub mod peer;
pub mod transport;

pub use buffer::{BufferTracker, PayloadBuffer};
pub use channel::{Channel, ChannelBuilder, ChannelConfig};
pub use connection::{Connection, ResponseFuture};
pub use error::{CallError, ErrorType, Result, TChannelError};
pub use handler::{handler_fn, HandlerError, RequestHandler, SubChannel};
pub use message::{Request, RequestBuilder, Response, ResponseCode};
pub use peer::{ConnectionStats, PeerManager};
pub use transport::{Transport, TransportError};
