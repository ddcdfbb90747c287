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

//! Channels: the top-level RPC endpoint.
//!
//! A [`Channel`] is built once per process with a [`ChannelBuilder`] and a
//! [`ChannelConfig`]. It serves the handlers registered on its
//! [`SubChannel`](crate::SubChannel)s and sends calls to other processes.

mod builder;
mod channel;
mod config;

pub use self::builder::{ChannelBuilder, DEFAULT_HOST};
pub use self::channel::Channel;
pub use self::config::{ChannelConfig, MIN_FRAME_PAYLOAD};
