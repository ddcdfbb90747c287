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

//! Payload buffers for call arguments.
//!
//! Every call carries three positional arguments: the method name, an
//! application header blob and a body blob. Each one travels as a
//! [`PayloadBuffer`]. Buffers that the transport creates for inbound
//! arguments are registered with the channel's [`BufferTracker`] so that
//! leaked buffers show up in [`Channel::live_buffers`](crate::Channel::live_buffers).

mod payload;
mod tracker;

pub use self::payload::PayloadBuffer;
pub use self::tracker::BufferTracker;
