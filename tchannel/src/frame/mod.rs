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

//! Wire frames.
//!
//! A connection exchanges a stream of checksummed frames. Call messages whose
//! arguments do not fit a single frame are split across continuation frames
//! carrying the same id ([`CallMessage::encode`]) and put back together on
//! the receiving side ([`FragmentAssembler`]).
//!
//! - [`types`]: frame types, the header and its constants
//! - [`framing`]: async read/write of whole frames with checksum checks
//! - [`codec`]: payload layouts for init, call, error and cancel frames
//! - [`assembler`]: reassembly of fragmented calls

pub mod assembler;
pub mod codec;
mod error;
pub mod framing;
pub mod types;

pub use self::assembler::FragmentAssembler;
pub use self::codec::{CallHead, CallMessage, CancelMessage, ErrorMessage, InitMessage};
pub use self::error::FrameError;
pub use self::framing::{read_frame, write_frame, write_frames};
pub use self::types::{
    CONNECTION_FRAME_ID, FLAG_MORE_FRAGMENTS, FRAME_HEADER_SIZE, Frame, FrameType, INIT_FRAME_ID,
    MAX_FRAME_PAYLOAD, MAX_FRAME_SIZE, PROTOCOL_VERSION,
};
