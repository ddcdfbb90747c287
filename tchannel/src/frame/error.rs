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

//! Frame level errors.
//!
//! Any [`FrameError`] other than an I/O failure means the byte stream can no
//! longer be trusted: frame boundaries may be lost. The connection that
//! produced it answers with a protocol error frame and closes.

use super::types::{FrameType, MAX_FRAME_SIZE};
use std::io;
use thiserror::Error;

/// Errors raised while reading, writing or interpreting frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The underlying transport failed.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: io::Error,
    },

    /// The size field is smaller than the header or larger than the maximum.
    #[error("invalid frame size {size} (maximum {MAX_FRAME_SIZE})")]
    InvalidSize {
        /// The size announced by the header
        size: usize,
    },

    /// The type byte names no known frame type.
    #[error("unknown frame type 0x{0:02x}")]
    UnknownType(u8),

    /// The payload does not match its checksum.
    #[error("checksum mismatch on frame {id}: expected 0x{expected:08x}, computed 0x{actual:08x}")]
    ChecksumMismatch {
        /// Frame id
        id: u32,
        /// Checksum carried in the header
        expected: u32,
        /// Checksum computed over the received payload
        actual: u32,
    },

    /// The payload ended in the middle of a field.
    #[error("truncated {field}")]
    Truncated {
        /// The field being read
        field: &'static str,
    },

    /// The payload is structurally invalid.
    #[error("malformed frame: {reason}")]
    Malformed {
        /// What is wrong with it
        reason: String,
    },

    /// A reassembled message grew beyond the configured limit.
    #[error("message {id} exceeds the limit of {limit} bytes")]
    MessageTooLarge {
        /// Frame id of the message
        id: u32,
        /// The configured limit
        limit: usize,
    },

    /// A frame arrived that is not valid at this point of the exchange.
    #[error("unexpected {frame_type:?} frame with id {id}")]
    Unexpected {
        /// The frame type
        frame_type: FrameType,
        /// The frame id
        id: u32,
    },
}

impl FrameError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error came from the transport rather than from
    /// the bytes it delivered.
    #[must_use]
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
