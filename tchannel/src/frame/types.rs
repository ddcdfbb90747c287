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

//! Frame types and the frame header.

use super::FrameError;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the fixed frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// Largest frame, header included.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Largest payload a single frame can carry.
pub const MAX_FRAME_PAYLOAD: usize = MAX_FRAME_SIZE - FRAME_HEADER_SIZE;

/// Frame id addressing the connection itself rather than a call.
pub const CONNECTION_FRAME_ID: u32 = u32::MAX;

/// Frame id used by the init exchange.
pub const INIT_FRAME_ID: u32 = 0;

/// Protocol version sent in init frames.
pub const PROTOCOL_VERSION: u16 = 2;

/// Flag bit marking a call frame whose message continues in a later frame.
pub const FLAG_MORE_FRAGMENTS: u8 = 0x01;

/// Wire frame types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Connection initiation request.
    InitReq = 0x01,
    /// Connection initiation response.
    InitRes = 0x02,
    /// First frame of a call request.
    CallReq = 0x03,
    /// First frame of a call response.
    CallRes = 0x04,
    /// Continuation of a call request.
    CallReqContinue = 0x13,
    /// Continuation of a call response.
    CallResContinue = 0x14,
    /// The caller withdrew a request.
    Cancel = 0xC0,
    /// Liveness probe.
    PingReq = 0xD0,
    /// Liveness probe answer.
    PingRes = 0xD1,
    /// Call or connection level error.
    Error = 0xFF,
}

impl FrameType {
    /// Decodes a type byte.
    pub fn from_u8(value: u8) -> Result<Self, FrameError> {
        Ok(match value {
            0x01 => Self::InitReq,
            0x02 => Self::InitRes,
            0x03 => Self::CallReq,
            0x04 => Self::CallRes,
            0x13 => Self::CallReqContinue,
            0x14 => Self::CallResContinue,
            0xC0 => Self::Cancel,
            0xD0 => Self::PingReq,
            0xD1 => Self::PingRes,
            0xFF => Self::Error,
            other => return Err(FrameError::UnknownType(other)),
        })
    }

    /// Returns `true` for the four call frame types, which may be fragmented.
    #[must_use]
    pub const fn is_call(self) -> bool {
        matches!(
            self,
            Self::CallReq | Self::CallRes | Self::CallReqContinue | Self::CallResContinue
        )
    }

    /// Returns `true` for request side call frames.
    #[must_use]
    pub const fn is_call_request(self) -> bool {
        matches!(self, Self::CallReq | Self::CallReqContinue)
    }

    /// Returns `true` for continuation frames.
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        matches!(self, Self::CallReqContinue | Self::CallResContinue)
    }
}

/// One wire frame.
///
/// ```text
/// size:2  type:1  flags:1  id:4  checksum:4  reserved:4   payload:(size-16)
/// ```
///
/// All integers are big-endian. `size` counts the header, and `checksum` is
/// the CRC32C of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame type.
    pub frame_type: FrameType,
    /// Frame id: a call's correlation id, or one of the reserved ids.
    pub id: u32,
    /// Set when the call message continues in a later frame.
    pub more_fragments: bool,
    /// Frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a frame without the more-fragments flag.
    #[must_use]
    pub fn new(frame_type: FrameType, id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            id,
            more_fragments: false,
            payload: payload.into(),
        }
    }

    /// Sets the more-fragments flag.
    #[must_use]
    pub fn with_more_fragments(mut self, more: bool) -> Self {
        self.more_fragments = more;
        self
    }

    /// Size of the encoded frame, header included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }

    /// Flags byte for the header.
    #[must_use]
    pub fn flags(&self) -> u8 {
        if self.more_fragments {
            FLAG_MORE_FRAGMENTS
        } else {
            0
        }
    }

    /// Appends the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        let size = self.encoded_len();
        if size > MAX_FRAME_SIZE {
            return Err(FrameError::InvalidSize { size });
        }
        dst.reserve(size);
        dst.put_u16(size as u16);
        dst.put_u8(self.frame_type as u8);
        dst.put_u8(self.flags());
        dst.put_u32(self.id);
        dst.put_u32(crc32c::crc32c(&self.payload));
        dst.put_u32(0);
        dst.put_slice(&self.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type_decoding() {
        assert_eq!(FrameType::from_u8(0x03).unwrap(), FrameType::CallReq);
        assert_eq!(FrameType::from_u8(0x14).unwrap(), FrameType::CallResContinue);
        assert!(matches!(
            FrameType::from_u8(0x99),
            Err(FrameError::UnknownType(0x99))
        ));
    }

    #[test]
    fn test_call_classification() {
        assert!(FrameType::CallReqContinue.is_call());
        assert!(FrameType::CallReqContinue.is_call_request());
        assert!(FrameType::CallReqContinue.is_continuation());
        assert!(!FrameType::CallRes.is_call_request());
        assert!(!FrameType::PingReq.is_call());
    }

    #[test]
    fn test_header_layout() {
        let frame = Frame::new(FrameType::CallReq, 0x0102_0304, &b"abc"[..]).with_more_fragments(true);
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();

        assert_eq!(buf.len(), 19);
        assert_eq!(&buf[0..2], &19u16.to_be_bytes());
        assert_eq!(buf[2], 0x03);
        assert_eq!(buf[3], FLAG_MORE_FRAGMENTS);
        assert_eq!(&buf[4..8], &[1, 2, 3, 4]);
        assert_eq!(&buf[8..12], &crc32c::crc32c(b"abc").to_be_bytes());
        assert_eq!(&buf[12..16], &[0, 0, 0, 0]);
        assert_eq!(&buf[16..], b"abc");
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let frame = Frame::new(FrameType::CallReq, 1, vec![0u8; MAX_FRAME_PAYLOAD + 1]);
        let mut buf = BytesMut::new();
        assert!(matches!(
            frame.encode(&mut buf),
            Err(FrameError::InvalidSize { .. })
        ));
        assert!(buf.is_empty());
    }
}
