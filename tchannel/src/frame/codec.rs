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

//! Payload layouts and the fragmenting call encoder.
//!
//! Length prefixes are written `~N`, meaning an N byte big-endian length
//! followed by that many bytes.
//!
//! ```text
//! init req/res  version:2 nh:2 (key~2 value~2){nh}
//! call req      ttl_ms:4 service~1 nh:1 (key~1 value~1){nh} chunk*
//! call res      code:1 nh:1 (key~1 value~1){nh} chunk*
//! continuation  chunk*
//! chunk         len:2 bytes:len
//! error         code:1 message~2
//! cancel        message~2
//! ```
//!
//! The chunks of a call's first frame are its arguments in order. The first
//! chunk of a continuation frame extends the last argument of the previous
//! frame (possibly by zero bytes); every further chunk starts a new argument.

use super::{Frame, FrameError, FrameType, PROTOCOL_VERSION};
use crate::error::ErrorType;
use crate::message::headers::{MAX_HEADER_LEN, MAX_HEADERS};
use crate::message::{ResponseCode, TransportHeaders};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;

/// Size of the length prefix in front of every argument chunk.
pub const CHUNK_HEADER_SIZE: usize = 2;

/// Init header naming the sender's listening address.
pub const INIT_HOST_PORT: &str = "host_port";

/// Init header naming the sender's process.
pub const INIT_PROCESS_NAME: &str = "process_name";

/// Address advertised by a connection initiator that is not listening.
pub const EPHEMERAL_HOST_PORT: &str = "0.0.0.0:0";

/// Bounds-checked cursor over a frame payload.
pub(crate) struct PayloadReader<'a> {
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], FrameError> {
        if self.buf.len() < len {
            return Err(FrameError::Truncated { field });
        }
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, FrameError> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, FrameError> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, FrameError> {
        let bytes = self.take(4, field)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn string(&mut self, len: usize, field: &'static str) -> Result<String, FrameError> {
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| FrameError::malformed(format!("{field} is not valid UTF-8")))
    }

    fn string1(&mut self, field: &'static str) -> Result<String, FrameError> {
        let len = self.u8(field)? as usize;
        self.string(len, field)
    }

    fn string2(&mut self, field: &'static str) -> Result<String, FrameError> {
        let len = self.u16(field)? as usize;
        self.string(len, field)
    }

    pub(crate) fn chunks(&mut self) -> Result<Vec<&'a [u8]>, FrameError> {
        let mut chunks = Vec::new();
        while !self.is_empty() {
            let len = self.u16("argument length")? as usize;
            chunks.push(self.take(len, "argument")?);
        }
        Ok(chunks)
    }
}

fn put_string1(dst: &mut BytesMut, value: &str, field: &str) -> Result<(), FrameError> {
    if value.len() > MAX_HEADER_LEN {
        return Err(FrameError::malformed(format!(
            "{field} is {} bytes, limit is {MAX_HEADER_LEN}",
            value.len()
        )));
    }
    dst.put_u8(value.len() as u8);
    dst.put_slice(value.as_bytes());
    Ok(())
}

fn put_string2(dst: &mut BytesMut, value: &str, field: &str) -> Result<(), FrameError> {
    if value.len() > u16::MAX as usize {
        return Err(FrameError::malformed(format!(
            "{field} is {} bytes, limit is {}",
            value.len(),
            u16::MAX
        )));
    }
    dst.put_u16(value.len() as u16);
    dst.put_slice(value.as_bytes());
    Ok(())
}

fn put_headers1(dst: &mut BytesMut, headers: &TransportHeaders) -> Result<(), FrameError> {
    if headers.len() > MAX_HEADERS {
        return Err(FrameError::malformed(format!(
            "{} transport headers, limit is {MAX_HEADERS}",
            headers.len()
        )));
    }
    dst.put_u8(headers.len() as u8);
    for (key, value) in headers {
        put_string1(dst, key, "transport header key")?;
        put_string1(dst, value, "transport header value")?;
    }
    Ok(())
}

fn read_headers1(reader: &mut PayloadReader<'_>) -> Result<TransportHeaders, FrameError> {
    let count = reader.u8("transport header count")?;
    let mut headers = TransportHeaders::new();
    for _ in 0..count {
        let key = reader.string1("transport header key")?;
        let value = reader.string1("transport header value")?;
        headers.insert(key, value);
    }
    Ok(headers)
}

/// Truncates `message` to at most `max` bytes on a character boundary.
fn truncate_utf8(message: &str, max: usize) -> &str {
    if message.len() <= max {
        return message;
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}

/// Metadata carried at the start of a call's first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallHead {
    /// Request metadata.
    Request {
        /// Remaining time-to-live in milliseconds.
        ttl_ms: u32,
        /// Target service.
        service: String,
        /// Transport headers.
        headers: TransportHeaders,
    },
    /// Response metadata.
    Response {
        /// Outcome code.
        code: ResponseCode,
        /// Transport headers.
        headers: TransportHeaders,
    },
}

impl CallHead {
    /// Returns `true` for request metadata.
    #[must_use]
    pub fn is_request(&self) -> bool {
        matches!(self, Self::Request { .. })
    }

    fn frame_types(&self) -> (FrameType, FrameType) {
        match self {
            Self::Request { .. } => (FrameType::CallReq, FrameType::CallReqContinue),
            Self::Response { .. } => (FrameType::CallRes, FrameType::CallResContinue),
        }
    }

    fn encode(&self, dst: &mut BytesMut) -> Result<(), FrameError> {
        match self {
            Self::Request {
                ttl_ms,
                service,
                headers,
            } => {
                dst.put_u32(*ttl_ms);
                put_string1(dst, service, "service name")?;
                put_headers1(dst, headers)
            }
            Self::Response { code, headers } => {
                dst.put_u8(code.code());
                put_headers1(dst, headers)
            }
        }
    }

    pub(crate) fn decode(
        frame_type: FrameType,
        reader: &mut PayloadReader<'_>,
    ) -> Result<Self, FrameError> {
        match frame_type {
            FrameType::CallReq => {
                let ttl_ms = reader.u32("ttl")?;
                let service = reader.string1("service name")?;
                let headers = read_headers1(reader)?;
                Ok(Self::Request {
                    ttl_ms,
                    service,
                    headers,
                })
            }
            FrameType::CallRes => {
                let code = ResponseCode::from_code(reader.u8("response code")?);
                let headers = read_headers1(reader)?;
                Ok(Self::Response { code, headers })
            }
            other => Err(FrameError::malformed(format!(
                "{other:?} frames carry no call metadata"
            ))),
        }
    }
}

/// A complete call message: metadata plus the three arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMessage {
    /// Correlation id.
    pub id: u32,
    /// Call metadata.
    pub head: CallHead,
    /// `[method, header, body]`.
    pub args: [Bytes; 3],
}

impl CallMessage {
    /// Total size of the arguments in bytes.
    #[must_use]
    pub fn args_len(&self) -> usize {
        self.args.iter().map(Bytes::len).sum()
    }

    /// Splits the message into frames whose payloads are at most
    /// `max_payload` bytes.
    ///
    /// Every frame but the last carries the more-fragments flag.
    pub fn encode(&self, max_payload: usize) -> Result<Vec<Frame>, FrameError> {
        let mut first = BytesMut::new();
        self.head.encode(&mut first)?;
        if first.len() + CHUNK_HEADER_SIZE > max_payload {
            return Err(FrameError::malformed(format!(
                "call metadata of {} bytes does not fit a {max_payload} byte frame",
                first.len()
            )));
        }

        let (first_type, continue_type) = self.head.frame_types();
        let mut fragmenter = Fragmenter {
            id: self.id,
            first_type,
            continue_type,
            frames: Vec::new(),
            current: first,
        };

        for arg in &self.args {
            let mut rest: &[u8] = arg;
            let mut started = false;
            loop {
                let space = max_payload - fragmenter.current.len();
                if space < CHUNK_HEADER_SIZE {
                    fragmenter.flush(true);
                    if !started {
                        // Close out the previous argument before this one starts.
                        fragmenter.current.put_u16(0);
                    }
                    continue;
                }
                let take = rest.len().min(space - CHUNK_HEADER_SIZE);
                fragmenter.current.put_u16(take as u16);
                fragmenter.current.put_slice(&rest[..take]);
                rest = &rest[take..];
                started = true;
                if rest.is_empty() {
                    break;
                }
                fragmenter.flush(true);
            }
        }
        fragmenter.flush(false);
        Ok(fragmenter.frames)
    }
}

struct Fragmenter {
    id: u32,
    first_type: FrameType,
    continue_type: FrameType,
    frames: Vec<Frame>,
    current: BytesMut,
}

impl Fragmenter {
    fn flush(&mut self, more: bool) {
        let frame_type = if self.frames.is_empty() {
            self.first_type
        } else {
            self.continue_type
        };
        let payload = std::mem::take(&mut self.current).freeze();
        self.frames
            .push(Frame::new(frame_type, self.id, payload).with_more_fragments(more));
    }
}

/// Payload of `InitReq` and `InitRes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitMessage {
    /// Protocol version.
    pub version: u16,
    /// Init headers; `host_port` and `process_name` are required.
    pub headers: BTreeMap<String, String>,
}

impl InitMessage {
    /// Creates an init payload for the current protocol version.
    #[must_use]
    pub fn new(host_port: impl Into<String>, process_name: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(INIT_HOST_PORT.to_string(), host_port.into());
        headers.insert(INIT_PROCESS_NAME.to_string(), process_name.into());
        Self {
            version: PROTOCOL_VERSION,
            headers,
        }
    }

    /// The advertised `host_port` header.
    #[must_use]
    pub fn host_port(&self) -> Option<&str> {
        self.headers.get(INIT_HOST_PORT).map(String::as_str)
    }

    /// The advertised `process_name` header.
    #[must_use]
    pub fn process_name(&self) -> Option<&str> {
        self.headers.get(INIT_PROCESS_NAME).map(String::as_str)
    }

    /// Encodes the payload.
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let mut dst = BytesMut::new();
        dst.put_u16(self.version);
        if self.headers.len() > u16::MAX as usize {
            return Err(FrameError::malformed("too many init headers"));
        }
        dst.put_u16(self.headers.len() as u16);
        for (key, value) in &self.headers {
            put_string2(&mut dst, key, "init header key")?;
            put_string2(&mut dst, value, "init header value")?;
        }
        Ok(dst.freeze())
    }

    /// Decodes the payload.
    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        let mut reader = PayloadReader::new(payload);
        let version = reader.u16("init version")?;
        let count = reader.u16("init header count")?;
        let mut headers = BTreeMap::new();
        for _ in 0..count {
            let key = reader.string2("init header key")?;
            let value = reader.string2("init header value")?;
            headers.insert(key, value);
        }
        Ok(Self { version, headers })
    }
}

/// Payload of an `Error` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    /// Error type.
    pub error_type: ErrorType,
    /// Human readable message.
    pub message: String,
}

impl ErrorMessage {
    /// Creates an error payload.
    #[must_use]
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }

    /// Encodes the payload, cutting the message short if it would not fit
    /// in `max_payload` bytes.
    #[must_use]
    pub fn encode(&self, max_payload: usize) -> Bytes {
        let limit = max_payload.saturating_sub(3).min(u16::MAX as usize);
        let message = truncate_utf8(&self.message, limit);
        let mut dst = BytesMut::with_capacity(3 + message.len());
        dst.put_u8(self.error_type.code());
        dst.put_u16(message.len() as u16);
        dst.put_slice(message.as_bytes());
        dst.freeze()
    }

    /// Decodes the payload.
    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        let mut reader = PayloadReader::new(payload);
        let error_type = ErrorType::from_code(reader.u8("error code")?);
        let message = reader.string2("error message")?;
        Ok(Self {
            error_type,
            message,
        })
    }
}

/// Payload of a `Cancel` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelMessage {
    /// Why the caller gave up.
    pub message: String,
}

impl CancelMessage {
    /// Creates a cancel payload.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Encodes the payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let message = truncate_utf8(&self.message, u16::MAX as usize);
        let mut dst = BytesMut::with_capacity(2 + message.len());
        dst.put_u16(message.len() as u16);
        dst.put_slice(message.as_bytes());
        dst.freeze()
    }

    /// Decodes the payload.
    pub fn decode(payload: &[u8]) -> Result<Self, FrameError> {
        let mut reader = PayloadReader::new(payload);
        Ok(Self {
            message: reader.string2("cancel message")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MAX_FRAME_PAYLOAD;

    fn request(id: u32, args: [&'static [u8]; 3]) -> CallMessage {
        CallMessage {
            id,
            head: CallHead::Request {
                ttl_ms: 2000,
                service: "server".to_string(),
                headers: TransportHeaders::new(),
            },
            args: args.map(Bytes::from_static),
        }
    }

    #[test]
    fn test_small_call_fits_one_frame() {
        let frames = request(1, [b"echo", b"title", b"hello"])
            .encode(MAX_FRAME_PAYLOAD)
            .unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].frame_type, FrameType::CallReq);
        assert!(!frames[0].more_fragments);

        let mut reader = PayloadReader::new(&frames[0].payload);
        let head = CallHead::decode(FrameType::CallReq, &mut reader).unwrap();
        assert!(head.is_request());
        let chunks = reader.chunks().unwrap();
        assert_eq!(chunks, vec![&b"echo"[..], b"title", b"hello"]);
    }

    #[test]
    fn test_large_body_spans_frames() {
        let body = vec![0xABu8; 200];
        let message = CallMessage {
            args: [
                Bytes::from_static(b"m"),
                Bytes::new(),
                Bytes::from(body.clone()),
            ],
            ..request(9, [b"", b"", b""])
        };
        let frames = message.encode(64).unwrap();

        assert!(frames.len() > 3);
        assert_eq!(frames[0].frame_type, FrameType::CallReq);
        for frame in &frames[1..] {
            assert_eq!(frame.frame_type, FrameType::CallReqContinue);
            assert_eq!(frame.id, 9);
        }
        for frame in &frames[..frames.len() - 1] {
            assert!(frame.more_fragments);
            assert!(frame.payload.len() <= 64);
        }
        assert!(!frames.last().unwrap().more_fragments);
    }

    #[test]
    fn test_argument_boundary_on_frame_edge() {
        // Head is 4 + 7 + 1 = 12 bytes, so a 50 byte first argument fills the
        // 64 byte frame exactly.
        let first = vec![1u8; 50];
        let message = CallMessage {
            args: [Bytes::from(first), Bytes::from_static(b"h"), Bytes::from_static(b"b")],
            ..request(4, [b"", b"", b""])
        };
        let frames = message.encode(64).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload.len(), 64);

        // The continuation starts with an empty chunk closing the first
        // argument, then the two remaining arguments.
        let chunks = PayloadReader::new(&frames[1].payload).chunks().unwrap();
        assert_eq!(chunks, vec![&b""[..], b"h", b"b"]);
    }

    #[test]
    fn test_oversized_metadata_rejected() {
        let message = CallMessage {
            head: CallHead::Request {
                ttl_ms: 1,
                service: "s".repeat(40),
                headers: TransportHeaders::new(),
            },
            ..request(1, [b"", b"", b""])
        };
        assert!(matches!(
            message.encode(32),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn test_header_value_too_long() {
        let mut headers = TransportHeaders::new();
        headers.insert("k".to_string(), "v".repeat(300));
        let message = CallMessage {
            head: CallHead::Response {
                code: ResponseCode::Ok,
                headers,
            },
            ..request(1, [b"", b"", b""])
        };
        assert!(message.encode(MAX_FRAME_PAYLOAD).is_err());
    }

    #[test]
    fn test_init_message() {
        let init = InitMessage::new("127.0.0.1:4040", "server[42]");
        let decoded = InitMessage::decode(&init.encode().unwrap()).unwrap();
        assert_eq!(decoded.version, PROTOCOL_VERSION);
        assert_eq!(decoded.host_port(), Some("127.0.0.1:4040"));
        assert_eq!(decoded.process_name(), Some("server[42]"));
    }

    #[test]
    fn test_error_message_truncated_to_fit() {
        let error = ErrorMessage::new(ErrorType::UnexpectedError, "é".repeat(40));
        let payload = error.encode(20);
        assert!(payload.len() <= 20);
        let decoded = ErrorMessage::decode(&payload).unwrap();
        assert_eq!(decoded.error_type, ErrorType::UnexpectedError);
        assert_eq!(decoded.message, "é".repeat(8));
    }

    #[test]
    fn test_truncated_payloads() {
        assert!(matches!(
            ErrorMessage::decode(&[0x06, 0x00]),
            Err(FrameError::Truncated { .. })
        ));
        assert!(matches!(
            PayloadReader::new(&[0x00, 0x05, b'a']).chunks(),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn test_cancel_message() {
        let cancel = CancelMessage::new("caller gave up");
        assert_eq!(CancelMessage::decode(&cancel.encode()).unwrap(), cancel);
    }
}
