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

//! Reassembly of fragmented call messages.

use super::codec::{CallHead, CallMessage, PayloadReader};
use super::{Frame, FrameError};
use bytes::BytesMut;
use std::collections::{HashMap, HashSet};

/// Collects call frames until each message is complete.
///
/// One assembler handles one direction of one id space: a connection keeps
/// one for inbound requests and one for inbound responses.
///
/// # Examples
///
/// ```rust
/// use bytes::Bytes;
/// use tchannel::frame::{CallHead, CallMessage, FragmentAssembler};
/// use tchannel::message::{ResponseCode, TransportHeaders};
///
/// let message = CallMessage {
///     id: 7,
///     head: CallHead::Response { code: ResponseCode::Ok, headers: TransportHeaders::new() },
///     args: [Bytes::from_static(b"echo"), Bytes::new(), Bytes::from(vec![1u8; 500])],
/// };
///
/// let mut assembler = FragmentAssembler::new(1 << 20);
/// let mut complete = None;
/// for frame in message.encode(128).unwrap() {
///     complete = assembler.push(frame).unwrap();
/// }
/// assert_eq!(complete, Some(message));
/// ```
#[derive(Debug)]
pub struct FragmentAssembler {
    max_message_size: usize,
    partial: HashMap<u32, Partial>,
    abandoned: HashSet<u32>,
}

#[derive(Debug)]
struct Partial {
    head: CallHead,
    args: Vec<BytesMut>,
    size: usize,
}

impl Partial {
    fn append(
        &mut self,
        id: u32,
        chunks: Vec<&[u8]>,
        continuing: bool,
        limit: usize,
    ) -> Result<(), FrameError> {
        for (index, chunk) in chunks.into_iter().enumerate() {
            if index == 0 && continuing {
                let Some(last) = self.args.last_mut() else {
                    return Err(FrameError::malformed(format!(
                        "call {id} continues an argument that was never started"
                    )));
                };
                last.extend_from_slice(chunk);
            } else {
                if self.args.len() == 3 {
                    return Err(FrameError::malformed(format!(
                        "call {id} carries more than three arguments"
                    )));
                }
                self.args.push(BytesMut::from(chunk));
            }
            self.size += chunk.len();
            if self.size > limit {
                return Err(FrameError::MessageTooLarge { id, limit });
            }
        }
        Ok(())
    }

    fn finish(self, id: u32) -> Result<CallMessage, FrameError> {
        let count = self.args.len();
        let args: [BytesMut; 3] = self.args.try_into().map_err(|_| {
            FrameError::malformed(format!(
                "call {id} completed with {count} arguments, expected 3"
            ))
        })?;
        Ok(CallMessage {
            id,
            head: self.head,
            args: args.map(BytesMut::freeze),
        })
    }
}

impl FragmentAssembler {
    /// Creates an assembler that rejects messages whose arguments exceed
    /// `max_message_size` bytes in total.
    #[must_use]
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            partial: HashMap::new(),
            abandoned: HashSet::new(),
        }
    }

    /// Feeds one call frame. Returns the message once its last frame arrives.
    pub fn push(&mut self, frame: Frame) -> Result<Option<CallMessage>, FrameError> {
        let id = frame.id;
        let mut reader = PayloadReader::new(&frame.payload);

        if frame.frame_type.is_continuation() {
            if self.abandoned.contains(&id) {
                if !frame.more_fragments {
                    self.abandoned.remove(&id);
                }
                return Ok(None);
            }
            let Some(partial) = self.partial.get_mut(&id) else {
                return Err(FrameError::Unexpected {
                    frame_type: frame.frame_type,
                    id,
                });
            };
            if partial.head.is_request() != frame.frame_type.is_call_request() {
                return Err(FrameError::Unexpected {
                    frame_type: frame.frame_type,
                    id,
                });
            }
            partial.append(id, reader.chunks()?, true, self.max_message_size)?;
            if frame.more_fragments {
                return Ok(None);
            }
            return match self.partial.remove(&id) {
                Some(partial) => partial.finish(id).map(Some),
                None => Ok(None),
            };
        }

        if self.partial.contains_key(&id) {
            return Err(FrameError::malformed(format!("call {id} started twice")));
        }
        self.abandoned.remove(&id);

        let head = CallHead::decode(frame.frame_type, &mut reader)?;
        let mut partial = Partial {
            head,
            args: Vec::with_capacity(3),
            size: 0,
        };
        partial.append(id, reader.chunks()?, false, self.max_message_size)?;

        if frame.more_fragments {
            self.partial.insert(id, partial);
            Ok(None)
        } else {
            partial.finish(id).map(Some)
        }
    }

    /// Drops a partially received message. Its remaining continuation frames
    /// are ignored. Returns `true` if a partial message was dropped.
    pub fn discard(&mut self, id: u32) -> bool {
        if self.partial.remove(&id).is_some() {
            self.abandoned.insert(id);
            true
        } else {
            false
        }
    }

    /// Number of messages still waiting for frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.partial.len()
    }

    /// Returns `true` if no message is waiting for frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partial.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameType;
    use crate::message::TransportHeaders;
    use bytes::Bytes;

    fn request(id: u32, body: Vec<u8>) -> CallMessage {
        CallMessage {
            id,
            head: CallHead::Request {
                ttl_ms: 500,
                service: "svc".to_string(),
                headers: TransportHeaders::new(),
            },
            args: [Bytes::from_static(b"method"), Bytes::from_static(b"hdr"), Bytes::from(body)],
        }
    }

    #[test]
    fn test_single_frame_message() {
        let message = request(1, b"body".to_vec());
        let mut assembler = FragmentAssembler::new(1024);
        let frames = message.encode(1024).unwrap();
        assert_eq!(assembler.push(frames[0].clone()).unwrap(), Some(message));
        assert!(assembler.is_empty());
    }

    #[test]
    fn test_interleaved_messages() {
        let first = request(1, vec![1u8; 300]);
        let second = request(2, vec![2u8; 300]);
        let first_frames = first.encode(100).unwrap();
        let second_frames = second.encode(100).unwrap();
        assert_eq!(first_frames.len(), second_frames.len());

        let mut assembler = FragmentAssembler::new(4096);
        let mut completed = Vec::new();
        for (a, b) in first_frames.into_iter().zip(second_frames) {
            completed.extend(assembler.push(a).unwrap());
            completed.extend(assembler.push(b).unwrap());
        }
        assert_eq!(completed, vec![first, second]);
    }

    #[test]
    fn test_message_limit() {
        let frames = request(5, vec![0u8; 600]).encode(128).unwrap();
        let mut assembler = FragmentAssembler::new(256);
        let mut result = Ok(None);
        for frame in frames {
            result = assembler.push(frame);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(
            result,
            Err(FrameError::MessageTooLarge { id: 5, limit: 256 })
        ));
    }

    #[test]
    fn test_orphan_continuation_is_unexpected() {
        let mut assembler = FragmentAssembler::new(1024);
        let frame = Frame::new(FrameType::CallReqContinue, 3, Bytes::new());
        assert!(matches!(
            assembler.push(frame),
            Err(FrameError::Unexpected { id: 3, .. })
        ));
    }

    #[test]
    fn test_discarded_message_swallows_continuations() {
        let frames = request(8, vec![9u8; 400]).encode(100).unwrap();
        let mut assembler = FragmentAssembler::new(4096);
        let mut frames = frames.into_iter();

        assert_eq!(assembler.push(frames.next().unwrap()).unwrap(), None);
        assert!(assembler.discard(8));
        for frame in frames {
            assert_eq!(assembler.push(frame).unwrap(), None);
        }
        assert!(assembler.is_empty());
        assert!(assembler.abandoned.is_empty());
    }

    #[test]
    fn test_wrong_argument_count() {
        let mut payload = BytesMut::new();
        payload.extend_from_slice(&[0, 0, 0, 1]);
        payload.extend_from_slice(&[1, b's']);
        payload.extend_from_slice(&[0]);
        payload.extend_from_slice(&[0, 1, b'm']);
        let frame = Frame::new(FrameType::CallReq, 2, payload.freeze());

        let mut assembler = FragmentAssembler::new(1024);
        assert!(matches!(
            assembler.push(frame),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn test_mismatched_continuation_direction() {
        let frames = request(6, vec![0u8; 300]).encode(100).unwrap();
        let mut assembler = FragmentAssembler::new(4096);
        assembler.push(frames[0].clone()).unwrap();

        let mut wrong = frames[1].clone();
        wrong.frame_type = FrameType::CallResContinue;
        assert!(matches!(
            assembler.push(wrong),
            Err(FrameError::Unexpected { id: 6, .. })
        ));
    }
}
