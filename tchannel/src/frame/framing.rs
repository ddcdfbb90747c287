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

//! Reading and writing checksummed frames on a byte stream.
//!
//! # Examples
//!
//! ```rust
//! use tchannel::frame::{read_frame, write_frame, Frame, FrameType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut buffer = Vec::new();
//! write_frame(&mut buffer, &Frame::new(FrameType::PingReq, 9, Vec::new())).await?;
//!
//! let mut reader = &buffer[..];
//! let frame = read_frame(&mut reader).await?.expect("one frame");
//! assert_eq!(frame.frame_type, FrameType::PingReq);
//! assert_eq!(frame.id, 9);
//! # Ok(())
//! # }
//! ```

use super::{FRAME_HEADER_SIZE, FLAG_MORE_FRAGMENTS, Frame, FrameError, FrameType, MAX_FRAME_SIZE};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Writes one frame and flushes the writer.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(frame.encoded_len());
    frame.encode(&mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Writes a batch of frames with a single flush at the end.
pub async fn write_frames<W>(writer: &mut W, frames: &[Frame]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let total = frames.iter().map(Frame::encoded_len).sum();
    let mut buf = BytesMut::with_capacity(total);
    for frame in frames {
        frame.encode(&mut buf)?;
    }
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame and verifies its checksum.
///
/// Returns `Ok(None)` when the stream ends cleanly on a frame boundary. A
/// stream that ends inside a frame is an I/O error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let first = reader.read(&mut header).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut header[first..]).await?;

    let size = u16::from_be_bytes([header[0], header[1]]) as usize;
    if !(FRAME_HEADER_SIZE..=MAX_FRAME_SIZE).contains(&size) {
        return Err(FrameError::InvalidSize { size });
    }
    let frame_type = FrameType::from_u8(header[2])?;
    let flags = header[3];
    let id = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let expected = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);

    let mut payload = BytesMut::zeroed(size - FRAME_HEADER_SIZE);
    reader.read_exact(&mut payload).await?;

    let actual = crc32c::crc32c(&payload);
    if actual != expected {
        return Err(FrameError::ChecksumMismatch {
            id,
            expected,
            actual,
        });
    }

    Ok(Some(Frame {
        frame_type,
        id,
        more_fragments: flags & FLAG_MORE_FRAGMENTS != 0,
        payload: payload.freeze(),
    }))
}
