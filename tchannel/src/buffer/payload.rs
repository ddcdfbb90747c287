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

//! Reference counted argument bytes.

use super::BufferTracker;
use bytes::Bytes;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// A reference counted, releasable byte container for one call argument.
///
/// A `PayloadBuffer` is one acquisition of a byte region. [`retain`] hands
/// out another reference to the same acquisition; [`release`] (or dropping
/// the handle) gives one reference back. The acquisition ends when the last
/// reference is gone, and a tracked buffer reports that to its
/// [`BufferTracker`] exactly once.
///
/// Because `release` consumes the handle, use after release and double
/// release are rejected by the compiler rather than detected at runtime.
///
/// [`retain`]: PayloadBuffer::retain
/// [`release`]: PayloadBuffer::release
///
/// # Examples
///
/// ```rust
/// use tchannel::buffer::PayloadBuffer;
///
/// let body = PayloadBuffer::from("hello");
/// let shared = body.retain();
/// assert_eq!(body.ref_count(), 2);
///
/// shared.release();
/// assert_eq!(body.ref_count(), 1);
/// assert_eq!(&body[..], b"hello");
/// ```
pub struct PayloadBuffer {
    data: Bytes,
    lease: Arc<Lease>,
}

/// Ends one acquisition when the last handle goes away.
struct Lease {
    tracker: Option<BufferTracker>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.release();
        }
    }
}

impl PayloadBuffer {
    /// Wraps bytes in an untracked buffer.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            lease: Arc::new(Lease { tracker: None }),
        }
    }

    /// Wraps bytes in a buffer whose acquisition is counted by `tracker`.
    #[must_use]
    pub fn tracked(data: impl Into<Bytes>, tracker: &BufferTracker) -> Self {
        tracker.acquire();
        Self {
            data: data.into(),
            lease: Arc::new(Lease {
                tracker: Some(tracker.clone()),
            }),
        }
    }

    /// An empty, untracked buffer.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Bytes::new())
    }

    /// Takes another reference to this acquisition.
    #[must_use]
    pub fn retain(&self) -> Self {
        Self {
            data: self.data.clone(),
            lease: Arc::clone(&self.lease),
        }
    }

    /// Gives this reference back.
    pub fn release(self) {
        drop(self);
    }

    /// Number of live references to this acquisition.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.lease)
    }

    /// Returns `true` if the acquisition is counted by a [`BufferTracker`].
    #[must_use]
    pub fn is_tracked(&self) -> bool {
        self.lease.tracker.is_some()
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Interprets the bytes as UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Decodes the bytes as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Releases this reference and returns the bytes, which are no longer
    /// accounted for.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        let Self { data, lease } = self;
        drop(lease);
        data
    }
}

impl Clone for PayloadBuffer {
    fn clone(&self) -> Self {
        self.retain()
    }
}

impl Default for PayloadBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for PayloadBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for PayloadBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl PartialEq for PayloadBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for PayloadBuffer {}

impl PartialEq<[u8]> for PayloadBuffer {
    fn eq(&self, other: &[u8]) -> bool {
        self.data == other
    }
}

impl PartialEq<str> for PayloadBuffer {
    fn eq(&self, other: &str) -> bool {
        self.data == other.as_bytes()
    }
}

impl PartialEq<&str> for PayloadBuffer {
    fn eq(&self, other: &&str) -> bool {
        self.data == other.as_bytes()
    }
}

impl fmt::Debug for PayloadBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadBuffer")
            .field("len", &self.data.len())
            .field("refs", &self.ref_count())
            .field("tracked", &self.is_tracked())
            .finish()
    }
}

impl From<Bytes> for PayloadBuffer {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for PayloadBuffer {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<String> for PayloadBuffer {
    fn from(data: String) -> Self {
        Self::new(data)
    }
}

impl From<&'static str> for PayloadBuffer {
    fn from(data: &'static str) -> Self {
        Self::new(Bytes::from_static(data.as_bytes()))
    }
}

impl From<&'static [u8]> for PayloadBuffer {
    fn from(data: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(data))
    }
}
