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

//! Call responses.

use super::headers::TransportHeaders;
use crate::buffer::PayloadBuffer;

/// Outcome code of a response frame.
///
/// `Error` is an application level error: the handler ran and answered with
/// an error payload. Transport and dispatch failures are reported as
/// [`CallError`](crate::CallError) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ResponseCode {
    /// The call succeeded.
    #[default]
    Ok = 0x00,
    /// The handler reported an application error.
    Error = 0x01,
}

impl ResponseCode {
    /// Decodes a wire code. Any non-zero value is an application error.
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        if code == 0 { Self::Ok } else { Self::Error }
    }

    /// Returns the wire code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// A call response.
///
/// # Examples
///
/// ```rust
/// use tchannel::{Response, ResponseCode};
///
/// let response = Response::new("title", "hello");
/// assert_eq!(response.code(), ResponseCode::Ok);
/// assert_eq!(response.header(), "title");
/// assert_eq!(response.body(), "hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Response {
    code: ResponseCode,
    method: PayloadBuffer,
    header: PayloadBuffer,
    body: PayloadBuffer,
    transport_headers: TransportHeaders,
}

impl Response {
    /// Creates a successful response.
    #[must_use]
    pub fn new(header: impl Into<PayloadBuffer>, body: impl Into<PayloadBuffer>) -> Self {
        Self {
            code: ResponseCode::Ok,
            method: PayloadBuffer::empty(),
            header: header.into(),
            body: body.into(),
            transport_headers: TransportHeaders::new(),
        }
    }

    /// Creates an application error response.
    #[must_use]
    pub fn application_error(
        header: impl Into<PayloadBuffer>,
        body: impl Into<PayloadBuffer>,
    ) -> Self {
        Self {
            code: ResponseCode::Error,
            ..Self::new(header, body)
        }
    }

    pub(crate) fn from_parts(
        code: ResponseCode,
        args: [PayloadBuffer; 3],
        transport_headers: TransportHeaders,
    ) -> Self {
        let [method, header, body] = args;
        Self {
            code,
            method,
            header,
            body,
            transport_headers,
        }
    }

    /// Adds a transport header.
    #[must_use]
    pub fn with_transport_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport_headers.insert(key.into(), value.into());
        self
    }

    /// Sets the first argument, which echoes the request's method.
    #[must_use]
    pub(crate) fn with_method(mut self, method: PayloadBuffer) -> Self {
        self.method = method;
        self
    }

    /// The response code.
    #[must_use]
    pub fn code(&self) -> ResponseCode {
        self.code
    }

    /// Returns `true` for [`ResponseCode::Ok`].
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }

    /// The first argument: the method this response answers.
    #[must_use]
    pub fn method(&self) -> &PayloadBuffer {
        &self.method
    }

    /// The application header argument.
    #[must_use]
    pub fn header(&self) -> &PayloadBuffer {
        &self.header
    }

    /// The body argument.
    #[must_use]
    pub fn body(&self) -> &PayloadBuffer {
        &self.body
    }

    /// Transport headers.
    #[must_use]
    pub fn transport_headers(&self) -> &TransportHeaders {
        &self.transport_headers
    }

    /// Total size of the three arguments in bytes.
    #[must_use]
    pub fn args_len(&self) -> usize {
        self.method.len() + self.header.len() + self.body.len()
    }

    /// Splits the response into its arguments `[method, header, body]`.
    #[must_use]
    pub fn into_args(self) -> [PayloadBuffer; 3] {
        [self.method, self.header, self.body]
    }

    /// Releases every argument buffer.
    pub fn release(self) {
        drop(self);
    }
}
