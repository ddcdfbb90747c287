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

//! Outbound and inbound requests.

use super::headers::{ARG_SCHEME, RAW_SCHEME, TransportHeaders};
use crate::buffer::PayloadBuffer;
use std::borrow::Cow;
use std::time::Duration;

/// A call addressed to `service::method`.
///
/// The three positional arguments are the method name, the application
/// header and the body. Dropping a request releases its buffers.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tchannel::Request;
///
/// let request = Request::builder("server", "echo")
///     .header("title")
///     .body("hello")
///     .timeout(Duration::from_secs(2))
///     .build();
///
/// assert_eq!(request.service(), "server");
/// assert_eq!(request.method(), "echo");
/// assert_eq!(request.header(), "title");
/// assert_eq!(request.body(), "hello");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    service: String,
    method: PayloadBuffer,
    header: PayloadBuffer,
    body: PayloadBuffer,
    timeout: Option<Duration>,
    transport_headers: TransportHeaders,
}

impl Request {
    /// Starts building a request for `service::method`.
    #[must_use]
    pub fn builder(service: impl Into<String>, method: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(service, method)
    }

    pub(crate) fn from_parts(
        service: String,
        args: [PayloadBuffer; 3],
        timeout: Option<Duration>,
        transport_headers: TransportHeaders,
    ) -> Self {
        let [method, header, body] = args;
        Self {
            service,
            method,
            header,
            body,
            timeout,
            transport_headers,
        }
    }

    /// The target service.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// The method name, decoded lossily from the first argument.
    #[must_use]
    pub fn method(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.method)
    }

    /// The raw first argument.
    #[must_use]
    pub fn method_buffer(&self) -> &PayloadBuffer {
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

    /// The call timeout. On inbound requests this is the remaining
    /// time-to-live announced by the caller.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Transport headers.
    #[must_use]
    pub fn transport_headers(&self) -> &TransportHeaders {
        &self.transport_headers
    }

    /// Looks up a single transport header.
    #[must_use]
    pub fn transport_header(&self, key: &str) -> Option<&str> {
        self.transport_headers.get(key).map(String::as_str)
    }

    /// Total size of the three arguments in bytes.
    #[must_use]
    pub fn args_len(&self) -> usize {
        self.method.len() + self.header.len() + self.body.len()
    }

    /// Applies `timeout` unless the caller set one. Returns the timeout in
    /// effect.
    pub(crate) fn set_timeout_if_absent(&mut self, timeout: Duration) -> Duration {
        *self.timeout.get_or_insert(timeout)
    }

    pub(crate) fn set_transport_header_if_absent(&mut self, key: &str, value: &str) {
        self.transport_headers
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// Splits the request into its arguments `[method, header, body]`.
    #[must_use]
    pub fn into_args(self) -> [PayloadBuffer; 3] {
        [self.method, self.header, self.body]
    }

    /// Releases every argument buffer.
    pub fn release(self) {
        drop(self);
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    service: String,
    method: String,
    header: PayloadBuffer,
    body: PayloadBuffer,
    timeout: Option<Duration>,
    transport_headers: TransportHeaders,
}

impl RequestBuilder {
    /// Creates a builder for `service::method` with empty header and body.
    #[must_use]
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        let mut transport_headers = TransportHeaders::new();
        transport_headers.insert(ARG_SCHEME.to_string(), RAW_SCHEME.to_string());
        Self {
            service: service.into(),
            method: method.into(),
            header: PayloadBuffer::empty(),
            body: PayloadBuffer::empty(),
            timeout: None,
            transport_headers,
        }
    }

    /// Sets the application header argument.
    #[must_use]
    pub fn header(mut self, header: impl Into<PayloadBuffer>) -> Self {
        self.header = header.into();
        self
    }

    /// Sets the body argument.
    #[must_use]
    pub fn body(mut self, body: impl Into<PayloadBuffer>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the call timeout. Without one the channel's default applies.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a transport header.
    #[must_use]
    pub fn transport_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.transport_headers.insert(key.into(), value.into());
        self
    }

    /// Finishes the request.
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            service: self.service,
            method: PayloadBuffer::from(self.method),
            header: self.header,
            body: self.body,
            timeout: self.timeout,
            transport_headers: self.transport_headers,
        }
    }
}
