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

//! Error types for tchannel.
//!
//! Errors are split by the scope they affect:
//!
//! - [`TransportError`]: socket level failures (connect, bind, read, write)
//! - [`FrameError`]: malformed or corrupt wire data; always fatal to the
//!   connection it arrived on
//! - [`CallError`]: the outcome of a single call that did not produce a
//!   response. Delivered through the same future a successful response would
//!   use and never closes the connection on its own.
//! - [`TChannelError`]: errors returned by the channel API itself
//!
//! Every [`CallError`] carries an [`ErrorType`], which is also the code sent
//! on the wire inside an error frame.
//!
//! # Examples
//!
//! ```rust
//! use tchannel::{CallError, ErrorType};
//!
//! let error = CallError::network("Failed to connect to the host");
//! assert_eq!(error.error_type(), ErrorType::NetworkError);
//! assert_eq!(error.message(), "Failed to connect to the host");
//! assert!(error.is_retryable());
//! ```

use crate::connection::HandshakeError;
use crate::frame::FrameError;
use crate::transport::TransportError;
use std::fmt;
use thiserror::Error;

/// Message used for every failure to establish an outbound connection.
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to connect to the host";

/// Message used when an established connection is lost abruptly.
pub const CONNECTION_RESET_MESSAGE: &str = "Connection was reset";

/// Message used when a connection is closed while calls are still pending.
pub const CONNECTION_CLOSED_MESSAGE: &str = "Connection was closed";

/// Kind of a call-level failure, with its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ErrorType {
    /// The call deadline passed before a response arrived.
    Timeout = 0x01,
    /// The caller withdrew interest in the call.
    Cancelled = 0x02,
    /// The callee is too busy to accept the call.
    Busy = 0x03,
    /// The callee declined the call for reasons other than load.
    Declined = 0x04,
    /// The handler failed while processing the call.
    UnexpectedError = 0x05,
    /// The call was malformed or addressed an unknown operation.
    BadRequest = 0x06,
    /// The connection could not be established or was lost mid-call.
    NetworkError = 0x07,
    /// The callee reports itself as unhealthy.
    Unhealthy = 0x08,
    /// The peer violated the wire protocol.
    ProtocolError = 0xFF,
}

impl ErrorType {
    /// Returns the code used on the wire.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a wire code. Unknown codes decode as
    /// [`ErrorType::UnexpectedError`].
    ///
    /// ```rust
    /// use tchannel::ErrorType;
    ///
    /// assert_eq!(ErrorType::from_code(0x06), ErrorType::BadRequest);
    /// assert_eq!(ErrorType::from_code(0x42), ErrorType::UnexpectedError);
    /// ```
    #[must_use]
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x01 => Self::Timeout,
            0x02 => Self::Cancelled,
            0x03 => Self::Busy,
            0x04 => Self::Declined,
            0x06 => Self::BadRequest,
            0x07 => Self::NetworkError,
            0x08 => Self::Unhealthy,
            0xFF => Self::ProtocolError,
            _ => Self::UnexpectedError,
        }
    }

    /// Returns the canonical name of this error type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::Busy => "Busy",
            Self::Declined => "Declined",
            Self::UnexpectedError => "UnexpectedError",
            Self::BadRequest => "BadRequest",
            Self::NetworkError => "NetworkError",
            Self::Unhealthy => "Unhealthy",
            Self::ProtocolError => "ProtocolError",
        }
    }

    /// Returns `true` if a caller-side retry layer may safely retry a call
    /// that failed with this type.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Busy | Self::Declined | Self::NetworkError | Self::Unhealthy | Self::Timeout
        )
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A call that resolved without a response.
///
/// `CallError` is what a [`ResponseFuture`](crate::ResponseFuture) yields on
/// failure. Handlers may also return it (boxed) to answer with a specific
/// [`ErrorType`] instead of the default [`ErrorType::UnexpectedError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error_type}: {message}")]
pub struct CallError {
    error_type: ErrorType,
    message: String,
}

impl CallError {
    /// Creates a call error of the given type.
    #[must_use]
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
        }
    }

    /// Creates a [`ErrorType::Timeout`] error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Timeout, message)
    }

    /// Creates a [`ErrorType::Cancelled`] error.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Cancelled, message)
    }

    /// Creates a [`ErrorType::Busy`] error.
    #[must_use]
    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Busy, message)
    }

    /// Creates a [`ErrorType::Declined`] error.
    #[must_use]
    pub fn declined(message: impl Into<String>) -> Self {
        Self::new(ErrorType::Declined, message)
    }

    /// Creates a [`ErrorType::UnexpectedError`] error.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorType::UnexpectedError, message)
    }

    /// Creates a [`ErrorType::BadRequest`] error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorType::BadRequest, message)
    }

    /// Creates a [`ErrorType::NetworkError`] error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorType::NetworkError, message)
    }

    /// Creates a [`ErrorType::ProtocolError`] error.
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorType::ProtocolError, message)
    }

    /// Returns the error type.
    #[must_use]
    pub const fn error_type(&self) -> ErrorType {
        self.error_type
    }

    /// Returns the human readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// See [`ErrorType::is_retryable`].
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.error_type.is_retryable()
    }
}

/// Errors returned by the channel API.
#[derive(Debug, Error)]
pub enum TChannelError {
    /// A socket operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed data was read from a peer.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// The init exchange on a new connection failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// A call failed.
    #[error(transparent)]
    Call(#[from] CallError),

    /// The channel configuration is invalid.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong with the configuration
        reason: String,
    },

    /// The channel was shut down.
    #[error("channel has been shut down")]
    ShutDown,
}

impl TChannelError {
    /// Creates a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Result alias for channel API operations.
pub type Result<T> = std::result::Result<T, TChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_codes_round_trip() {
        for error_type in [
            ErrorType::Timeout,
            ErrorType::Cancelled,
            ErrorType::Busy,
            ErrorType::Declined,
            ErrorType::UnexpectedError,
            ErrorType::BadRequest,
            ErrorType::NetworkError,
            ErrorType::Unhealthy,
            ErrorType::ProtocolError,
        ] {
            assert_eq!(ErrorType::from_code(error_type.code()), error_type);
        }
    }

    #[test]
    fn test_unknown_code_is_unexpected() {
        assert_eq!(ErrorType::from_code(0x00), ErrorType::UnexpectedError);
        assert_eq!(ErrorType::from_code(0x7A), ErrorType::UnexpectedError);
    }

    #[test]
    fn test_retryable_types() {
        assert!(CallError::busy("busy").is_retryable());
        assert!(CallError::timeout("late").is_retryable());
        assert!(CallError::network("gone").is_retryable());
        assert!(!CallError::bad_request("nope").is_retryable());
        assert!(!CallError::unexpected("boom").is_retryable());
        assert!(!CallError::protocol("garbage").is_retryable());
        assert!(!CallError::cancelled("withdrawn").is_retryable());
    }

    #[test]
    fn test_call_error_display() {
        let error = CallError::network(CONNECT_FAILED_MESSAGE);
        assert_eq!(error.to_string(), "NetworkError: Failed to connect to the host");
    }

    #[test]
    fn test_tchannel_error_from_call_error() {
        let error: TChannelError = CallError::timeout("late").into();
        assert!(matches!(error, TChannelError::Call(_)));
        assert_eq!(error.to_string(), "Timeout: late");
    }

    #[test]
    fn test_config_error() {
        let error = TChannelError::config("default_timeout must be greater than 0");
        assert_eq!(
            error.to_string(),
            "invalid configuration: default_timeout must be greater than 0"
        );
    }
}

// Made with Bob
