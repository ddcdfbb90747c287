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

//! Channel configuration.

use crate::error::TChannelError;
use crate::frame::MAX_FRAME_PAYLOAD;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Smallest frame payload that still fits call metadata and a chunk header.
pub const MIN_FRAME_PAYLOAD: usize = 64;

/// Configuration for a channel and every connection it owns.
///
/// # Examples
///
/// ```rust
/// use tchannel::ChannelConfig;
/// use std::time::Duration;
///
/// // Use default configuration
/// let config = ChannelConfig::default();
/// assert_eq!(config.default_timeout, Duration::from_secs(1));
///
/// // Customize configuration
/// let config = ChannelConfig {
///     connect_timeout: Duration::from_millis(500),
///     max_pending_calls: 128,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Timeout applied to requests that do not carry their own.
    ///
    /// Default: 1 second
    pub default_timeout: Duration,

    /// Upper bound on establishing the transport link to a peer.
    ///
    /// Default: 2 seconds
    pub connect_timeout: Duration,

    /// Upper bound on the init exchange of a new connection.
    ///
    /// Default: 5 seconds
    pub handshake_timeout: Duration,

    /// How long shutdown waits for connections to close in an orderly way.
    ///
    /// Default: 1 second
    pub shutdown_grace: Duration,

    /// Outbound calls that may be pending on one connection at a time.
    /// Further calls fail with `Busy`.
    ///
    /// Default: 8192
    pub max_pending_calls: usize,

    /// Largest reassembled call, in argument bytes.
    ///
    /// Default: 16 MB
    pub max_message_size: usize,

    /// Largest frame payload this side writes. Larger arguments are split
    /// across continuation frames.
    ///
    /// Default: 65 519 bytes, the wire maximum
    pub max_frame_payload: usize,

    /// Frame batches that may queue for a connection's writer.
    ///
    /// Default: 256
    pub write_queue_depth: usize,

    /// Process name advertised during the init exchange.
    ///
    /// Default: None (`"<service>[<pid>]"`)
    pub process_name: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(2),
            handshake_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(1),
            max_pending_calls: 8192,
            max_message_size: 16 * 1024 * 1024, // 16 MB
            max_frame_payload: MAX_FRAME_PAYLOAD,
            write_queue_depth: 256,
            process_name: None,
        }
    }
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("default_timeout", &self.default_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("max_pending_calls", &self.max_pending_calls)
            .field("max_message_size", &self.max_message_size)
            .field("max_frame_payload", &self.max_frame_payload)
            .field("write_queue_depth", &self.write_queue_depth)
            .field("process_name", &self.process_name.as_deref().unwrap_or("<default>"))
            .finish()
    }
}

impl ChannelConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default values overridden by `TCHANNEL_*` environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `TCHANNEL_DEFAULT_TIMEOUT_MS` | `default_timeout` |
    /// | `TCHANNEL_CONNECT_TIMEOUT_MS` | `connect_timeout` |
    /// | `TCHANNEL_HANDSHAKE_TIMEOUT_MS` | `handshake_timeout` |
    /// | `TCHANNEL_SHUTDOWN_GRACE_MS` | `shutdown_grace` |
    /// | `TCHANNEL_MAX_PENDING` | `max_pending_calls` |
    /// | `TCHANNEL_MAX_MESSAGE_SIZE` | `max_message_size` |
    ///
    /// # Errors
    ///
    /// Returns [`TChannelError::Config`] if a variable is set but does not
    /// parse, or if the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, TChannelError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, TChannelError> {
        let mut config = Self::default();
        let millis = |key: &str| -> Result<Option<Duration>, TChannelError> {
            Ok(parse_var::<u64>(&lookup, key)?.map(Duration::from_millis))
        };

        if let Some(value) = millis("TCHANNEL_DEFAULT_TIMEOUT_MS")? {
            config.default_timeout = value;
        }
        if let Some(value) = millis("TCHANNEL_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = value;
        }
        if let Some(value) = millis("TCHANNEL_HANDSHAKE_TIMEOUT_MS")? {
            config.handshake_timeout = value;
        }
        if let Some(value) = millis("TCHANNEL_SHUTDOWN_GRACE_MS")? {
            config.shutdown_grace = value;
        }
        if let Some(value) = parse_var(&lookup, "TCHANNEL_MAX_PENDING")? {
            config.max_pending_calls = value;
        }
        if let Some(value) = parse_var(&lookup, "TCHANNEL_MAX_MESSAGE_SIZE")? {
            config.max_message_size = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the default request timeout.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the handshake timeout.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tchannel::ChannelConfig;
    /// use std::time::Duration;
    ///
    /// let config = ChannelConfig::new()
    ///     .with_handshake_timeout(Duration::from_secs(10));
    /// assert_eq!(config.handshake_timeout, Duration::from_secs(10));
    /// ```
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Sets the per-connection pending call limit.
    #[must_use]
    pub fn with_max_pending_calls(mut self, limit: usize) -> Self {
        self.max_pending_calls = limit;
        self
    }

    /// Sets the maximum reassembled call size.
    #[must_use]
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets the largest frame payload written.
    #[must_use]
    pub fn with_max_frame_payload(mut self, size: usize) -> Self {
        self.max_frame_payload = size;
        self
    }

    /// Sets the writer queue depth.
    #[must_use]
    pub fn with_write_queue_depth(mut self, depth: usize) -> Self {
        self.write_queue_depth = depth;
        self
    }

    /// Sets the advertised process name.
    #[must_use]
    pub fn with_process_name(mut self, name: impl Into<String>) -> Self {
        self.process_name = Some(name.into());
        self
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`TChannelError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), TChannelError> {
        let durations = [
            ("default_timeout", self.default_timeout),
            ("connect_timeout", self.connect_timeout),
            ("handshake_timeout", self.handshake_timeout),
        ];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(TChannelError::config(format!("{name} must be non-zero")));
            }
        }
        if self.max_pending_calls == 0 {
            return Err(TChannelError::config("max_pending_calls must be non-zero"));
        }
        if self.max_message_size == 0 {
            return Err(TChannelError::config("max_message_size must be non-zero"));
        }
        if !(MIN_FRAME_PAYLOAD..=MAX_FRAME_PAYLOAD).contains(&self.max_frame_payload) {
            return Err(TChannelError::config(format!(
                "max_frame_payload must be between {MIN_FRAME_PAYLOAD} and {MAX_FRAME_PAYLOAD}, got {}",
                self.max_frame_payload
            )));
        }
        if self.write_queue_depth == 0 {
            return Err(TChannelError::config("write_queue_depth must be non-zero"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, TChannelError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TChannelError::config(format!("{key}={raw:?} is not a valid number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ChannelConfig::default();
        assert_eq!(config.default_timeout, Duration::from_secs(1));
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.max_pending_calls, 8192);
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
        assert_eq!(config.max_frame_payload, MAX_FRAME_PAYLOAD);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ChannelConfig::new()
            .with_default_timeout(Duration::from_millis(250))
            .with_max_pending_calls(4)
            .with_max_frame_payload(1024)
            .with_process_name("worker");

        assert_eq!(config.default_timeout, Duration::from_millis(250));
        assert_eq!(config.max_pending_calls, 4);
        assert_eq!(config.max_frame_payload, 1024);
        assert_eq!(config.process_name.as_deref(), Some("worker"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ChannelConfig::new().with_connect_timeout(Duration::ZERO);
        let error = config.validate().unwrap_err();
        assert!(error.to_string().contains("connect_timeout"));
    }

    #[test]
    fn test_validate_rejects_frame_payload_out_of_range() {
        assert!(ChannelConfig::new().with_max_frame_payload(8).validate().is_err());
        assert!(ChannelConfig::new()
            .with_max_frame_payload(MAX_FRAME_PAYLOAD + 1)
            .validate()
            .is_err());
        assert!(ChannelConfig::new()
            .with_max_frame_payload(MIN_FRAME_PAYLOAD)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = ChannelConfig::from_lookup(lookup(&[
            ("TCHANNEL_DEFAULT_TIMEOUT_MS", "1500"),
            ("TCHANNEL_MAX_PENDING", " 32 "),
        ]))
        .unwrap();

        assert_eq!(config.default_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_pending_calls, 32);
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_env_rejects_garbage() {
        let error = ChannelConfig::from_lookup(lookup(&[("TCHANNEL_CONNECT_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(error.to_string().contains("TCHANNEL_CONNECT_TIMEOUT_MS"));
    }

    #[test]
    fn test_env_result_is_validated() {
        let result = ChannelConfig::from_lookup(lookup(&[("TCHANNEL_MAX_PENDING", "0")]));
        assert!(result.is_err());
    }
}
