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

//! Builder for channels.

use super::{Channel, ChannelConfig};
use crate::error::Result;

/// Host a channel listens on unless told otherwise.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Assembles a [`Channel`] from a service name, a listening address and a
/// [`ChannelConfig`].
///
/// # Examples
///
/// ```rust
/// use tchannel::{ChannelBuilder, ChannelConfig};
/// use std::time::Duration;
///
/// # fn example() -> tchannel::Result<()> {
/// let channel = ChannelBuilder::new("server")
///     .host("127.0.0.1")
///     .port(0)
///     .config(ChannelConfig::new().with_default_timeout(Duration::from_millis(250)))
///     .build()?;
/// assert_eq!(channel.service(), "server");
/// # Ok(())
/// # }
/// ```
///
/// Invalid configuration is rejected when building:
///
/// ```rust
/// use tchannel::{ChannelBuilder, ChannelConfig};
/// use std::time::Duration;
///
/// let result = ChannelBuilder::new("server")
///     .config(ChannelConfig::new().with_default_timeout(Duration::ZERO))
///     .build();
/// assert!(result.is_err());
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct ChannelBuilder {
    service: String,
    host: String,
    port: u16,
    config: ChannelConfig,
}

impl ChannelBuilder {
    /// Starts a builder for a channel serving `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            host: DEFAULT_HOST.to_string(),
            port: 0,
            config: ChannelConfig::default(),
        }
    }

    /// Host to listen on.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Port to listen on; 0 picks an ephemeral port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ChannelConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the channel. Nothing is bound until [`Channel::listen`].
    ///
    /// # Errors
    ///
    /// Returns [`TChannelError::Config`](crate::TChannelError::Config) if
    /// the service name is empty or the configuration is invalid.
    pub fn build(self) -> Result<Channel> {
        if self.service.is_empty() {
            return Err(crate::TChannelError::config("service name must not be empty"));
        }
        self.config.validate()?;
        Ok(Channel::from_parts(self.service, self.host, self.port, self.config))
    }
}
