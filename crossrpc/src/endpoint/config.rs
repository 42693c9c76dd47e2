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

//! Per-connection configuration.

use crate::codec::ValueFormat;
use std::time::Duration;
use thiserror::Error;

/// An invalid [`ConnectionConfig`] value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {field} {reason}")]
pub struct ConfigError {
    /// Offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: &'static str,
}

/// Limits and defaults applied to every connection an endpoint creates.
///
/// Both peers should agree on `format`; everything else is local.
///
/// # Examples
///
/// ```rust
/// use crossrpc::endpoint::ConnectionConfig;
/// use std::time::Duration;
///
/// let config = ConnectionConfig {
///     max_concurrent_requests: Some(64),
///     ..Default::default()
/// }
/// .with_call_timeout(Duration::from_secs(30));
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.default_controller, "Home");
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Largest accepted message payload, in bytes.
    ///
    /// Inbound messages declaring a larger payload are a protocol violation;
    /// outbound calls with a larger payload fail locally.
    ///
    /// Default: 16 MiB
    pub max_message_size: usize,

    /// Largest fragment handed to the transport, in bytes.
    ///
    /// The effective size is the smaller of this and the transport's own limit.
    ///
    /// Default: 64 KiB
    pub max_fragment_size: usize,

    /// Number of inbound requests handled concurrently.
    ///
    /// Once reached, the receive loop stops reading until a handler finishes.
    /// `None` removes the bound.
    ///
    /// Default: 1024
    pub max_concurrent_requests: Option<usize>,

    /// Number of outgoing calls that may await a response at once.
    ///
    /// `None` allows the full 16-bit correlation id space.
    ///
    /// Default: None
    pub max_pending_calls: Option<usize>,

    /// Deadline for each outgoing call. `None` waits until the connection dies.
    ///
    /// Default: None
    pub call_timeout: Option<Duration>,

    /// How long teardown waits for the transport's close handshake.
    ///
    /// Default: 5 seconds
    pub close_timeout: Duration,

    /// Controller used for actions without a `/`.
    ///
    /// Default: `"Home"`
    pub default_controller: String,

    /// Lifetime of tokens issued by `authorize`.
    ///
    /// Default: 30 days
    pub token_lifetime: Duration,

    /// Encoding of argument and result values.
    ///
    /// Default: [`ValueFormat::default()`]
    pub format: ValueFormat,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024 * 1024,
            max_fragment_size: 64 * 1024,
            max_concurrent_requests: Some(1024),
            max_pending_calls: None,
            call_timeout: None,
            close_timeout: Duration::from_secs(5),
            default_controller: "Home".to_string(),
            token_lifetime: Duration::from_secs(30 * 24 * 60 * 60),
            format: ValueFormat::default(),
        }
    }
}

impl ConnectionConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest accepted message payload.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets the largest fragment handed to the transport.
    pub fn with_max_fragment_size(mut self, size: usize) -> Self {
        self.max_fragment_size = size;
        self
    }

    /// Sets the inbound handler bound.
    pub fn with_max_concurrent_requests(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_requests = limit;
        self
    }

    /// Sets the outstanding call bound.
    pub fn with_max_pending_calls(mut self, limit: Option<usize>) -> Self {
        self.max_pending_calls = limit;
        self
    }

    /// Sets a deadline for every outgoing call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Sets the close handshake timeout.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Sets the controller used for actions without a `/`.
    pub fn with_default_controller(mut self, name: impl Into<String>) -> Self {
        self.default_controller = name.into();
        self
    }

    /// Sets the lifetime of issued tokens.
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime = lifetime;
        self
    }

    /// Sets the value format.
    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.format = format;
        self
    }

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns the first field that is zero or empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let zero = |field| ConfigError {
            field,
            reason: "must be greater than 0",
        };
        if self.max_message_size == 0 {
            return Err(zero("max_message_size"));
        }
        if self.max_fragment_size == 0 {
            return Err(zero("max_fragment_size"));
        }
        if self.max_concurrent_requests == Some(0) {
            return Err(zero("max_concurrent_requests"));
        }
        if self.max_pending_calls == Some(0) {
            return Err(zero("max_pending_calls"));
        }
        if self.call_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(zero("call_timeout"));
        }
        if self.token_lifetime.is_zero() {
            return Err(zero("token_lifetime"));
        }
        if self.default_controller.is_empty() {
            return Err(ConfigError {
                field: "default_controller",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}
