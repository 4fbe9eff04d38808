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

//! Configuration types for bridges.

use crate::connection::{FixedInterval, ProbeStrategy};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a bridge.
///
/// # Examples
///
/// ```rust
/// use msgbridge::BridgeConfig;
/// use std::time::Duration;
///
/// // Use default configuration
/// let config = BridgeConfig::default();
/// assert_eq!(config.identity, "message-bridge");
///
/// // Customize configuration
/// let config = BridgeConfig {
///     identity: "frame-a".to_string(),
///     request_timeout: Duration::from_secs(2),
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct BridgeConfig {
    /// Name this context answers handshake probes with.
    ///
    /// A parent addressing this context as a named child expects the ack's
    /// `peerId` to equal the child's name, so children should be
    /// configured with the name their parent knows them by. Also used as
    /// the `bridge` field of every log line.
    ///
    /// Default: `"message-bridge"`
    pub identity: String,

    /// Default deadline for a single-answer call or a broadcast.
    ///
    /// The deadline starts once the request has been delivered.
    ///
    /// Default: 10 seconds
    pub request_timeout: Duration,

    /// Overall deadline for a handshake.
    ///
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Cadence of handshake probe retries.
    ///
    /// Default: [`FixedInterval`] of 200 ms
    pub probe_strategy: Arc<dyn ProbeStrategy>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            identity: "message-bridge".to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            probe_strategy: Arc::new(FixedInterval::default()),
        }
    }
}

impl std::fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("identity", &self.identity)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("probe_strategy", &self.probe_strategy.name())
            .finish()
    }
}

impl BridgeConfig {
    /// Creates a new configuration with default values.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use msgbridge::BridgeConfig;
    /// use std::time::Duration;
    ///
    /// let config = BridgeConfig::new();
    /// assert_eq!(config.connect_timeout, Duration::from_secs(10));
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the identity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use msgbridge::BridgeConfig;
    ///
    /// let config = BridgeConfig::new().with_identity("frame-a");
    /// assert_eq!(config.identity, "frame-a");
    /// ```
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Sets the default request timeout.
    ///
    /// [`Duration::MAX`] waits indefinitely.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the handshake deadline.
    ///
    /// [`Duration::MAX`] keeps probing until the target answers.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the probe strategy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use msgbridge::BridgeConfig;
    /// use msgbridge::connection::ExponentialBackoff;
    /// use std::sync::Arc;
    ///
    /// let config = BridgeConfig::new()
    ///     .with_probe_strategy(Arc::new(ExponentialBackoff::default()));
    /// assert_eq!(config.probe_strategy.name(), "ExponentialBackoff");
    /// ```
    #[must_use]
    pub fn with_probe_strategy(mut self, strategy: Arc<dyn ProbeStrategy>) -> Self {
        self.probe_strategy = strategy;
        self
    }
}
