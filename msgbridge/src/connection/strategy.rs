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

//! Handshake probe retry cadence.
//!
//! A connection attempt sends a probe, waits for an acknowledgement for the
//! delay returned by the strategy, and probes again if none arrived. The
//! overall deadline is enforced by the registry, not by the strategy.
//!
//! # Available Strategies
//!
//! - [`FixedInterval`]: constant delay between probes (default, 200 ms)
//! - [`ExponentialBackoff`]: delay grows geometrically up to a cap

use std::time::Duration;

/// Determines how long to wait for an acknowledgement before re-probing.
pub trait ProbeStrategy: Send + Sync {
    /// Delay after probe number `attempt` (0-indexed) before the next one.
    fn next_delay(&self, attempt: u32) -> Duration;

    /// Human-readable name, used in logs and `Debug` output.
    fn name(&self) -> &str;
}

/// Constant delay between probes.
///
/// # Examples
///
/// ```
/// use msgbridge::connection::{FixedInterval, ProbeStrategy};
/// use std::time::Duration;
///
/// let strategy = FixedInterval::default();
/// assert_eq!(strategy.next_delay(0), Duration::from_millis(200));
/// assert_eq!(strategy.next_delay(9), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    /// Creates a fixed-interval strategy.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// The configured interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for FixedInterval {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

impl ProbeStrategy for FixedInterval {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.interval
    }

    fn name(&self) -> &str {
        "FixedInterval"
    }
}

/// Geometrically growing delay between probes.
///
/// # Examples
///
/// ```
/// use msgbridge::connection::{ExponentialBackoff, ProbeStrategy};
/// use std::time::Duration;
///
/// let strategy = ExponentialBackoff::builder()
///     .initial_delay(Duration::from_millis(50))
///     .multiplier(2.0)
///     .max_delay(Duration::from_millis(300))
///     .build();
///
/// assert_eq!(strategy.next_delay(0), Duration::from_millis(50));
/// assert_eq!(strategy.next_delay(2), Duration::from_millis(200));
/// assert_eq!(strategy.next_delay(5), Duration::from_millis(300));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    /// Delay after the first probe
    initial_delay: Duration,
    /// Upper bound for any delay
    max_delay: Duration,
    /// Growth factor per attempt
    multiplier: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl ExponentialBackoff {
    /// Create a new builder for configuring exponential backoff.
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }
}

impl ProbeStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(max_ms) as u64)
    }

    fn name(&self) -> &str {
        "ExponentialBackoff"
    }
}

/// Builder for [`ExponentialBackoff`].
#[derive(Debug)]
pub struct ExponentialBackoffBuilder {
    inner: ExponentialBackoff,
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self {
            inner: ExponentialBackoff::default(),
        }
    }
}

impl ExponentialBackoffBuilder {
    /// Set the delay after the first probe.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.inner.initial_delay = delay;
        self
    }

    /// Set the maximum delay between probes.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.inner.max_delay = delay;
        self
    }

    /// Set the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.inner.multiplier = multiplier;
        self
    }

    /// Build the strategy.
    pub fn build(self) -> ExponentialBackoff {
        self.inner
    }
}
