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

//! Top-level error type for bridge operations.
//!
//! Every asynchronous bridge operation either resolves with a payload or
//! fails with a [`BridgeError`]. Errors are layered:
//!
//! 1. **Transport**: a frame could not be handed to another context
//!    ([`TransportError`])
//! 2. **Frame**: an envelope could not be encoded ([`FrameError`]). Inbound
//!    decode failures are recovered locally and never reach a caller.
//! 3. **Bridge**: handshake and call deadlines, invalid targets, teardown.
//!
//! None of these are fatal to the bridge: the correlation table and
//! connection registry keep serving unrelated calls after any failure.
//!
//! # Propagation
//!
//! - `ConnectionTimeout` and `InvalidTarget` fail the connection attempt and,
//!   transitively, every call waiting on it.
//! - `CallTimeout` fails only that call and removes its continuation.
//! - `BroadcastTimeout` fails the aggregate but carries the per-target
//!   results that did arrive.

use crate::envelope::{CorrelationId, FrameError, Payload, TargetId};
use crate::transport::TransportError;
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Errors returned by bridge operations.
///
/// # Examples
///
/// ```rust
/// use msgbridge::BridgeError;
/// use msgbridge::envelope::TargetId;
/// use std::time::Duration;
///
/// let error = BridgeError::ConnectionTimeout {
///     target: TargetId::from("frame-a"),
///     timeout: Duration::from_secs(10),
///     attempts: 50,
/// };
/// assert!(error.is_timeout());
/// assert!(error.is_recoverable());
/// assert_eq!(error.target(), Some(&TargetId::from("frame-a")));
/// ```
#[derive(Debug)]
pub enum BridgeError {
    /// The handshake with a target was never acknowledged in time.
    ConnectionTimeout {
        /// The target that did not answer.
        target: TargetId,
        /// The overall handshake deadline.
        timeout: Duration,
        /// Number of probes sent.
        attempts: u32,
    },

    /// A request was delivered but no answer arrived in time.
    CallTimeout {
        /// The request's action.
        action: String,
        /// The request's correlation id.
        id: CorrelationId,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// Not every target answered a broadcast in time.
    BroadcastTimeout {
        /// The broadcast action.
        action: String,
        /// The deadline that elapsed.
        timeout: Duration,
        /// Results collected before the deadline, keyed by target.
        partial: HashMap<TargetId, Payload>,
        /// Targets that had not answered.
        missing: Vec<TargetId>,
    },

    /// The target cannot be resolved or reached.
    InvalidTarget {
        /// The target in question.
        target: TargetId,
        /// Why the target is invalid.
        reason: String,
    },

    /// A transport failure that names no target, such as a missing parent.
    Transport(TransportError),

    /// An outbound envelope could not be encoded.
    Encode(FrameError),

    /// The bridge was shut down while the operation was pending.
    Shutdown,
}

impl BridgeError {
    /// Returns `true` for any deadline-related error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::CallTimeout { .. } | Self::BroadcastTimeout { .. }
        )
    }

    /// Returns `true` if the same operation might succeed if retried.
    ///
    /// Timeouts are retryable: failed connection attempts are never cached.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectionTimeout { .. }
            | Self::CallTimeout { .. }
            | Self::BroadcastTimeout { .. } => true,
            Self::Transport(e) => e.is_recoverable(),
            Self::InvalidTarget { .. } | Self::Encode(_) | Self::Shutdown => false,
        }
    }

    /// Returns the target this error refers to, if any.
    #[must_use]
    pub fn target(&self) -> Option<&TargetId> {
        match self {
            Self::ConnectionTimeout { target, .. } | Self::InvalidTarget { target, .. } => {
                Some(target)
            }
            Self::Transport(e) => e.target(),
            _ => None,
        }
    }

    /// Returns the partial results carried by a broadcast timeout.
    #[must_use]
    pub const fn partial_results(&self) -> Option<&HashMap<TargetId, Payload>> {
        match self {
            Self::BroadcastTimeout { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionTimeout {
                target,
                timeout,
                attempts,
            } => write!(
                f,
                "handshake with '{}' timed out after {:?} ({} probes)",
                target, timeout, attempts
            ),
            Self::CallTimeout {
                action,
                id,
                timeout,
            } => write!(
                f,
                "request '{}' ({}) timed out after {:?}",
                action, id, timeout
            ),
            Self::BroadcastTimeout {
                action,
                timeout,
                partial,
                missing,
            } => write!(
                f,
                "broadcast '{}' timed out after {:?} ({} answered, {} missing)",
                action,
                timeout,
                partial.len(),
                missing.len()
            ),
            Self::InvalidTarget { target, reason } => {
                write!(f, "invalid target '{}': {}", target, reason)
            }
            Self::Transport(e) => write!(f, "transport error: {}", e),
            Self::Encode(e) => write!(f, "encode error: {}", e),
            Self::Shutdown => write!(f, "bridge has been shut down"),
        }
    }
}

impl StdError for BridgeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Encode(e) => Some(e),
            _ => None,
        }
    }
}

/// Any failure to reach a named target becomes [`BridgeError::InvalidTarget`].
impl From<TransportError> for BridgeError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Unreachable { target } => Self::InvalidTarget {
                target,
                reason: "target cannot be resolved".to_string(),
            },
            TransportError::Closed { target } => Self::InvalidTarget {
                target,
                reason: "target has been closed".to_string(),
            },
            TransportError::DeliveryFailed { target, reason } => Self::InvalidTarget {
                target,
                reason: format!("delivery failed: {reason}"),
            },
            TransportError::NoParent => Self::Transport(TransportError::NoParent),
        }
    }
}

impl From<FrameError> for BridgeError {
    fn from(error: FrameError) -> Self {
        Self::Encode(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_timeout() {
        let call = BridgeError::CallTimeout {
            action: "ping".to_string(),
            id: CorrelationId::from("1"),
            timeout: Duration::from_millis(5),
        };
        assert!(call.is_timeout());
        assert!(!BridgeError::Shutdown.is_timeout());
    }

    #[test]
    fn test_is_recoverable() {
        let unreachable = BridgeError::Transport(TransportError::Unreachable {
            target: TargetId::from("a"),
        });
        assert!(unreachable.is_recoverable());

        let invalid = BridgeError::InvalidTarget {
            target: TargetId::from("a"),
            reason: "gone".to_string(),
        };
        assert!(!invalid.is_recoverable());
        assert!(!BridgeError::Shutdown.is_recoverable());
    }

    #[test]
    fn test_partial_results() {
        let mut partial = HashMap::new();
        partial.insert(TargetId::from("A"), json!({"pong": true}));
        let error = BridgeError::BroadcastTimeout {
            action: "ping".to_string(),
            timeout: Duration::from_millis(50),
            partial,
            missing: vec![TargetId::from("B")],
        };

        let partial = error.partial_results().unwrap();
        assert_eq!(partial.get(&TargetId::from("A")), Some(&json!({"pong": true})));
        assert!(error.to_string().contains("1 answered, 1 missing"));
        assert!(BridgeError::Shutdown.partial_results().is_none());
    }

    #[test]
    fn test_closed_transport_becomes_invalid_target() {
        let error: BridgeError = TransportError::Closed {
            target: TargetId::from("popup"),
        }
        .into();
        assert!(matches!(error, BridgeError::InvalidTarget { .. }));
        assert_eq!(error.target(), Some(&TargetId::from("popup")));
    }

    #[test]
    fn test_unreachable_transport_becomes_invalid_target() {
        let error: BridgeError = TransportError::Unreachable {
            target: TargetId::from("host"),
        }
        .into();
        assert!(matches!(error, BridgeError::InvalidTarget { .. }));
        assert_eq!(error.target(), Some(&TargetId::from("host")));

        let error: BridgeError = TransportError::DeliveryFailed {
            target: TargetId::from("frame-a"),
            reason: "queue full".to_string(),
        }
        .into();
        match error {
            BridgeError::InvalidTarget { target, reason } => {
                assert_eq!(target.as_str(), "frame-a");
                assert!(reason.contains("queue full"));
            }
            other => panic!("expected invalid target, got {other:?}"),
        }

        let error: BridgeError = TransportError::NoParent.into();
        assert!(matches!(error, BridgeError::Transport(TransportError::NoParent)));
    }

    #[test]
    fn test_error_source() {
        let error = BridgeError::Transport(TransportError::NoParent);
        assert!(error.source().is_some());
        assert!(BridgeError::Shutdown.source().is_none());

        let error: BridgeError = FrameError::new("bad").into();
        assert!(error.source().is_some());
        assert!(error.to_string().starts_with("encode error"));
    }
}
