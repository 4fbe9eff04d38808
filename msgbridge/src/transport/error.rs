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

//! Transport layer error types.
//!
//! Transport errors are the lowest layer of the error hierarchy. They
//! describe why a serialized frame could not be handed to another context.
//! Delivery itself is best-effort: a successful `post` confirms only that the
//! frame left this context, never that the peer processed it.

use crate::envelope::TargetId;
use thiserror::Error;

/// Errors that can occur while handing a frame to another context.
///
/// # Examples
///
/// ```rust
/// use msgbridge::transport::TransportError;
/// use msgbridge::envelope::TargetId;
///
/// let error = TransportError::Unreachable {
///     target: TargetId::from("frame-a"),
/// };
/// assert!(error.is_recoverable());
/// assert_eq!(error.target().map(TargetId::as_str), Some("frame-a"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The target cannot be resolved right now.
    ///
    /// The target may not exist yet; handshakes keep retrying on this error.
    #[error("target '{target}' is not reachable")]
    Unreachable {
        /// The target that could not be resolved.
        target: TargetId,
    },

    /// The target existed but has been torn down.
    #[error("target '{target}' has been closed")]
    Closed {
        /// The closed target.
        target: TargetId,
    },

    /// The underlying primitive rejected the frame.
    #[error("delivery to '{target}' failed: {reason}")]
    DeliveryFailed {
        /// The target the frame was addressed to.
        target: TargetId,
        /// Description of the failure.
        reason: String,
    },

    /// This context has no parent to answer.
    #[error("no parent context is attached")]
    NoParent,
}

impl TransportError {
    /// Returns `true` if retrying later might succeed.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Returns the target this error refers to, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&TargetId> {
        match self {
            Self::Unreachable { target }
            | Self::Closed { target }
            | Self::DeliveryFailed { target, .. } => Some(target),
            Self::NoParent => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(
            TransportError::Unreachable {
                target: TargetId::from("a")
            }
            .is_recoverable()
        );
        assert!(
            !TransportError::Closed {
                target: TargetId::from("a")
            }
            .is_recoverable()
        );
        assert!(!TransportError::NoParent.is_recoverable());
    }

    #[test]
    fn test_display() {
        let error = TransportError::DeliveryFailed {
            target: TargetId::from("popup"),
            reason: "window gone".to_string(),
        };
        assert_eq!(error.to_string(), "delivery to 'popup' failed: window gone");
        assert_eq!(
            TransportError::NoParent.to_string(),
            "no parent context is attached"
        );
    }

    #[test]
    fn test_target() {
        let error = TransportError::Closed {
            target: TargetId::from("frame-b"),
        };
        assert_eq!(error.target(), Some(&TargetId::from("frame-b")));
        assert_eq!(TransportError::NoParent.target(), None);
    }
}
