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

//! Core transport abstractions.

use crate::envelope::TargetId;
use crate::transport::TransportError;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A serialized frame received from another context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    /// The raw serialized envelope.
    pub data: String,
    /// Identity of the context that sent the frame.
    pub source: TargetId,
}

impl InboundFrame {
    /// Creates an inbound frame.
    pub fn new(data: impl Into<String>, source: impl Into<TargetId>) -> Self {
        Self {
            data: data.into(),
            source: source.into(),
        }
    }
}

/// Sending half of a context's inbound event source.
pub type InboundSender = mpsc::UnboundedSender<InboundFrame>;

/// Receiving half of a context's inbound event source.
///
/// The bridge dispatcher is its sole consumer.
pub type InboundReceiver = mpsc::UnboundedReceiver<InboundFrame>;

/// Creates a new inbound event source.
#[must_use]
pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    mpsc::unbounded_channel()
}

/// A resolved handle to another context.
///
/// This is the "postMessage" capability: fire-and-forget delivery of one
/// serialized frame with no confirmation.
pub trait Postbox: Send + Sync {
    /// Posts a frame to the context behind this handle.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the primitive rejects the frame.
    fn post(&self, frame: String) -> Result<(), TransportError>;

    /// Returns `true` once the context behind this handle has been torn down.
    fn is_closed(&self) -> bool {
        false
    }
}

/// How this context reaches other contexts.
///
/// Implementations wrap the concrete message primitive. Handles are resolved
/// lazily: the bridge calls [`resolve`](Self::resolve) again on every
/// handshake retry and never caches the result, so a target that appears
/// after some delay is still found.
///
/// # Example
///
/// ```rust
/// use msgbridge::envelope::TargetId;
/// use msgbridge::transport::{Postbox, Transport, TransportError};
/// use std::sync::Arc;
///
/// struct Loopback;
///
/// impl Postbox for Loopback {
///     fn post(&self, frame: String) -> Result<(), TransportError> {
///         println!("posting {}", frame);
///         Ok(())
///     }
/// }
///
/// struct SingleTarget;
///
/// impl Transport for SingleTarget {
///     fn resolve(&self, target: &TargetId) -> Option<Arc<dyn Postbox>> {
///         (target.as_str() == "self").then(|| Arc::new(Loopback) as Arc<dyn Postbox>)
///     }
/// }
///
/// let transport = SingleTarget;
/// assert!(transport.deliver(&TargetId::from("self"), "{}".to_string()).is_ok());
/// assert!(transport.deliver(&TargetId::from("other"), "{}".to_string()).is_err());
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Resolves a target identity to a handle, if the target exists now.
    fn resolve(&self, target: &TargetId) -> Option<Arc<dyn Postbox>>;

    /// Identity of this context's parent, if it has one.
    fn parent(&self) -> Option<TargetId> {
        None
    }

    /// Resolves `target` and posts `frame` to it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unreachable`] if the target cannot be
    /// resolved, [`TransportError::Closed`] if its handle reports closed, or
    /// whatever the handle's `post` returns.
    fn deliver(&self, target: &TargetId, frame: String) -> Result<(), TransportError> {
        let postbox = self
            .resolve(target)
            .ok_or_else(|| TransportError::Unreachable {
                target: target.clone(),
            })?;
        if postbox.is_closed() {
            return Err(TransportError::Closed {
                target: target.clone(),
            });
        }
        postbox.post(frame)
    }
}
