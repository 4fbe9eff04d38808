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

//! Direction-specific delivery and readiness.

use crate::bridge::BridgeCore;
use crate::connection::ProbeStyle;
use crate::envelope::TargetId;
use crate::error::BridgeError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// How an endpoint reaches its target.
///
/// An endpoint closes over exactly two capabilities: delivering a frame to
/// its target and waiting until that target is ready to receive calls.
/// Everything else an endpoint does is direction-independent.
#[async_trait]
pub trait Link: Send + Sync + fmt::Debug {
    /// The target this link delivers to.
    fn target(&self) -> &TargetId;

    /// Waits until the target can receive calls.
    ///
    /// # Errors
    ///
    /// Fails if the handshake times out or the target is invalid.
    async fn ensure_ready(&self) -> Result<(), BridgeError>;

    /// Hands one serialized frame to the target.
    ///
    /// # Errors
    ///
    /// Fails if the transport rejects the frame.
    fn deliver(&self, frame: String) -> Result<(), BridgeError>;
}

/// Link to an embedded child, gated by the named handshake.
pub struct ChildLink {
    target: TargetId,
    core: Arc<BridgeCore>,
}

impl ChildLink {
    pub(crate) fn new(core: Arc<BridgeCore>, target: TargetId) -> Self {
        Self { target, core }
    }
}

#[async_trait]
impl Link for ChildLink {
    fn target(&self) -> &TargetId {
        &self.target
    }

    async fn ensure_ready(&self) -> Result<(), BridgeError> {
        self.core
            .registry
            .ensure_connected(&self.target, ProbeStyle::Named, self.core.config.connect_timeout)
            .await
    }

    fn deliver(&self, frame: String) -> Result<(), BridgeError> {
        Ok(self.core.transport.deliver(&self.target, frame)?)
    }
}

impl fmt::Debug for ChildLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildLink").field("target", &self.target).finish()
    }
}

/// Link to the embedding parent.
///
/// The parent's dispatcher is assumed to be running before any child can
/// exist, so readiness is immediate.
pub struct ParentLink {
    parent: TargetId,
    core: Arc<BridgeCore>,
}

impl ParentLink {
    pub(crate) fn new(core: Arc<BridgeCore>, parent: TargetId) -> Self {
        Self { parent, core }
    }
}

#[async_trait]
impl Link for ParentLink {
    fn target(&self) -> &TargetId {
        &self.parent
    }

    async fn ensure_ready(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn deliver(&self, frame: String) -> Result<(), BridgeError> {
        Ok(self.core.transport.deliver(&self.parent, frame)?)
    }
}

impl fmt::Debug for ParentLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParentLink").field("parent", &self.parent).finish()
    }
}

/// Link to an independently opened peer context.
///
/// Peers announce their own name in the ack, which need not match the
/// name they were registered under, so the handshake matches on an
/// echoed nonce instead. A peer that has been closed fails readiness
/// immediately.
pub struct PeerLink {
    target: TargetId,
    core: Arc<BridgeCore>,
}

impl PeerLink {
    pub(crate) fn new(core: Arc<BridgeCore>, target: TargetId) -> Self {
        Self { target, core }
    }
}

#[async_trait]
impl Link for PeerLink {
    fn target(&self) -> &TargetId {
        &self.target
    }

    async fn ensure_ready(&self) -> Result<(), BridgeError> {
        self.core
            .registry
            .ensure_connected(&self.target, ProbeStyle::Nonce, self.core.config.connect_timeout)
            .await
    }

    fn deliver(&self, frame: String) -> Result<(), BridgeError> {
        Ok(self.core.transport.deliver(&self.target, frame)?)
    }
}

impl fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerLink").field("target", &self.target).finish()
    }
}
