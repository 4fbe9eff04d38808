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

//! In-memory transport implementation for testing.
//!
//! This module provides an in-process message network that uses Tokio
//! channels for delivery. It's primarily useful for testing and for wiring
//! several bridges together inside one process without a real message
//! primitive.

use crate::envelope::TargetId;
use crate::transport::{InboundFrame, InboundReceiver, InboundSender, Postbox, Transport, TransportError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// A named context attached to the network.
struct Node {
    tx: InboundSender,
    parent: Option<TargetId>,
    /// Frames to silently discard before delivering again.
    drop_next: usize,
    closed: bool,
}

/// In-process network connecting any number of named contexts.
///
/// Each context joins under a name and receives a [`MemoryTransport`] for
/// outbound frames plus an [`InboundReceiver`] for the frames addressed to
/// it. The network can simulate the situations a real channel produces:
///
/// - targets that join late (not resolvable yet),
/// - targets that are torn down ([`close`](Self::close), [`leave`](Self::leave)),
/// - silently dropped frames ([`drop_next`](Self::drop_next)).
///
/// # Examples
///
/// ```rust
/// use msgbridge::envelope::TargetId;
/// use msgbridge::transport::{MemoryNetwork, Transport};
///
/// # async fn example() {
/// let network = MemoryNetwork::new();
/// let (host, _host_rx) = network.join("host");
/// let (_child, mut child_rx) = network.join_child("frame-a", "host");
///
/// host.deliver(&TargetId::from("frame-a"), "hello".to_string()).unwrap();
///
/// let frame = child_rx.recv().await.unwrap();
/// assert_eq!(frame.data, "hello");
/// assert_eq!(frame.source.as_str(), "host");
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    nodes: Arc<Mutex<HashMap<TargetId, Node>>>,
}

impl MemoryNetwork {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a top-level context under `name`.
    ///
    /// Joining again under the same name replaces the previous context.
    pub fn join(&self, name: impl Into<TargetId>) -> (MemoryTransport, InboundReceiver) {
        self.attach(name.into(), None)
    }

    /// Attaches a context under `name` whose parent is `parent`.
    pub fn join_child(
        &self,
        name: impl Into<TargetId>,
        parent: impl Into<TargetId>,
    ) -> (MemoryTransport, InboundReceiver) {
        self.attach(name.into(), Some(parent.into()))
    }

    fn attach(&self, name: TargetId, parent: Option<TargetId>) -> (MemoryTransport, InboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(node = %name, parent = ?parent, "Context joined memory network");
        self.nodes.lock().insert(
            name.clone(),
            Node {
                tx,
                parent: parent.clone(),
                drop_next: 0,
                closed: false,
            },
        );
        let transport = MemoryTransport {
            network: self.clone(),
            local: name,
            parent,
        };
        (transport, rx)
    }

    /// Marks a context as torn down while keeping its name resolvable.
    ///
    /// Handles to it report [`Postbox::is_closed`] and reject frames.
    pub fn close(&self, name: &TargetId) {
        if let Some(node) = self.nodes.lock().get_mut(name) {
            node.closed = true;
        }
    }

    /// Removes a context entirely. Returns `true` if it was attached.
    pub fn leave(&self, name: &TargetId) -> bool {
        self.nodes.lock().remove(name).is_some()
    }

    /// Silently discards the next `count` frames addressed to `name`.
    pub fn drop_next(&self, name: &TargetId, count: usize) {
        if let Some(node) = self.nodes.lock().get_mut(name) {
            node.drop_next = count;
        }
    }

    /// Returns `true` if a context is attached under `name`.
    #[must_use]
    pub fn contains(&self, name: &TargetId) -> bool {
        self.nodes.lock().contains_key(name)
    }

    /// Returns the parent recorded for `name`, if any.
    #[must_use]
    pub fn parent_of(&self, name: &TargetId) -> Option<TargetId> {
        self.nodes.lock().get(name).and_then(|node| node.parent.clone())
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let nodes = self.nodes.lock();
        let mut names: Vec<&TargetId> = nodes.keys().collect();
        names.sort();
        f.debug_struct("MemoryNetwork").field("nodes", &names).finish()
    }
}

/// Outbound side of a context attached to a [`MemoryNetwork`].
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    local: TargetId,
    parent: Option<TargetId>,
}

impl MemoryTransport {
    /// Name this context joined the network under.
    #[must_use]
    pub const fn local(&self) -> &TargetId {
        &self.local
    }

    /// The network this transport belongs to.
    #[must_use]
    pub const fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl Transport for MemoryTransport {
    fn resolve(&self, target: &TargetId) -> Option<Arc<dyn Postbox>> {
        if !self.network.contains(target) {
            return None;
        }
        Some(Arc::new(MemoryPostbox {
            network: self.network.clone(),
            target: target.clone(),
            source: self.local.clone(),
        }))
    }

    fn parent(&self) -> Option<TargetId> {
        self.parent.clone()
    }
}

/// Handle to one context on a [`MemoryNetwork`].
struct MemoryPostbox {
    network: MemoryNetwork,
    target: TargetId,
    source: TargetId,
}

impl Postbox for MemoryPostbox {
    fn post(&self, frame: String) -> Result<(), TransportError> {
        let mut nodes = self.network.nodes.lock();
        let node = match nodes.get_mut(&self.target) {
            Some(node) if !node.closed => node,
            _ => {
                return Err(TransportError::Closed {
                    target: self.target.clone(),
                });
            }
        };

        if node.drop_next > 0 {
            node.drop_next -= 1;
            debug!(target = %self.target, "Dropping frame on memory network");
            return Ok(());
        }

        node.tx
            .send(InboundFrame {
                data: frame,
                source: self.source.clone(),
            })
            .map_err(|_| TransportError::Closed {
                target: self.target.clone(),
            })
    }

    fn is_closed(&self) -> bool {
        self.network
            .nodes
            .lock()
            .get(&self.target)
            .is_none_or(|node| node.closed || node.tx.is_closed())
    }
}
