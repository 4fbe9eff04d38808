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

//! The per-context bridge.
//!
//! A [`Bridge`] owns everything one context needs to talk to others: the
//! correlation table, the connection registry, the request hub, and the
//! single dispatcher task consuming the context's inbound frames.
//! Endpoints and broadcasts borrow that shared state.

use crate::broadcast::{self, BroadcastCall};
use crate::config::BridgeConfig;
use crate::connection::{ConnectionRegistry, ConnectionState, ProbeStyle};
use crate::dispatch::{
    CorrelationTable, DispatchStats, Dispatched, Dispatcher, RequestHub, RequestStream,
};
use crate::endpoint::{ChildLink, Endpoint, ParentLink, PeerLink};
use crate::envelope::{Envelope, JsonCodec, Payload, TargetId};
use crate::error::BridgeError;
use crate::transport::{InboundFrame, InboundReceiver, Transport, TransportError};
use futures_util::future::try_join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// State shared by a bridge, its endpoints, and its broadcasts.
pub(crate) struct BridgeCore {
    pub(crate) identity: String,
    pub(crate) config: BridgeConfig,
    pub(crate) codec: JsonCodec,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) table: Arc<CorrelationTable>,
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) hub: Arc<RequestHub>,
    closed: AtomicBool,
}

impl BridgeCore {
    /// Fails with [`BridgeError::Shutdown`] once the bridge is shut down.
    pub(crate) fn ensure_open(&self) -> Result<(), BridgeError> {
        if self.closed.load(Ordering::Acquire) {
            Err(BridgeError::Shutdown)
        } else {
            Ok(())
        }
    }

    pub(crate) fn encode(&self, envelope: &Envelope) -> Result<String, BridgeError> {
        let frame = self.codec.encode(envelope)?;
        debug!(bridge = %self.identity, kind = envelope.kind(), id = ?envelope.correlation_id(), "Outbound envelope");
        Ok(frame)
    }
}

/// One context's end of the message channel.
///
/// # Lifecycle
///
/// 1. [`Bridge::new`] wires the shared state around a transport.
/// 2. [`Bridge::start`] spawns the dispatcher over the context's inbound
///    frames. Until then nothing inbound is processed, including handshake
///    probes from other contexts.
/// 3. Calls are made through endpoints ([`to_child`](Self::to_child),
///    [`to_parent`](Self::to_parent), [`to_peer`](Self::to_peer)) and
///    broadcasts.
/// 4. [`Bridge::shutdown`] (or dropping the bridge) stops the dispatcher
///    and fails every pending call with [`BridgeError::Shutdown`].
///
/// # Example
///
/// ```rust
/// use msgbridge::{Bridge, BridgeConfig};
/// use msgbridge::transport::MemoryNetwork;
/// use serde_json::json;
///
/// # async fn example() -> Result<(), msgbridge::BridgeError> {
/// let network = MemoryNetwork::new();
/// let (host_transport, host_rx) = network.join("host");
/// let host = Bridge::new(BridgeConfig::new().with_identity("host"), host_transport);
/// host.start(host_rx);
///
/// let mut children = Vec::new();
/// for name in ["frame-a", "frame-b"] {
///     let (transport, rx) = network.join_child(name, "host");
///     let child = Bridge::new(BridgeConfig::new().with_identity(name), transport);
///     child.start(rx);
///     child.to_parent()?.react_to("ping", |_| async { json!({"pong": true}) });
///     children.push(child);
/// }
///
/// host.connect(["frame-a", "frame-b"]).await?;
/// let answers = host.broadcast_request("ping", json!({})).await?;
/// assert_eq!(answers.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Bridge {
    core: Arc<BridgeCore>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<DispatchStats>,
    task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl Bridge {
    /// Creates a bridge over `transport`. Call [`start`](Self::start) to
    /// begin processing inbound frames.
    pub fn new<T: Transport>(config: BridgeConfig, transport: T) -> Self {
        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a bridge over a shared transport.
    pub fn with_transport(config: BridgeConfig, transport: Arc<dyn Transport>) -> Self {
        let identity = config.identity.clone();
        let table = Arc::new(CorrelationTable::new());
        let hub = Arc::new(RequestHub::new());
        let stats = Arc::new(DispatchStats::new());
        let registry = Arc::new(ConnectionRegistry::new(
            identity.clone(),
            Arc::clone(&transport),
            Arc::clone(&config.probe_strategy),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            identity.clone(),
            Arc::clone(&transport),
            Arc::clone(&table),
            Arc::clone(&registry),
            Arc::clone(&hub),
            Arc::clone(&stats),
        ));
        let core = Arc::new(BridgeCore {
            identity,
            config,
            codec: JsonCodec::new(),
            transport,
            table,
            registry,
            hub,
            closed: AtomicBool::new(false),
        });
        Self {
            core,
            dispatcher,
            stats,
            task: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Spawns the dispatcher over `inbound`.
    ///
    /// A bridge has exactly one dispatcher. Returns `false`, dropping
    /// `inbound`, if it was already started or has been shut down.
    pub fn start(&self, inbound: InboundReceiver) -> bool {
        if self.core.ensure_open().is_err() || self.started.swap(true, Ordering::AcqRel) {
            debug!(bridge = %self.core.identity, "Bridge already started");
            return false;
        }
        let task = tokio::spawn(Arc::clone(&self.dispatcher).run(inbound));
        *self.task.lock() = Some(task);
        info!(bridge = %self.core.identity, "Bridge started");
        true
    }

    /// Returns `true` while the dispatcher task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Handles one inbound frame synchronously, bypassing the dispatcher task.
    ///
    /// For hosts that drive their own event loop instead of calling
    /// [`start`](Self::start).
    pub fn dispatch_frame(&self, frame: &InboundFrame) -> Dispatched {
        self.dispatcher.dispatch_frame(frame)
    }

    /// This bridge's identity.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.core.identity
    }

    /// This bridge's configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.core.config
    }

    /// Endpoint for an embedded child addressed by name.
    ///
    /// The first call through it waits for the child's handshake.
    pub fn to_child(&self, name: impl Into<TargetId>) -> Endpoint {
        let link = ChildLink::new(Arc::clone(&self.core), name.into());
        Endpoint::new(Arc::new(link), Arc::clone(&self.core))
    }

    /// Endpoint for the embedding parent.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::NoParent`] if this context has none.
    pub fn to_parent(&self) -> Result<Endpoint, BridgeError> {
        let parent = self
            .core
            .transport
            .parent()
            .ok_or(BridgeError::Transport(TransportError::NoParent))?;
        let link = ParentLink::new(Arc::clone(&self.core), parent);
        Ok(Endpoint::new(Arc::new(link), Arc::clone(&self.core)))
    }

    /// Endpoint for an independently opened peer context.
    pub fn to_peer(&self, name: impl Into<TargetId>) -> Endpoint {
        let link = PeerLink::new(Arc::clone(&self.core), name.into());
        Endpoint::new(Arc::new(link), Arc::clone(&self.core))
    }

    /// Connects to several named children concurrently.
    ///
    /// # Errors
    ///
    /// Fails with the first handshake error.
    pub async fn connect<I, T>(&self, targets: I) -> Result<(), BridgeError>
    where
        I: IntoIterator<Item = T>,
        T: Into<TargetId>,
    {
        self.core.ensure_open()?;
        let targets: Vec<TargetId> = targets.into_iter().map(Into::into).collect();
        let timeout = self.core.config.connect_timeout;
        try_join_all(targets.iter().map(|target| {
            self.core
                .registry
                .ensure_connected(target, ProbeStyle::Named, timeout)
        }))
        .await?;
        Ok(())
    }

    /// Sends `action` to every ready target and waits for one answer from each.
    ///
    /// Uses the configured request timeout.
    ///
    /// # Errors
    ///
    /// See [`broadcast_request_timeout`](Self::broadcast_request_timeout).
    pub async fn broadcast_request(
        &self,
        action: impl Into<String>,
        payload: Payload,
    ) -> Result<HashMap<TargetId, Payload>, BridgeError> {
        self.broadcast_request_timeout(action, payload, self.core.config.request_timeout)
            .await
    }

    /// Sends `action` to every ready target and waits at most `timeout`.
    ///
    /// With no ready targets the result is an empty map. [`Duration::MAX`]
    /// waits indefinitely.
    ///
    /// # Errors
    ///
    /// Fails with [`BridgeError::BroadcastTimeout`], carrying the answers
    /// that did arrive, if any target stays silent.
    pub async fn broadcast_request_timeout(
        &self,
        action: impl Into<String>,
        payload: Payload,
        timeout: Duration,
    ) -> Result<HashMap<TargetId, Payload>, BridgeError> {
        broadcast::broadcast_request(&self.core, action.into(), payload, timeout).await
    }

    /// Prepares a streaming broadcast. Nothing is sent until it is subscribed.
    pub fn broadcast_observable(&self, action: impl Into<String>, payload: Payload) -> BroadcastCall {
        BroadcastCall::new(Arc::clone(&self.core), action.into(), payload)
    }

    /// Forgets the connection record for `target`.
    ///
    /// The next call to it performs a new handshake. Returns `true` if a
    /// record existed.
    pub fn disconnect(&self, target: &TargetId) -> bool {
        self.core.registry.invalidate(target)
    }

    /// Every inbound request, unfiltered.
    pub fn on_requests(&self) -> RequestStream {
        self.core.hub.subscribe()
    }

    /// Number of calls waiting for answers.
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.core.table.len()
    }

    /// Connection state of `target`, if a record exists.
    #[must_use]
    pub fn connection_state(&self, target: &TargetId) -> Option<ConnectionState> {
        self.core.registry.state(target)
    }

    /// Every target that completed a handshake, sorted by name.
    #[must_use]
    pub fn ready_targets(&self) -> Vec<TargetId> {
        self.core.registry.ready_targets()
    }

    /// Dispatcher traffic counters.
    #[must_use]
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Stops the dispatcher and fails every pending operation.
    ///
    /// Pending calls and handshakes fail with [`BridgeError::Shutdown`],
    /// request streams end, and later calls fail immediately. Calling it
    /// again is a no-op.
    pub fn shutdown(&self) {
        if self.core.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.core.registry.shutdown();
        let dropped = self.core.table.clear();
        self.core.hub.close();
        info!(bridge = %self.core.identity, pending = dropped, "Bridge shut down");
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("identity", &self.core.identity)
            .field("config", &self.core.config)
            .field("pending_calls", &self.core.table.len())
            .field("registry", &self.core.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryNetwork;
    use serde_json::json;

    #[tokio::test]
    async fn test_endpoints_address_their_targets() {
        let network = MemoryNetwork::new();
        let (transport, _rx) = network.join_child("frame-a", "host");
        let bridge = Bridge::new(BridgeConfig::new().with_identity("frame-a"), transport);

        assert_eq!(bridge.to_child("inner").target().as_str(), "inner");
        assert_eq!(bridge.to_peer("popup").target().as_str(), "popup");
        assert_eq!(bridge.to_parent().unwrap().target().as_str(), "host");
        assert_eq!(bridge.identity(), "frame-a");
    }

    #[tokio::test]
    async fn test_manual_dispatch_without_start() {
        let network = MemoryNetwork::new();
        let (transport, _rx) = network.join("host");
        let (_peer, mut peer_rx) = network.join("frame-a");
        let bridge = Bridge::new(BridgeConfig::new().with_identity("host"), transport);
        assert!(!bridge.is_running());

        let probe = JsonCodec::new().encode(&Envelope::probe(None)).unwrap();
        let outcome = bridge.dispatch_frame(&InboundFrame::new(probe, "frame-a"));

        assert_eq!(outcome, Dispatched::Probe(true));
        let ack = peer_rx.recv().await.unwrap();
        assert_eq!(
            JsonCodec::new().decode(&ack.data).unwrap(),
            Envelope::ack("host", None)
        );
        assert_eq!(bridge.stats().probes_answered(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let network = MemoryNetwork::new();
        let (transport, rx) = network.join("host");
        let bridge = Bridge::new(BridgeConfig::new().with_identity("host"), transport);
        assert!(bridge.start(rx));

        bridge.shutdown();
        bridge.shutdown();

        assert!(bridge.core.ensure_open().is_err());
        assert!(matches!(
            bridge.broadcast_request("ping", json!({})).await,
            Err(BridgeError::Shutdown)
        ));
        assert!(matches!(
            bridge.broadcast_observable("ping", json!({})).subscribe(),
            Err(BridgeError::Shutdown)
        ));
    }
}
