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

//! Per-target readiness tracking.

use super::ProbeStrategy;
use crate::envelope::{Ack, Envelope, JsonCodec, TargetId};
use crate::error::BridgeError;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Readiness of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Probing is in progress.
    Pending {
        /// When the attempt started.
        started_at: Instant,
        /// Probes sent so far.
        attempts: u32,
    },
    /// The target acknowledged a probe.
    Ready,
    /// The attempt failed. Failed records are never kept in the registry.
    Failed(ConnectFailure),
}

/// Why a connection attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// No acknowledgement arrived before the deadline.
    Timeout {
        /// The overall deadline.
        timeout: Duration,
        /// Probes sent.
        attempts: u32,
    },
    /// The target was closed or the record was invalidated.
    InvalidTarget {
        /// Description of the failure.
        reason: String,
    },
}

impl ConnectFailure {
    fn into_error(self, target: &TargetId) -> BridgeError {
        match self {
            Self::Timeout { timeout, attempts } => BridgeError::ConnectionTimeout {
                target: target.clone(),
                timeout,
                attempts,
            },
            Self::InvalidTarget { reason } => BridgeError::InvalidTarget {
                target: target.clone(),
                reason,
            },
        }
    }
}

/// How probes address a target and how its acknowledgement is recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStyle {
    /// The ack must carry `peerId` equal to the target's name.
    Named,
    /// Each probe carries a random nonce that the ack must echo.
    ///
    /// Used for peers whose self-declared name is not known in advance.
    Nonce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expectation {
    PeerId,
    Nonce(String),
}

struct Record {
    state: watch::Sender<ConnectionState>,
    expect: Expectation,
    attempt: u64,
    probe_task: Option<AbortHandle>,
}

/// Fails its attempt if the probe loop ends while the record is still pending.
///
/// Covers a probe task that panics or is aborted without resolving.
struct ProbeGuard {
    registry: Arc<ConnectionRegistry>,
    target: TargetId,
    attempt: u64,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        let mut records = self.registry.records.lock();
        let orphaned = records.get(&self.target).is_some_and(|record| {
            record.attempt == self.attempt
                && matches!(*record.state.borrow(), ConnectionState::Pending { .. })
        });
        if !orphaned {
            return;
        }
        if let Some(record) = records.remove(&self.target) {
            warn!(bridge = %self.registry.identity, target = %self.target, "Handshake task ended without an outcome");
            record.state.send_replace(ConnectionState::Failed(ConnectFailure::InvalidTarget {
                reason: "handshake task ended".to_string(),
            }));
        }
    }
}

/// Process-wide map from target identity to a shared readiness future.
///
/// At most one connection attempt is in flight per target: concurrent
/// callers for a pending or ready target share the same outcome and never
/// start a second probe loop. Ready records persist until
/// [`invalidate`](Self::invalidate) is called; failed attempts are removed
/// so a later caller can retry.
pub struct ConnectionRegistry {
    identity: String,
    transport: Arc<dyn Transport>,
    strategy: Arc<dyn ProbeStrategy>,
    codec: JsonCodec,
    records: Mutex<HashMap<TargetId, Record>>,
    attempts: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates an empty registry probing through `transport`.
    pub fn new(
        identity: impl Into<String>,
        transport: Arc<dyn Transport>,
        strategy: Arc<dyn ProbeStrategy>,
    ) -> Self {
        Self {
            identity: identity.into(),
            transport,
            strategy,
            codec: JsonCodec::new(),
            records: Mutex::new(HashMap::new()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Waits until `target` is ready, starting a handshake if needed.
    ///
    /// A `timeout` too large to add to the current instant waits without a
    /// deadline.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ConnectionTimeout`] if no ack arrives within `timeout`
    /// - [`BridgeError::InvalidTarget`] if the target is closed or the
    ///   record is invalidated while pending
    /// - [`BridgeError::Shutdown`] if the registry is shut down meanwhile
    pub async fn ensure_connected(
        self: &Arc<Self>,
        target: &TargetId,
        style: ProbeStyle,
        timeout: Duration,
    ) -> Result<(), BridgeError> {
        let mut state = {
            let mut records = self.records.lock();
            match records.get(target) {
                Some(record) => {
                    if *record.state.borrow() == ConnectionState::Ready {
                        return Ok(());
                    }
                    record.state.subscribe()
                }
                None => {
                    let expect = match style {
                        ProbeStyle::Named => Expectation::PeerId,
                        ProbeStyle::Nonce => Expectation::Nonce(uuid::Uuid::new_v4().simple().to_string()),
                    };
                    let (tx, rx) = watch::channel(ConnectionState::Pending {
                        started_at: Instant::now(),
                        attempts: 0,
                    });
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
                    let task = tokio::spawn(Arc::clone(self).probe(
                        target.clone(),
                        expect.clone(),
                        timeout,
                        attempt,
                    ));
                    records.insert(
                        target.clone(),
                        Record {
                            state: tx,
                            expect,
                            attempt,
                            probe_task: Some(task.abort_handle()),
                        },
                    );
                    debug!(bridge = %self.identity, target = %target, "Starting handshake");
                    rx
                }
            }
        };

        loop {
            let current = state.borrow_and_update().clone();
            match current {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Failed(failure) => return Err(failure.into_error(target)),
                ConnectionState::Pending { .. } => {}
            }
            if state.changed().await.is_err() {
                let last = state.borrow().clone();
                return match last {
                    ConnectionState::Ready => Ok(()),
                    ConnectionState::Failed(failure) => Err(failure.into_error(target)),
                    ConnectionState::Pending { .. } => Err(BridgeError::Shutdown),
                };
            }
        }
    }

    /// Probe loop for one attempt. Runs until ready, failed, or aborted.
    async fn probe(
        self: Arc<Self>,
        target: TargetId,
        expect: Expectation,
        timeout: Duration,
        attempt: u64,
    ) {
        let _guard = ProbeGuard {
            registry: Arc::clone(&self),
            target: target.clone(),
            attempt,
        };
        let nonce = match &expect {
            Expectation::Nonce(nonce) => Some(nonce.clone()),
            Expectation::PeerId => None,
        };
        let frame = match self.codec.encode(&Envelope::probe(nonce)) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail(&target, ConnectFailure::InvalidTarget { reason: e.to_string() });
                return;
            }
        };

        let Some(mut state) = self.records.lock().get(&target).map(|r| r.state.subscribe()) else {
            return;
        };

        let deadline = Instant::now().checked_add(timeout);
        let mut attempts: u32 = 0;
        loop {
            if !matches!(*state.borrow_and_update(), ConnectionState::Pending { .. }) {
                return;
            }
            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                warn!(bridge = %self.identity, target = %target, attempts, "Handshake timed out");
                self.fail(&target, ConnectFailure::Timeout { timeout, attempts });
                return;
            }

            // The handle is resolved again on every retry: the target may appear late.
            match self.transport.resolve(&target) {
                Some(postbox) if postbox.is_closed() => {
                    warn!(bridge = %self.identity, target = %target, "Handshake target is closed");
                    self.fail(
                        &target,
                        ConnectFailure::InvalidTarget {
                            reason: "target has been closed".to_string(),
                        },
                    );
                    return;
                }
                Some(postbox) => {
                    attempts += 1;
                    debug!(bridge = %self.identity, target = %target, attempts, "Sending handshake probe");
                    if let Err(e) = postbox.post(frame.clone()) {
                        debug!(bridge = %self.identity, target = %target, error = %e, "Probe not delivered");
                    }
                    self.record_attempts(&target, attempts);
                }
                None => {
                    debug!(bridge = %self.identity, target = %target, "Handshake target not resolvable yet");
                }
            }

            let mut delay = self.strategy.next_delay(attempts.saturating_sub(1));
            if let Some(deadline) = deadline {
                delay = delay.min(deadline.saturating_duration_since(now));
            }
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = state.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Updates the attempt counter without waking waiters on our own receiver.
    fn record_attempts(&self, target: &TargetId, attempts: u32) {
        if let Some(record) = self.records.lock().get(target) {
            record.state.send_if_modified(|state| {
                if let ConnectionState::Pending { attempts: current, .. } = state {
                    *current = attempts;
                }
                false
            });
        }
    }

    fn fail(&self, target: &TargetId, failure: ConnectFailure) {
        if let Some(record) = self.records.lock().remove(target) {
            record.state.send_replace(ConnectionState::Failed(failure));
        }
    }

    /// Handles a handshake acknowledgement received from `source`.
    ///
    /// Returns the target marked ready, if the ack matched a pending attempt.
    pub fn acknowledge(&self, source: &TargetId, ack: &Ack) -> Option<TargetId> {
        let mut records = self.records.lock();
        let target = records
            .iter()
            .find(|(target, record)| {
                matches!(*record.state.borrow(), ConnectionState::Pending { .. })
                    && match &record.expect {
                        Expectation::PeerId => target.as_str() == ack.peer_id,
                        Expectation::Nonce(nonce) => ack.nonce.as_deref() == Some(nonce.as_str()),
                    }
            })
            .map(|(target, _)| target.clone());

        let Some(target) = target else {
            debug!(bridge = %self.identity, source = %source, peer = %ack.peer_id, "Ignoring unmatched handshake ack");
            return None;
        };

        let probe_task = records.get_mut(&target).and_then(|record| {
            record.state.send_replace(ConnectionState::Ready);
            record.probe_task.take()
        });
        drop(records);
        if let Some(task) = probe_task {
            task.abort();
        }
        info!(bridge = %self.identity, target = %target, peer = %ack.peer_id, "Target connected");
        Some(target)
    }

    /// Removes the record for `target`.
    ///
    /// A pending attempt is aborted and its waiters fail with
    /// [`BridgeError::InvalidTarget`]. Returns `true` if a record existed.
    pub fn invalidate(&self, target: &TargetId) -> bool {
        let Some(mut record) = self.records.lock().remove(target) else {
            return false;
        };
        if let Some(task) = record.probe_task.take() {
            task.abort();
        }
        record.state.send_if_modified(|state| {
            if matches!(state, ConnectionState::Pending { .. }) {
                *state = ConnectionState::Failed(ConnectFailure::InvalidTarget {
                    reason: "connection invalidated".to_string(),
                });
                true
            } else {
                false
            }
        });
        debug!(bridge = %self.identity, target = %target, "Connection record invalidated");
        true
    }

    /// Current state of `target`, if a record exists.
    #[must_use]
    pub fn state(&self, target: &TargetId) -> Option<ConnectionState> {
        self.records
            .lock()
            .get(target)
            .map(|record| record.state.borrow().clone())
    }

    /// Snapshot of every ready target, sorted by name.
    #[must_use]
    pub fn ready_targets(&self) -> Vec<TargetId> {
        let mut ready: Vec<TargetId> = self
            .records
            .lock()
            .iter()
            .filter(|(_, record)| *record.state.borrow() == ConnectionState::Ready)
            .map(|(target, _)| target.clone())
            .collect();
        ready.sort();
        ready
    }

    /// Aborts every probe loop and drops every record.
    ///
    /// Pending waiters fail with [`BridgeError::Shutdown`].
    pub fn shutdown(&self) {
        let records: Vec<Record> = self.records.lock().drain().map(|(_, r)| r).collect();
        for mut record in records {
            if let Some(task) = record.probe_task.take() {
                task.abort();
            }
        }
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("identity", &self.identity)
            .field("strategy", &self.strategy.name())
            .field("records", &self.records.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FixedInterval;
    use crate::transport::{InboundReceiver, MemoryNetwork};

    fn registry(network: &MemoryNetwork) -> Arc<ConnectionRegistry> {
        registry_with_interval(network, Duration::from_millis(10))
    }

    fn registry_with_interval(network: &MemoryNetwork, interval: Duration) -> Arc<ConnectionRegistry> {
        let (host, _host_rx) = network.join("host");
        Arc::new(ConnectionRegistry::new(
            "host",
            Arc::new(host),
            Arc::new(FixedInterval::new(interval)),
        ))
    }

    /// Acknowledges every probe the child receives, after skipping `skip`.
    fn answer_probes(
        registry: Arc<ConnectionRegistry>,
        name: &'static str,
        mut rx: InboundReceiver,
        skip: usize,
    ) -> tokio::task::JoinHandle<usize> {
        let codec = JsonCodec::new();
        tokio::spawn(async move {
            let mut seen = 0;
            while let Some(frame) = rx.recv().await {
                if let Ok(Envelope::HandshakeProbe(probe)) = codec.decode(&frame.data) {
                    seen += 1;
                    if seen > skip {
                        let ack = Ack {
                            peer_id: name.to_string(),
                            nonce: probe.nonce,
                        };
                        registry.acknowledge(&TargetId::from(name), &ack);
                    }
                }
            }
            seen
        })
    }

    #[tokio::test]
    async fn test_connects_after_ack() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let (_child, child_rx) = network.join_child("frame-a", "host");
        answer_probes(Arc::clone(&registry), "frame-a", child_rx, 0);

        let target = TargetId::from("frame-a");
        registry
            .ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(registry.state(&target), Some(ConnectionState::Ready));
        assert_eq!(registry.ready_targets(), vec![target]);
    }

    #[tokio::test]
    async fn test_retries_until_acknowledged() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let (_child, child_rx) = network.join_child("frame-a", "host");
        let answered = answer_probes(Arc::clone(&registry), "frame-a", child_rx, 3);

        let target = TargetId::from("frame-a");
        registry
            .ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1))
            .await
            .unwrap();

        network.leave(&target);
        assert!(answered.await.unwrap() >= 4);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let network = MemoryNetwork::new();
        let registry = registry_with_interval(&network, Duration::from_secs(5));
        let (_child, child_rx) = network.join_child("frame-a", "host");
        let answered = answer_probes(Arc::clone(&registry), "frame-a", child_rx, 0);

        let target = TargetId::from("frame-a");
        let (a, b, c) = tokio::join!(
            registry.ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1)),
            registry.ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1)),
            registry.ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1)),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());

        network.leave(&target);
        assert_eq!(answered.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_not_cached() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let target = TargetId::from("late");

        let error = registry
            .ensure_connected(&target, ProbeStyle::Named, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(error, BridgeError::ConnectionTimeout { attempts: 0, .. }));
        assert_eq!(registry.state(&target), None);

        let (_late, late_rx) = network.join("late");
        answer_probes(Arc::clone(&registry), "late", late_rx, 0);
        registry
            .ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unresolvable_target_resolved_lazily() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let target = TargetId::from("frame-b");

        let waiter = {
            let registry = Arc::clone(&registry);
            let target = target.clone();
            tokio::spawn(async move {
                registry
                    .ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        let (_child, child_rx) = network.join_child("frame-b", "host");
        answer_probes(Arc::clone(&registry), "frame-b", child_rx, 0);

        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_nonce_must_be_echoed() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let (_peer, mut peer_rx) = network.join("popup");
        let target = TargetId::from("popup");

        let responder = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                let codec = JsonCodec::new();
                let frame = peer_rx.recv().await.unwrap();
                let Ok(Envelope::HandshakeProbe(probe)) = codec.decode(&frame.data) else {
                    panic!("expected a probe");
                };
                let nonce = probe.nonce.expect("peer probes carry a nonce");

                let wrong = Ack {
                    peer_id: "someone-else".to_string(),
                    nonce: Some("not-the-nonce".to_string()),
                };
                assert_eq!(registry.acknowledge(&TargetId::from("popup"), &wrong), None);

                let right = Ack {
                    peer_id: "someone-else".to_string(),
                    nonce: Some(nonce),
                };
                registry.acknowledge(&TargetId::from("popup"), &right)
            })
        };

        registry
            .ensure_connected(&target, ProbeStyle::Nonce, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(responder.await.unwrap(), Some(target));
    }

    #[tokio::test]
    async fn test_closed_target_fails_fast() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let (_popup, _popup_rx) = network.join("popup");
        let target = TargetId::from("popup");
        network.close(&target);

        let error = registry
            .ensure_connected(&target, ProbeStyle::Nonce, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(error, BridgeError::InvalidTarget { .. }));
    }

    #[tokio::test]
    async fn test_invalidate_forces_new_handshake() {
        let network = MemoryNetwork::new();
        let registry = registry_with_interval(&network, Duration::from_secs(5));
        let (_child, child_rx) = network.join_child("frame-a", "host");
        let answered = answer_probes(Arc::clone(&registry), "frame-a", child_rx, 0);
        let target = TargetId::from("frame-a");

        registry
            .ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(registry.invalidate(&target));
        assert!(!registry.invalidate(&target));
        assert!(registry.ready_targets().is_empty());

        registry
            .ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(1))
            .await
            .unwrap();

        network.leave(&target);
        assert_eq!(answered.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_fails_waiters() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let target = TargetId::from("nobody");

        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(5))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        registry.shutdown();

        let error = waiter.await.unwrap().unwrap_err();
        assert!(matches!(error, BridgeError::Shutdown));
    }

    #[tokio::test]
    async fn test_unbounded_timeout_keeps_probing() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let target = TargetId::from("frame-a");

        let waiter = {
            let registry = Arc::clone(&registry);
            let target = target.clone();
            tokio::spawn(async move {
                registry
                    .ensure_connected(&target, ProbeStyle::Named, Duration::MAX)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(matches!(registry.state(&target), Some(ConnectionState::Pending { .. })));

        let (_child, child_rx) = network.join_child("frame-a", "host");
        answer_probes(Arc::clone(&registry), "frame-a", child_rx, 0);

        waiter.await.unwrap().unwrap();
        assert_eq!(registry.state(&target), Some(ConnectionState::Ready));
    }

    #[tokio::test]
    async fn test_ended_probe_task_fails_waiters() {
        let network = MemoryNetwork::new();
        let registry = registry(&network);
        let (_child, _child_rx) = network.join_child("frame-a", "host");
        let target = TargetId::from("frame-a");

        let waiter = {
            let registry = Arc::clone(&registry);
            let target = target.clone();
            tokio::spawn(async move {
                registry
                    .ensure_connected(&target, ProbeStyle::Named, Duration::from_secs(5))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let task = registry
            .records
            .lock()
            .get(&target)
            .and_then(|record| record.probe_task.clone())
            .expect("probe task running");
        task.abort();

        let error = waiter.await.unwrap().unwrap_err();
        assert!(matches!(error, BridgeError::InvalidTarget { .. }));
        assert_eq!(registry.state(&target), None);
    }
}
