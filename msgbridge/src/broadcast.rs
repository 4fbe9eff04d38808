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

//! Fan-out of one call to every connected target.
//!
//! A broadcast snapshots the ready targets when it starts, derives one
//! correlation id per target (`<base>_<target>`), and sends one request to
//! each. Targets that connect later are not included.

use crate::bridge::BridgeCore;
use crate::dispatch::Registration;
use crate::envelope::{CallMode, CorrelationId, Envelope, Payload, TargetId};
use crate::error::BridgeError;
use futures_util::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One answer from a broadcast stream, tagged with the target that sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedValue {
    /// The answering target.
    pub target: TargetId,
    /// The answer.
    pub value: Payload,
}

type Sink<T> = mpsc::UnboundedSender<T>;

/// Registers one continuation per target and delivers the request to each.
///
/// Delivery failures are logged; the target simply never answers.
fn fan_out<T, F>(
    core: &Arc<BridgeCore>,
    targets: &[TargetId],
    action: &str,
    payload: &Payload,
    mode: CallMode,
    sink: &Sink<T>,
    forward: F,
) -> Result<Vec<Registration>, BridgeError>
where
    T: Send + 'static,
    F: Fn(&TargetId, &Sink<T>, Payload, bool) + Send + Sync + Clone + 'static,
{
    let base = CorrelationId::new();
    let mut registrations = Vec::with_capacity(targets.len());
    for target in targets {
        let id = base.for_target(target);
        let frame = core.encode(&Envelope::request(
            id.clone(),
            action,
            payload.clone(),
            mode,
        ))?;

        let tagged = target.clone();
        let sink = sink.clone();
        let forward = forward.clone();
        registrations.push(core.table.register_scoped(
            id,
            Arc::new(move |payload: Payload, terminal: bool| forward(&tagged, &sink, payload, terminal)),
        ));

        if let Err(e) = core.transport.deliver(target, frame) {
            warn!(bridge = %core.identity, target = %target, action, error = %e, "Broadcast delivery failed");
        }
    }
    debug!(bridge = %core.identity, action, targets = targets.len(), base = %base, "Broadcast sent");
    Ok(registrations)
}

/// Sends `action` to every ready target and collects one answer from each.
pub(crate) async fn broadcast_request(
    core: &Arc<BridgeCore>,
    action: String,
    payload: Payload,
    timeout: Duration,
) -> Result<HashMap<TargetId, Payload>, BridgeError> {
    core.ensure_open()?;
    let targets = core.registry.ready_targets();
    if targets.is_empty() {
        return Ok(HashMap::new());
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<(TargetId, Payload)>();
    let _registrations = fan_out(
        core,
        &targets,
        &action,
        &payload,
        CallMode::Single,
        &tx,
        |target, sink, payload, _terminal| {
            let _ = sink.send((target.clone(), payload));
        },
    )?;
    drop(tx);

    // A timeout too large to add to now means no deadline.
    let deadline = Instant::now().checked_add(timeout);
    let mut results: HashMap<TargetId, Payload> = HashMap::with_capacity(targets.len());
    while results.len() < targets.len() {
        let next = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, rx.recv()).await,
            None => Ok(rx.recv().await),
        };
        match next {
            Ok(Some((target, payload))) => {
                results.entry(target).or_insert(payload);
            }
            Ok(None) => return Err(BridgeError::Shutdown),
            Err(_) => {
                let missing: Vec<TargetId> = targets
                    .iter()
                    .filter(|target| !results.contains_key(*target))
                    .cloned()
                    .collect();
                warn!(
                    bridge = %core.identity,
                    action = %action,
                    answered = results.len(),
                    missing = missing.len(),
                    "Broadcast timed out"
                );
                return Err(BridgeError::BroadcastTimeout {
                    action,
                    timeout,
                    partial: results,
                    missing,
                });
            }
        }
    }
    Ok(results)
}

/// A streaming broadcast that has not been issued yet.
///
/// Like [`StreamCall`](crate::endpoint::StreamCall), every
/// [`subscribe`](Self::subscribe) takes a fresh snapshot of the ready
/// targets and issues fresh requests.
#[derive(Clone)]
pub struct BroadcastCall {
    core: Arc<BridgeCore>,
    action: String,
    payload: Payload,
}

impl BroadcastCall {
    pub(crate) fn new(core: Arc<BridgeCore>, action: String, payload: Payload) -> Self {
        Self {
            core,
            action,
            payload,
        }
    }

    /// Sends the request to every ready target.
    ///
    /// # Errors
    ///
    /// Fails if the bridge is shut down or the request cannot be encoded.
    pub fn subscribe(&self) -> Result<BroadcastStream, BridgeError> {
        self.core.ensure_open()?;
        let targets = self.core.registry.ready_targets();
        let (tx, rx) = mpsc::unbounded_channel::<TaggedValue>();
        let registrations = fan_out(
            &self.core,
            &targets,
            &self.action,
            &self.payload,
            CallMode::Stream,
            &tx,
            |target, sink, value, terminal| {
                if !terminal || !value.is_null() {
                    let _ = sink.send(TaggedValue {
                        target: target.clone(),
                        value,
                    });
                }
            },
        )?;
        Ok(BroadcastStream {
            rx,
            targets,
            _registrations: registrations,
        })
    }
}

impl std::fmt::Debug for BroadcastCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastCall")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

/// Merged answers from every target of a broadcast.
///
/// Values from different targets interleave in arrival order. The stream
/// ends once every target has sent its terminal frame; dropping it early
/// unregisters every per-target continuation.
#[derive(Debug)]
pub struct BroadcastStream {
    rx: mpsc::UnboundedReceiver<TaggedValue>,
    targets: Vec<TargetId>,
    _registrations: Vec<Registration>,
}

impl BroadcastStream {
    /// The targets this broadcast was sent to.
    #[must_use]
    pub fn targets(&self) -> &[TargetId] {
        &self.targets
    }

    /// Receives the next value, or `None` once every target has finished.
    pub async fn recv(&mut self) -> Option<TaggedValue> {
        self.rx.recv().await
    }
}

impl Stream for BroadcastStream {
    type Item = TaggedValue;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
