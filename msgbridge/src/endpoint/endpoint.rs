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

//! Target-bound call operations.

use super::{ActionStream, Link, Reaction, StreamCall};
use crate::bridge::BridgeCore;
use crate::envelope::{CallMode, CorrelationId, Envelope, Payload, TargetId};
use crate::error::BridgeError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Call operations bound to one target.
///
/// Endpoints are cheap to create and clone. All endpoints of a bridge share
/// the same correlation table and connection registry, so two endpoints for
/// the same target share one handshake.
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
/// let (child_transport, child_rx) = network.join_child("frame-a", "host");
///
/// let host = Bridge::new(BridgeConfig::new().with_identity("host"), host_transport);
/// host.start(host_rx);
/// let child = Bridge::new(BridgeConfig::new().with_identity("frame-a"), child_transport);
/// child.start(child_rx);
///
/// child.to_parent()?.react_to("ping", |_| async { json!({"pong": true}) });
///
/// let reply = host.to_child("frame-a").send_request("ping", json!({})).await?;
/// assert_eq!(reply, json!({"pong": true}));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Endpoint {
    link: Arc<dyn Link>,
    core: Arc<BridgeCore>,
}

impl Endpoint {
    pub(crate) fn new(link: Arc<dyn Link>, core: Arc<BridgeCore>) -> Self {
        Self { link, core }
    }

    /// The target this endpoint talks to.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        self.link.target()
    }

    /// Waits until the target is ready without sending a call.
    ///
    /// # Errors
    ///
    /// Fails like the handshake behind the first call would.
    pub async fn ready(&self) -> Result<(), BridgeError> {
        self.core.ensure_open()?;
        self.link.ensure_ready().await
    }

    /// Sends a request and waits for its first answer.
    ///
    /// Uses the bridge's configured request timeout.
    ///
    /// # Errors
    ///
    /// See [`send_request_timeout`](Self::send_request_timeout).
    pub async fn send_request(
        &self,
        action: impl Into<String>,
        payload: Payload,
    ) -> Result<Payload, BridgeError> {
        self.send_request_timeout(action, payload, self.core.config.request_timeout)
            .await
    }

    /// Sends a request and waits at most `timeout` for its first answer.
    ///
    /// The deadline starts once the request has been delivered, so the
    /// handshake does not count against it. Later frames for the same id
    /// are dropped.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::ConnectionTimeout`] or [`BridgeError::InvalidTarget`]
    ///   if the target never becomes ready
    /// - [`BridgeError::Transport`] if the request cannot be delivered
    /// - [`BridgeError::CallTimeout`] if no answer arrives in time
    /// - [`BridgeError::Shutdown`] if the bridge shuts down meanwhile
    pub async fn send_request_timeout(
        &self,
        action: impl Into<String>,
        payload: Payload,
        timeout: Duration,
    ) -> Result<Payload, BridgeError> {
        let action = action.into();
        self.core.ensure_open()?;
        self.link.ensure_ready().await?;

        let id = CorrelationId::new();
        let frame = self.core.encode(&Envelope::request(
            id.clone(),
            action.clone(),
            payload,
            CallMode::Single,
        ))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _registration = self.core.table.register_scoped(
            id.clone(),
            Arc::new(move |payload: Payload, _terminal: bool| {
                let _ = tx.send(payload);
            }),
        );

        self.link.deliver(frame)?;
        debug!(
            bridge = %self.core.identity,
            target = %self.link.target(),
            action = %action,
            id = %id,
            "Request sent"
        );

        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(payload)) => Ok(payload),
            Ok(None) => Err(BridgeError::Shutdown),
            Err(_) => {
                warn!(
                    bridge = %self.core.identity,
                    target = %self.link.target(),
                    action = %action,
                    id = %id,
                    "Request timed out"
                );
                Err(BridgeError::CallTimeout {
                    action,
                    id,
                    timeout,
                })
            }
        }
    }

    /// Prepares a streaming call. Nothing is sent until it is subscribed.
    pub fn send_observable(&self, action: impl Into<String>, payload: Payload) -> StreamCall {
        StreamCall::new(
            Arc::clone(&self.link),
            Arc::clone(&self.core),
            action.into(),
            payload,
        )
    }

    /// Subscribes to inbound requests for `action`.
    ///
    /// Requests are matched by action from any source.
    pub fn listen_for(&self, action: impl Into<String>) -> ActionStream {
        ActionStream::new(self.core.hub.subscribe(), action.into())
    }

    /// Answers the next request for `action` with the value of `handler`.
    ///
    /// The reaction is installed before this returns. On the first matching
    /// request it awaits `handler(payload)`, sends a terminal response back
    /// to the request's source, and detaches. Later matching requests are
    /// left to other observers.
    pub fn react_to<F, Fut>(&self, action: impl Into<String>, handler: F) -> Reaction
    where
        F: FnOnce(Payload) -> Fut + Send + 'static,
        Fut: Future<Output = Payload> + Send + 'static,
    {
        let action = action.into();
        let mut requests = self.listen_for(action.clone());
        let core = Arc::clone(&self.core);

        let task = tokio::spawn(async move {
            let Some(inbound) = requests.recv().await else {
                return Err(BridgeError::Shutdown);
            };
            drop(requests);

            let id = inbound.request.id;
            let answer = handler(inbound.request.payload).await;
            let frame = core.encode(&Envelope::response(id.clone(), answer, true))?;
            core.transport.deliver(&inbound.source, frame)?;
            debug!(bridge = %core.identity, source = %inbound.source, id = %id, "Reaction answered");
            Ok(id)
        });

        Reaction::new(action, task)
    }

    /// Sends one response frame for request `id`.
    ///
    /// Call with `terminal = false` any number of times to stream answers,
    /// then once with `terminal = true`.
    ///
    /// # Errors
    ///
    /// Fails if the frame cannot be encoded or delivered.
    pub fn respond(&self, id: &CorrelationId, payload: Payload, terminal: bool) -> Result<(), BridgeError> {
        self.link
            .deliver(self.core.encode(&Envelope::response(id.clone(), payload, terminal))?)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint").field("link", &self.link).finish()
    }
}
