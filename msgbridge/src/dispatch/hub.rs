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

//! Multicast of inbound requests to local observers.

use crate::envelope::{CallMode, CorrelationId, Payload, Request, TargetId};
use futures_util::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// A request received from another context.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    /// The decoded request.
    pub request: Request,
    /// Context the request came from. Responses are addressed back to it.
    pub source: TargetId,
}

impl InboundRequest {
    /// Creates an inbound request.
    pub fn new(request: Request, source: impl Into<TargetId>) -> Self {
        Self {
            request,
            source: source.into(),
        }
    }

    /// The request's correlation id.
    #[must_use]
    pub const fn id(&self) -> &CorrelationId {
        &self.request.id
    }

    /// The request's action.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.request.action
    }

    /// The request's payload.
    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.request.payload
    }

    /// Whether the caller expects a stream of answers.
    #[must_use]
    pub const fn mode(&self) -> CallMode {
        self.request.mode
    }
}

/// Hot multicast source of inbound requests.
///
/// Every subscriber sees every request published after it subscribed, in
/// arrival order. Requests published while nobody is subscribed are lost.
/// Subscribers whose stream has been dropped are pruned on the next publish
/// or subscribe.
#[derive(Debug, Default)]
pub struct RequestHub {
    observers: Mutex<Vec<mpsc::UnboundedSender<InboundRequest>>>,
}

impl RequestHub {
    /// Creates a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every request published from now on.
    ///
    /// Subscribers whose stream has been dropped are pruned first.
    pub fn subscribe(&self) -> RequestStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut observers = self.observers.lock();
        observers.retain(|observer| !observer.is_closed());
        observers.push(tx);
        RequestStream { rx }
    }

    /// Publishes a request to every live subscriber.
    ///
    /// Returns the number of subscribers it reached.
    pub fn publish(&self, request: InboundRequest) -> usize {
        let mut observers = self.observers.lock();
        observers.retain(|tx| tx.send(request.clone()).is_ok());
        observers.len()
    }

    /// Number of subscribers, including ones not yet pruned.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Drops every subscriber. Their streams end.
    pub fn close(&self) {
        self.observers.lock().clear();
    }
}

/// Stream of [`InboundRequest`]s from a [`RequestHub`].
#[derive(Debug)]
pub struct RequestStream {
    rx: mpsc::UnboundedReceiver<InboundRequest>,
}

impl RequestStream {
    /// Receives the next request, or `None` once the hub is closed.
    pub async fn recv(&mut self) -> Option<InboundRequest> {
        self.rx.recv().await
    }
}

impl Stream for RequestStream {
    type Item = InboundRequest;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
