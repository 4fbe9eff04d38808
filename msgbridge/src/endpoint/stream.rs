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

//! Streams returned by endpoints.

use super::Link;
use crate::bridge::BridgeCore;
use crate::dispatch::{InboundRequest, Registration, RequestStream};
use crate::envelope::{CallMode, CorrelationId, Envelope, Payload};
use crate::error::BridgeError;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

/// A streaming call that has not been issued yet.
///
/// Nothing is sent until [`subscribe`](Self::subscribe) is called, and
/// every subscription issues an independent request with its own
/// correlation id. Cloning the handle does not share calls either.
#[derive(Clone)]
pub struct StreamCall {
    link: Arc<dyn Link>,
    core: Arc<BridgeCore>,
    action: String,
    payload: Payload,
}

impl StreamCall {
    pub(crate) fn new(
        link: Arc<dyn Link>,
        core: Arc<BridgeCore>,
        action: String,
        payload: Payload,
    ) -> Self {
        Self {
            link,
            core,
            action,
            payload,
        }
    }

    /// The action this call will request.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Issues the request and returns the stream of its answers.
    ///
    /// The continuation is registered immediately; the request is sent
    /// once the target is ready. Dropping the stream unregisters the
    /// continuation. The peer is not notified.
    pub fn subscribe(&self) -> ResponseStream {
        let (tx, rx) = mpsc::unbounded_channel();

        if let Err(e) = self.core.ensure_open() {
            let _ = tx.send(StreamEvent::Failed(e));
            return ResponseStream::detached(rx);
        }

        let id = CorrelationId::new();
        let sink = tx.clone();
        let registration = self.core.table.register_scoped(
            id.clone(),
            Arc::new(move |payload: Payload, terminal: bool| {
                if terminal {
                    if !payload.is_null() {
                        let _ = sink.send(StreamEvent::Item(payload));
                    }
                    let _ = sink.send(StreamEvent::Completed);
                } else {
                    let _ = sink.send(StreamEvent::Item(payload));
                }
            }),
        );

        let link = Arc::clone(&self.link);
        let core = Arc::clone(&self.core);
        let envelope = Envelope::request(id, self.action.clone(), self.payload.clone(), CallMode::Stream);
        let send = tokio::spawn(async move {
            let sent = async {
                link.ensure_ready().await?;
                link.deliver(core.encode(&envelope)?)
            }
            .await;
            if let Err(e) = sent {
                debug!(bridge = %core.identity, target = %link.target(), error = %e, "Streaming call failed");
                let _ = tx.send(StreamEvent::Failed(e));
            }
        });

        ResponseStream {
            rx,
            registration: Some(registration),
            send: Some(send.abort_handle()),
            done: false,
        }
    }
}

impl std::fmt::Debug for StreamCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamCall")
            .field("target", self.link.target())
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum StreamEvent {
    Item(Payload),
    Completed,
    Failed(BridgeError),
}

/// Answers to one subscription of a [`StreamCall`].
///
/// Yields `Ok(payload)` for every answer frame and ends after the terminal
/// frame. A failure is yielded once as `Err` and ends the stream. At most
/// one terminal event is ever observed.
#[derive(Debug)]
pub struct ResponseStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    registration: Option<Registration>,
    send: Option<AbortHandle>,
    done: bool,
}

impl ResponseStream {
    fn detached(rx: mpsc::UnboundedReceiver<StreamEvent>) -> Self {
        Self {
            rx,
            registration: None,
            send: None,
            done: false,
        }
    }

    /// Correlation id of the underlying request, while it is registered.
    #[must_use]
    pub fn id(&self) -> Option<&CorrelationId> {
        self.registration.as_ref().map(Registration::id)
    }

    /// Returns `true` once the stream has ended.
    #[must_use]
    pub const fn is_terminated(&self) -> bool {
        self.done
    }

    fn finish(&mut self) {
        self.done = true;
        self.registration = None;
    }
}

impl Stream for ResponseStream {
    type Item = Result<Payload, BridgeError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }
        match ready!(self.rx.poll_recv(cx)) {
            Some(StreamEvent::Item(payload)) => Poll::Ready(Some(Ok(payload))),
            Some(StreamEvent::Completed) => {
                self.finish();
                Poll::Ready(None)
            }
            Some(StreamEvent::Failed(e)) => {
                self.finish();
                Poll::Ready(Some(Err(e)))
            }
            None => {
                self.finish();
                Poll::Ready(Some(Err(BridgeError::Shutdown)))
            }
        }
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if let Some(send) = self.send.take() {
            send.abort();
        }
    }
}

/// Inbound requests for one action.
///
/// Each subscription filters independently and only sees requests that
/// arrive after it was created.
#[derive(Debug)]
pub struct ActionStream {
    inner: RequestStream,
    action: String,
}

impl ActionStream {
    pub(crate) fn new(inner: RequestStream, action: String) -> Self {
        Self { inner, action }
    }

    /// The action being filtered for.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Receives the next matching request, or `None` once the bridge shuts down.
    pub async fn recv(&mut self) -> Option<InboundRequest> {
        loop {
            let request = self.inner.recv().await?;
            if request.action() == self.action {
                return Some(request);
            }
        }
    }
}

impl Stream for ActionStream {
    type Item = InboundRequest;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(request) if request.action() == self.action => return Poll::Ready(Some(request)),
                Some(_) => {}
                None => return Poll::Ready(None),
            }
        }
    }
}
