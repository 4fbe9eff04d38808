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

//! Classification of inbound frames.

use super::{CorrelationTable, InboundRequest, RequestHub, Routed};
use crate::connection::ConnectionRegistry;
use crate::envelope::{Envelope, JsonCodec};
use crate::transport::{InboundFrame, InboundReceiver, Transport};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Counters describing the dispatcher's traffic.
///
/// # Examples
///
/// ```rust
/// use msgbridge::dispatch::DispatchStats;
///
/// let stats = DispatchStats::new();
/// assert_eq!(stats.frames_received(), 0);
/// assert_eq!(stats.malformed_dropped(), 0);
/// ```
#[derive(Debug, Default)]
pub struct DispatchStats {
    /// Every frame handed to the dispatcher
    frames_received: AtomicU64,
    /// Frames that did not decode to a known envelope
    malformed_dropped: AtomicU64,
    /// Requests published to local observers
    requests_published: AtomicU64,
    /// Responses routed to a continuation
    responses_routed: AtomicU64,
    /// Responses whose id had no continuation
    orphan_responses: AtomicU64,
    /// Probes answered with an ack
    probes_answered: AtomicU64,
    /// Acks that completed a pending handshake
    acks_matched: AtomicU64,
}

impl DispatchStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Total frames received.
    #[must_use]
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Frames dropped because they were not recognizable envelopes.
    #[must_use]
    pub fn malformed_dropped(&self) -> u64 {
        self.malformed_dropped.load(Ordering::Relaxed)
    }

    /// Requests published to observers.
    #[must_use]
    pub fn requests_published(&self) -> u64 {
        self.requests_published.load(Ordering::Relaxed)
    }

    /// Responses routed to a registered continuation.
    #[must_use]
    pub fn responses_routed(&self) -> u64 {
        self.responses_routed.load(Ordering::Relaxed)
    }

    /// Responses dropped because no continuation was registered.
    #[must_use]
    pub fn orphan_responses(&self) -> u64 {
        self.orphan_responses.load(Ordering::Relaxed)
    }

    /// Probes answered.
    #[must_use]
    pub fn probes_answered(&self) -> u64 {
        self.probes_answered.load(Ordering::Relaxed)
    }

    /// Acks that completed a handshake.
    #[must_use]
    pub fn acks_matched(&self) -> u64 {
        self.acks_matched.load(Ordering::Relaxed)
    }
}

/// What the dispatcher did with one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A request reached this many observers.
    Request(usize),
    /// A response was routed through the correlation table.
    Response(Routed),
    /// A probe was answered (`true`) or the ack could not be delivered.
    Probe(bool),
    /// An ack matched (`true`) or did not match a pending handshake.
    Ack(bool),
    /// The frame was not a recognizable envelope.
    Malformed,
}

/// Single consumer of a bridge's inbound frames.
///
/// Each frame is classified by its `kind`:
///
/// - `response`: routed to the correlation table,
/// - `request`: published to request observers,
/// - `handshake-probe`: answered with an ack naming this bridge,
/// - `handshake-ack`: handed to the connection registry,
/// - anything else: dropped with a warning.
///
/// Unrecognizable frames never stop the loop.
pub struct Dispatcher {
    identity: String,
    codec: JsonCodec,
    transport: Arc<dyn Transport>,
    table: Arc<CorrelationTable>,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<RequestHub>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given shared state.
    pub fn new(
        identity: impl Into<String>,
        transport: Arc<dyn Transport>,
        table: Arc<CorrelationTable>,
        registry: Arc<ConnectionRegistry>,
        hub: Arc<RequestHub>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            identity: identity.into(),
            codec: JsonCodec::new(),
            transport,
            table,
            registry,
            hub,
            stats,
        }
    }

    /// Consumes inbound frames until the event source closes.
    pub async fn run(self: Arc<Self>, mut inbound: InboundReceiver) {
        info!(bridge = %self.identity, "Dispatcher started");
        while let Some(frame) = inbound.recv().await {
            self.dispatch_frame(&frame);
        }
        info!(bridge = %self.identity, "Inbound source closed, dispatcher stopped");
    }

    /// Classifies and handles a single frame.
    pub fn dispatch_frame(&self, frame: &InboundFrame) -> Dispatched {
        DispatchStats::bump(&self.stats.frames_received);

        let envelope = match self.codec.decode(&frame.data) {
            Ok(envelope) => envelope,
            Err(e) => {
                DispatchStats::bump(&self.stats.malformed_dropped);
                warn!(
                    bridge = %self.identity,
                    source = %frame.source,
                    error = %e,
                    "Dropping unrecognized frame"
                );
                return Dispatched::Malformed;
            }
        };

        match envelope {
            Envelope::Response(response) => {
                let id = response.id.clone();
                let routed = self.table.dispatch(response);
                if routed == Routed::Orphan {
                    DispatchStats::bump(&self.stats.orphan_responses);
                    debug!(bridge = %self.identity, id = %id, "Dropping response with no pending call");
                } else {
                    DispatchStats::bump(&self.stats.responses_routed);
                }
                Dispatched::Response(routed)
            }
            Envelope::Request(request) => {
                DispatchStats::bump(&self.stats.requests_published);
                debug!(
                    bridge = %self.identity,
                    source = %frame.source,
                    action = %request.action,
                    id = %request.id,
                    "Inbound request"
                );
                Dispatched::Request(
                    self.hub
                        .publish(InboundRequest::new(request, frame.source.clone())),
                )
            }
            Envelope::HandshakeProbe(probe) => {
                let answered = self
                    .codec
                    .encode(&Envelope::ack(self.identity.clone(), probe.nonce))
                    .map_err(crate::BridgeError::from)
                    .and_then(|ack| {
                        self.transport
                            .deliver(&frame.source, ack)
                            .map_err(crate::BridgeError::from)
                    });
                match answered {
                    Ok(()) => {
                        DispatchStats::bump(&self.stats.probes_answered);
                        debug!(bridge = %self.identity, source = %frame.source, "Answered handshake probe");
                        Dispatched::Probe(true)
                    }
                    Err(e) => {
                        warn!(bridge = %self.identity, source = %frame.source, error = %e, "Cannot answer handshake probe");
                        Dispatched::Probe(false)
                    }
                }
            }
            Envelope::HandshakeAck(ack) => {
                let matched = self.registry.acknowledge(&frame.source, &ack).is_some();
                if matched {
                    DispatchStats::bump(&self.stats.acks_matched);
                }
                Dispatched::Ack(matched)
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("identity", &self.identity)
            .field("table", &self.table)
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::FixedInterval;
    use crate::envelope::{CallMode, CorrelationId, Payload, TargetId};
    use crate::transport::MemoryNetwork;
    use serde_json::json;

    struct Fixture {
        dispatcher: Dispatcher,
        table: Arc<CorrelationTable>,
        hub: Arc<RequestHub>,
        stats: Arc<DispatchStats>,
        network: MemoryNetwork,
    }

    fn fixture() -> Fixture {
        let network = MemoryNetwork::new();
        let (host, _host_rx) = network.join("host");
        let transport: Arc<dyn Transport> = Arc::new(host);
        let table = Arc::new(CorrelationTable::new());
        let hub = Arc::new(RequestHub::new());
        let stats = Arc::new(DispatchStats::new());
        let registry = Arc::new(ConnectionRegistry::new(
            "host",
            Arc::clone(&transport),
            Arc::new(FixedInterval::default()),
        ));
        let dispatcher = Dispatcher::new(
            "host",
            transport,
            Arc::clone(&table),
            registry,
            Arc::clone(&hub),
            Arc::clone(&stats),
        );
        Fixture {
            dispatcher,
            table,
            hub,
            stats,
            network,
        }
    }

    fn encode(envelope: &Envelope) -> String {
        JsonCodec::new().encode(envelope).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_frames_dropped() {
        let fx = fixture();
        for data in ["not json", "42", r#"{"kind":"mystery"}"#, r#"{"no":"kind"}"#] {
            let outcome = fx.dispatcher.dispatch_frame(&InboundFrame::new(data, "x"));
            assert_eq!(outcome, Dispatched::Malformed);
        }
        assert_eq!(fx.stats.malformed_dropped(), 4);
        assert_eq!(fx.stats.frames_received(), 4);
    }

    #[tokio::test]
    async fn test_request_published_with_source() {
        let fx = fixture();
        let mut requests = fx.hub.subscribe();

        let frame = encode(&Envelope::request(
            CorrelationId::from("r1"),
            "ping",
            json!({}),
            CallMode::Single,
        ));
        let outcome = fx.dispatcher.dispatch_frame(&InboundFrame::new(frame, "frame-a"));
        assert_eq!(outcome, Dispatched::Request(1));

        let inbound = requests.recv().await.unwrap();
        assert_eq!(inbound.action(), "ping");
        assert_eq!(inbound.source, TargetId::from("frame-a"));
    }

    #[tokio::test]
    async fn test_response_routed_and_orphans_counted() {
        let fx = fixture();
        let id = CorrelationId::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Payload>();
        fx.table.register(
            id.clone(),
            Arc::new(move |payload: Payload, _terminal: bool| {
                let _ = tx.send(payload);
            }),
        );

        let frame = encode(&Envelope::response(id.clone(), json!({"pong": true}), true));
        assert_eq!(
            fx.dispatcher.dispatch_frame(&InboundFrame::new(frame.clone(), "frame-a")),
            Dispatched::Response(Routed::Completed)
        );
        assert_eq!(rx.recv().await, Some(json!({"pong": true})));

        assert_eq!(
            fx.dispatcher.dispatch_frame(&InboundFrame::new(frame, "frame-a")),
            Dispatched::Response(Routed::Orphan)
        );
        assert_eq!(fx.stats.responses_routed(), 1);
        assert_eq!(fx.stats.orphan_responses(), 1);
    }

    #[tokio::test]
    async fn test_probe_answered_with_identity_and_nonce() {
        let fx = fixture();
        let (_peer, mut peer_rx) = fx.network.join("popup");

        let frame = encode(&Envelope::probe(Some("n-1".to_string())));
        assert_eq!(
            fx.dispatcher.dispatch_frame(&InboundFrame::new(frame, "popup")),
            Dispatched::Probe(true)
        );

        let reply = peer_rx.recv().await.unwrap();
        assert_eq!(reply.source, TargetId::from("host"));
        assert_eq!(
            JsonCodec::new().decode(&reply.data).unwrap(),
            Envelope::ack("host", Some("n-1".to_string()))
        );
        assert_eq!(fx.stats.probes_answered(), 1);
    }

    #[tokio::test]
    async fn test_probe_from_vanished_source_not_fatal() {
        let fx = fixture();
        let frame = encode(&Envelope::probe(None));
        assert_eq!(
            fx.dispatcher.dispatch_frame(&InboundFrame::new(frame, "gone")),
            Dispatched::Probe(false)
        );
    }

    #[tokio::test]
    async fn test_unmatched_ack_ignored() {
        let fx = fixture();
        let frame = encode(&Envelope::ack("stranger", None));
        assert_eq!(
            fx.dispatcher.dispatch_frame(&InboundFrame::new(frame, "stranger")),
            Dispatched::Ack(false)
        );
        assert_eq!(fx.stats.acks_matched(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_when_source_closes() {
        let fx = fixture();
        let (tx, rx) = crate::transport::inbound_channel();
        let mut requests = fx.hub.subscribe();
        let task = tokio::spawn(Arc::new(fx.dispatcher).run(rx));

        tx.send(InboundFrame::new("garbage", "x")).unwrap();
        tx.send(InboundFrame::new(
            encode(&Envelope::request(CorrelationId::new(), "after", json!(null), CallMode::Single)),
            "x",
        ))
        .unwrap();
        assert_eq!(requests.recv().await.unwrap().action(), "after");

        drop(tx);
        task.await.unwrap();
        assert_eq!(fx.stats.frames_received(), 2);
    }
}
