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

//! Wire vocabulary shared by every part of the bridge.
//!
//! Every unit exchanged over the channel is an [`Envelope`], serialized as a
//! flat JSON record discriminated by its `kind` field:
//!
//! ```json
//! {"kind":"request","id":"…","action":"ping","payload":{},"mode":"single"}
//! {"kind":"response","id":"…","payload":{"pong":true},"terminal":true}
//! {"kind":"handshake-probe"}
//! {"kind":"handshake-ack","peerId":"frame-a"}
//! ```
//!
//! Envelopes carry no behaviour. They are created per call and discarded
//! after transmission.

mod codec;
mod id;

pub use codec::{FrameError, JsonCodec};
pub use id::{CorrelationId, TargetId};

use serde::{Deserialize, Serialize};

/// Application payload carried by requests and responses.
///
/// The core never inspects payloads; they are arbitrary JSON values.
pub type Payload = serde_json::Value;

/// Advisory hint distinguishing single-answer calls from streaming calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallMode {
    /// The caller expects exactly one answer.
    #[default]
    Single,
    /// The caller expects a sequence of answers ending with a terminal frame.
    Stream,
}

/// A call issued by one context to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id chosen by the caller.
    pub id: CorrelationId,
    /// Application-defined routing key.
    pub action: String,
    /// Request payload.
    #[serde(default)]
    pub payload: Payload,
    /// Whether the caller expects one answer or a stream.
    #[serde(default)]
    pub mode: CallMode,
}

/// One answer frame for an earlier [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the originating request.
    pub id: CorrelationId,
    /// Response payload.
    #[serde(default)]
    pub payload: Payload,
    /// Marks the last frame for this id. Absent means `true`.
    #[serde(default = "terminal_default")]
    pub terminal: bool,
}

const fn terminal_default() -> bool {
    true
}

/// Handshake probe sent by an initiator that is not yet connected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// Optional token the acknowledgement must echo back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Handshake acknowledgement sent by any listener that receives a probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Self-identifying name of the responder.
    #[serde(rename = "peerId")]
    pub peer_id: String,
    /// Echo of the probe's nonce, if it carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// A single serialized unit exchanged over the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Envelope {
    /// A call.
    Request(Request),
    /// An answer frame.
    Response(Response),
    /// "Is anyone listening?"
    HandshakeProbe(Probe),
    /// "Yes, and this is who I am."
    HandshakeAck(Ack),
}

impl Envelope {
    /// Builds a request envelope.
    pub fn request(
        id: CorrelationId,
        action: impl Into<String>,
        payload: Payload,
        mode: CallMode,
    ) -> Self {
        Self::Request(Request {
            id,
            action: action.into(),
            payload,
            mode,
        })
    }

    /// Builds a response envelope.
    pub fn response(id: CorrelationId, payload: Payload, terminal: bool) -> Self {
        Self::Response(Response {
            id,
            payload,
            terminal,
        })
    }

    /// Builds a handshake probe.
    pub fn probe(nonce: Option<String>) -> Self {
        Self::HandshakeProbe(Probe { nonce })
    }

    /// Builds a handshake acknowledgement.
    pub fn ack(peer_id: impl Into<String>, nonce: Option<String>) -> Self {
        Self::HandshakeAck(Ack {
            peer_id: peer_id.into(),
            nonce,
        })
    }

    /// Returns the wire name of this envelope's kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::HandshakeProbe(_) => "handshake-probe",
            Self::HandshakeAck(_) => "handshake-ack",
        }
    }

    /// Returns the correlation id, if this envelope carries one.
    #[must_use]
    pub const fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            Self::Request(request) => Some(&request.id),
            Self::Response(response) => Some(&response.id),
            Self::HandshakeProbe(_) | Self::HandshakeAck(_) => None,
        }
    }
}
