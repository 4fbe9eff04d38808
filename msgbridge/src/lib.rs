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

#![doc = include_str!("../../README.md")]
#![allow(clippy::module_inception)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

//! ## Architecture
//!
//! Each context owns one [`Bridge`]. Everything it sends and receives
//! travels as an [`Envelope`](envelope::Envelope) over one unordered
//! channel provided by a [`Transport`](transport::Transport):
//!
//! - **[`envelope`]**: wire vocabulary, ids, and the JSON codec
//! - **[`connection`]**: handshake registry and probe strategies
//! - **[`dispatch`]**: correlation table, inbound dispatcher, request hub
//! - **[`endpoint`]**: call operations bound to one target
//! - **[`broadcast`]**: fan-out of one call to every connected target
//! - **[`transport`]**: the collaborator boundary and an in-memory network
//!
//! ```text
//!  caller ──▶ Endpoint ──▶ Link ──▶ Transport ─ ─ ─ ▶ other context
//!                │                                        │
//!         CorrelationTable ◀── Dispatcher ◀── inbound ◀───┘
//!                                  │
//!                 RequestHub ◀─────┴────▶ ConnectionRegistry
//! ```
//!
//! ## Error Handling
//!
//! Every asynchronous operation either resolves or fails with a
//! [`BridgeError`]. Malformed inbound frames are logged and dropped; they
//! never reach a caller. See the [`error`] module.
//!
//! ## Logging
//!
//! All components log through [`tracing`] with a `bridge` field naming the
//! context. Install any subscriber to see them.

pub mod bridge;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod transport;

pub use bridge::Bridge;
pub use broadcast::{BroadcastCall, BroadcastStream, TaggedValue};
pub use config::BridgeConfig;
pub use connection::{ConnectionState, ExponentialBackoff, FixedInterval, ProbeStrategy};
pub use endpoint::{Endpoint, Reaction, ResponseStream, StreamCall};
pub use envelope::{CorrelationId, Payload, TargetId};
pub use error::BridgeError;
pub use transport::{MemoryNetwork, Transport, TransportError};
