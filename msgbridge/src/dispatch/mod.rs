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

//! Inbound frame routing.
//!
//! Every frame arriving at a context passes through exactly one
//! [`Dispatcher`], which hands it to one of three sinks:
//!
//! ```text
//!                      ┌──▶ CorrelationTable  (responses)
//! inbound ─▶ Dispatcher ┼──▶ RequestHub        (requests)
//!                      └──▶ ConnectionRegistry (handshake acks)
//! ```
//!
//! Handshake probes are answered directly by the dispatcher.

mod correlation;
mod dispatcher;
mod hub;

pub use correlation::{Continuation, CorrelationTable, Registration, Routed};
pub use dispatcher::{DispatchStats, Dispatched, Dispatcher};
pub use hub::{InboundRequest, RequestHub, RequestStream};
