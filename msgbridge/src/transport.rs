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

//! Transport collaborator boundary.
//!
//! The bridge never touches the concrete message primitive directly. It
//! reaches other contexts through three narrow capabilities:
//!
//! - [`Transport::resolve`]: look up a handle for a target identity, which
//!   may not exist yet,
//! - [`Postbox::post`]: best-effort, fire-and-forget delivery of one frame,
//! - an inbound event source of [`InboundFrame`]s, consumed only by the
//!   bridge dispatcher.
//!
//! [`MemoryNetwork`] implements all three in-process for tests and for
//! wiring several bridges inside one program.

mod error;
mod memory;
mod traits;

pub use error::TransportError;
pub use memory::{MemoryNetwork, MemoryTransport};
pub use traits::{
    InboundFrame, InboundReceiver, InboundSender, Postbox, Transport, inbound_channel,
};
