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

//! Handshake-based connection registry.
//!
//! Before the first call to a named target, the bridge must know that the
//! target's dispatcher is running. It repeatedly sends a `handshake-probe`
//! until the target answers with a `handshake-ack`, then remembers the
//! target as ready for the lifetime of the bridge.
//!
//! ```text
//! caller ──ensure_connected──▶ registry ──probe──▶ target
//!                                  ▲                  │
//!                                  └──────ack─────────┘ (via dispatcher)
//! ```
//!
//! Probe cadence is pluggable through [`ProbeStrategy`].

mod registry;
mod strategy;

pub use registry::{ConnectFailure, ConnectionRegistry, ConnectionState, ProbeStyle};
pub use strategy::{ExponentialBackoff, ExponentialBackoffBuilder, FixedInterval, ProbeStrategy};
