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

//! Endpoints: call operations bound to one target.
//!
//! An [`Endpoint`] is built from a [`Link`], which supplies the only two
//! direction-specific capabilities:
//!
//! | Link           | Readiness                          | Delivery            |
//! |----------------|------------------------------------|---------------------|
//! | [`ChildLink`]  | named handshake via the registry   | to the child        |
//! | [`ParentLink`] | immediate                          | to the parent       |
//! | [`PeerLink`]   | nonce handshake, fails when closed | to the peer         |
//!
//! On top of a link every endpoint offers the same operations:
//!
//! - [`Endpoint::send_request`]: single-answer call with a timeout
//! - [`Endpoint::send_observable`]: cold streaming call
//! - [`Endpoint::listen_for`]: inbound requests for one action
//! - [`Endpoint::react_to`]: single-shot auto-responder
//! - [`Endpoint::respond`]: raw response frame, terminal or not

mod endpoint;
mod link;
mod reaction;
mod stream;

pub use endpoint::Endpoint;
pub use link::{ChildLink, Link, ParentLink, PeerLink};
pub use reaction::Reaction;
pub use stream::{ActionStream, ResponseStream, StreamCall};
