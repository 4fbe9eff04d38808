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

//! Tracking of in-flight calls awaiting response frames.
//!
//! This module maps correlation ids to the continuation that consumes
//! response frames for that id, so that frames arriving in any order are
//! routed back to the right caller.

use crate::envelope::{CorrelationId, Payload, Response};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Consumer of response frames for one correlation id.
///
/// Invoked with `(payload, terminal)` once per frame. Continuations run
/// outside the table's lock and must not block.
pub type Continuation = Arc<dyn Fn(Payload, bool) + Send + Sync>;

/// Outcome of routing one response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// The frame reached a registered continuation.
    Delivered,
    /// The frame was terminal and its entry has been removed.
    Completed,
    /// No continuation is registered for the frame's id.
    Orphan,
}

/// Tracks in-flight calls awaiting response frames.
///
/// Entries live from registration until a terminal frame arrives or the
/// caller unregisters (completion, timeout, cancellation). A terminal
/// frame removes the entry *before* its continuation runs, so a
/// continuation that unregisters its own id is harmless.
///
/// # Thread Safety
///
/// The table is shared between the dispatcher task and every caller. It
/// uses a `parking_lot` mutex that is never held across a continuation.
///
/// # Example
///
/// ```rust
/// use msgbridge::dispatch::{CorrelationTable, Routed};
/// use msgbridge::envelope::{CorrelationId, Payload, Response};
/// use serde_json::json;
/// use std::sync::{Arc, Mutex};
///
/// let table = CorrelationTable::new();
/// let id = CorrelationId::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = Arc::clone(&seen);
/// table.register(id.clone(), Arc::new(move |payload: Payload, terminal: bool| {
///     sink.lock().unwrap().push((payload, terminal));
/// }));
///
/// let frame = Response { id: id.clone(), payload: json!(1), terminal: false };
/// assert_eq!(table.dispatch(frame), Routed::Delivered);
/// let frame = Response { id: id.clone(), payload: json!(2), terminal: true };
/// assert_eq!(table.dispatch(frame), Routed::Completed);
///
/// assert!(table.is_empty());
/// assert_eq!(seen.lock().unwrap().len(), 2);
/// ```
#[derive(Default)]
pub struct CorrelationTable {
    entries: Mutex<HashMap<CorrelationId, Continuation>>,
}

impl CorrelationTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a continuation for `id`.
    ///
    /// Returns the continuation previously registered under the same id.
    /// Ids are generated fresh per call, so that only happens on misuse.
    pub fn register(&self, id: CorrelationId, continuation: Continuation) -> Option<Continuation> {
        self.entries.lock().insert(id, continuation)
    }

    /// Registers a continuation that is unregistered when the returned
    /// guard is dropped.
    pub fn register_scoped(self: &Arc<Self>, id: CorrelationId, continuation: Continuation) -> Registration {
        self.register(id.clone(), continuation);
        Registration {
            table: Arc::clone(self),
            id,
        }
    }

    /// Removes the entry for `id`. Returns `true` if it existed.
    ///
    /// Unregistering an absent id is a no-op.
    pub fn unregister(&self, id: &CorrelationId) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    /// Routes one response frame to its continuation.
    pub fn dispatch(&self, response: Response) -> Routed {
        let Response {
            id,
            payload,
            terminal,
        } = response;

        let (continuation, routed) = {
            let mut entries = self.entries.lock();
            if terminal {
                match entries.remove(&id) {
                    Some(continuation) => (continuation, Routed::Completed),
                    None => return Routed::Orphan,
                }
            } else {
                match entries.get(&id) {
                    Some(continuation) => (Arc::clone(continuation), Routed::Delivered),
                    None => return Routed::Orphan,
                }
            }
        };

        continuation(payload, terminal);
        routed
    }

    /// Returns `true` if a continuation is registered for `id`.
    #[must_use]
    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Number of in-flight calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no calls are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes every entry and returns how many were dropped.
    ///
    /// Dropping a continuation drops whatever channel it feeds, which is how
    /// waiting callers observe teardown.
    pub fn clear(&self) -> usize {
        let drained: Vec<Continuation> = self.entries.lock().drain().map(|(_, c)| c).collect();
        drained.len()
    }
}

/// Keeps a correlation id registered for as long as it lives.
///
/// Dropping the guard unregisters the id whether or not a terminal frame
/// was seen, which covers completion, timeout, and cancellation alike.
#[derive(Debug)]
pub struct Registration {
    table: Arc<CorrelationTable>,
    id: CorrelationId,
}

impl Registration {
    /// The guarded correlation id.
    #[must_use]
    pub const fn id(&self) -> &CorrelationId {
        &self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.table.unregister(&self.id);
    }
}

impl std::fmt::Debug for CorrelationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorrelationTable")
            .field("pending", &self.len())
            .finish()
    }
}
