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

use crate::envelope::CorrelationId;
use crate::error::BridgeError;
use tokio::task::JoinHandle;

/// Handle to a single-shot auto-responder installed by
/// [`Endpoint::react_to`](super::Endpoint::react_to).
///
/// Dropping the handle leaves the reaction installed.
#[derive(Debug)]
pub struct Reaction {
    action: String,
    task: JoinHandle<Result<CorrelationId, BridgeError>>,
}

impl Reaction {
    pub(crate) fn new(action: String, task: JoinHandle<Result<CorrelationId, BridgeError>>) -> Self {
        Self { action, task }
    }

    /// The action this reaction answers.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Removes the reaction if it has not answered yet.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Returns `true` once the reaction answered, failed, or was cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the reaction to answer.
    ///
    /// Returns the id of the request that was answered.
    ///
    /// # Errors
    ///
    /// Fails with [`BridgeError::Shutdown`] if the reaction was cancelled or
    /// the bridge shut down first, or with the delivery error if the answer
    /// could not be sent.
    pub async fn answered(self) -> Result<CorrelationId, BridgeError> {
        self.task.await.unwrap_or(Err(BridgeError::Shutdown))
    }
}
