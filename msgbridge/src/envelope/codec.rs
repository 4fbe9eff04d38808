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

//! JSON encoding of envelopes.

use super::Envelope;
use std::fmt;

/// A frame that could not be encoded or decoded.
///
/// Inbound decode failures are never surfaced to callers: the channel may
/// carry foreign traffic, so the dispatcher logs and drops such frames.
#[derive(Debug)]
pub struct FrameError {
    message: String,
    source: Option<serde_json::Error>,
}

impl FrameError {
    /// Creates a frame error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a frame error with a message and the underlying JSON error.
    pub fn with_source(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns the error message without its cause.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed frame: {}", self.message)?;
        if let Some(source) = &self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Compact JSON codec for [`Envelope`]s.
///
/// # Examples
///
/// ```rust
/// use msgbridge::envelope::{Envelope, JsonCodec};
///
/// let codec = JsonCodec::new();
/// let frame = codec.encode(&Envelope::probe(None)).unwrap();
/// assert_eq!(frame, r#"{"kind":"handshake-probe"}"#);
///
/// assert!(codec.decode("not json").is_err());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Creates a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Serializes an envelope to its wire string.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if a payload cannot be represented as JSON.
    pub fn encode(&self, envelope: &Envelope) -> Result<String, FrameError> {
        serde_json::to_string(envelope)
            .map_err(|e| FrameError::with_source(format!("cannot encode {}", envelope.kind()), e))
    }

    /// Parses a wire string into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the frame is not JSON or is not a known
    /// envelope shape.
    pub fn decode(&self, frame: &str) -> Result<Envelope, FrameError> {
        if !frame.trim_start().starts_with('{') {
            return Err(FrameError::new("frame is not a JSON object"));
        }
        serde_json::from_str(frame).map_err(|e| FrameError::with_source("unrecognized envelope", e))
    }
}
