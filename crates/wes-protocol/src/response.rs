//! Response payloads.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::state::RunState;

/// Response to `POST /runs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunId {
    pub run_id: String,
}

impl RunId {
    /// Decode a `POST /runs` body; an empty id is rejected.
    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        let parsed: RunId = serde_json::from_str(body)?;
        if parsed.run_id.trim().is_empty() {
            return Err(DecodeError::MissingField("run_id"));
        }
        Ok(parsed)
    }
}

/// Response to `GET /runs/{run_id}/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: String,
    #[serde(default)]
    pub state: RunState,
}

impl RunStatus {
    /// Decode a `GET /runs/{run_id}/status` body.
    pub fn decode(body: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(body)?)
    }
}
