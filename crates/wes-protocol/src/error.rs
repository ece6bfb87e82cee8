//! Error payloads returned by WES endpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of a non-2xx WES response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    #[serde(default)]
    pub msg: String,
    /// HTTP status code echoed by the endpoint.
    #[serde(default)]
    pub status_code: u16,
}

impl ErrorResponse {
    /// Parse an error body, falling back to the raw text as the message.
    pub fn from_body(status_code: u16, body: &str) -> Self {
        serde_json::from_str::<ErrorResponse>(body)
            .map(|mut parsed| {
                if parsed.status_code == 0 {
                    parsed.status_code = status_code;
                }
                parsed
            })
            .unwrap_or_else(|_| Self {
                msg: body.trim().to_string(),
                status_code,
            })
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status_code, self.msg)
    }
}

/// Errors decoding WES payloads.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Response missing field '{0}'")]
    MissingField(&'static str),
}
