//! Orchestrator error taxonomy
//!
//! Module errors ([`StoreError`], [`ClientError`], [`ConfigError`],
//! [`StateError`]) are folded into [`OrchestratorError`] at the component
//! boundary so callers can tell caller mistakes, state-machine violations,
//! transient remote failures and store corruption apart.

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::queue::{StoreError, SubmissionId};
use crate::state::{StateError, SubmissionStatus};

/// Errors surfaced by the submission manager, dispatcher and monitor
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Unknown workflow: '{0}'")]
    UnknownWorkflow(String),

    #[error("Unknown endpoint: '{0}'")]
    UnknownEndpoint(String),

    #[error("Submission {id} is {status}, only RECEIVED submissions can be dispatched")]
    NotReceived {
        id: SubmissionId,
        status: SubmissionStatus,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(#[from] StateError),

    #[error("Submission id {id} already exists on endpoint '{endpoint}'")]
    DuplicateId { endpoint: String, id: SubmissionId },

    #[error("Submission {id} not found on endpoint '{endpoint}'")]
    NotFound { endpoint: String, id: SubmissionId },

    #[error("Remote call failed: {0}")]
    Remote(#[from] ClientError),

    #[error("Queue store {path} is corrupt: {reason}")]
    StoreCorruption { path: String, reason: String },

    #[error("Queue store error: {0}")]
    Store(StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid batch file {path}: {reason}")]
    InvalidBatch { path: String, reason: String },

    #[error("Endpoint task for '{endpoint}' failed: {reason}")]
    TaskFailed { endpoint: String, reason: String },
}

impl OrchestratorError {
    /// Remote connectivity failure or timeout; safe to retry
    pub fn is_transient(&self) -> bool {
        matches!(self, OrchestratorError::Remote(e) if e.is_transient())
    }

    /// Store corruption must abort the caller with no partial results
    pub fn is_fatal(&self) -> bool {
        matches!(self, OrchestratorError::StoreCorruption { .. })
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound { endpoint, id } => OrchestratorError::NotFound { endpoint, id },
            StoreError::DuplicateId { endpoint, id } => OrchestratorError::DuplicateId { endpoint, id },
            StoreError::Corrupt { location, reason } => OrchestratorError::StoreCorruption {
                path: location,
                reason,
            },
            StoreError::State(state) => OrchestratorError::InvalidStateTransition(state),
            other => OrchestratorError::Store(other),
        }
    }
}
