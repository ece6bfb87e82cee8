//! Remote Execution Client
//!
//! Abstracts the WES endpoint for testability. Provides:
//! - `ExecutionClient` trait: start a run, query its state
//! - `WesClient`: HTTP client for GA4GH WES endpoints
//! - `EndpointClients`: one client per configured endpoint
//!
//! Every call is bounded by [`with_timeout`]; connectivity failures and
//! timeouts are transient and never corrupt queue state.

mod set;
mod wes;

pub use set::EndpointClients;
pub use wes::WesClient;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use wes_protocol::{RunRequest, RunState};

/// Operations the orchestrator needs from an execution endpoint
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Start a workflow run, returning the endpoint's run id
    async fn start_run(&self, request: &RunRequest) -> Result<String, ClientError>;

    /// Current state of a run
    async fn run_status(&self, run_id: &str) -> Result<RunState, ClientError>;
}

/// Remote client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("{operation} timed out after {}s", after.as_secs())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Failed to read attachment {path}: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Connectivity failures and timeouts: retry on the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Unreachable(_) | ClientError::Timeout { .. })
    }
}

/// Bound a remote call so one unresponsive endpoint cannot stall the system
pub async fn with_timeout<T, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout {
            operation,
            after: limit,
        }),
    }
}
