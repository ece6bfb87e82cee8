//! WES Protocol Types
//!
//! Wire types for the GA4GH Workflow Execution Service (WES) API spoken
//! between the orchestrator and remote execution endpoints.

pub mod error;
pub mod request;
pub mod response;
pub mod state;

pub use error::{DecodeError, ErrorResponse};
pub use request::RunRequest;
pub use response::{RunId, RunStatus};
pub use state::{RunState, TerminalOutcome};

/// Base path of the WES API on an endpoint.
pub const API_BASE_PATH: &str = "/ga4gh/wes/v1";

/// Supported WES API version.
pub const API_VERSION: &str = "1.0.0";
