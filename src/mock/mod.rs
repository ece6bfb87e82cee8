//! Mock Endpoint Implementation
//!
//! An in-process execution endpoint for tests and for `proto = "mock"`
//! endpoints. Runs advance through a scripted sequence of remote states,
//! one step per status query, and failures can be injected per operation.
//!
//! # Operations
//!
//! - `start_run`: accept a request, assign a ULID run id
//! - `run_status`: report the run's next scripted state

mod endpoint;
mod failure;
mod state;

pub use endpoint::MockEndpoint;
pub use failure::{FailureConfig, FailureInjector, FailureKind, MockOperation};
pub use state::{MockRun, MockState};
