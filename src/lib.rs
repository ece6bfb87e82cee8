//! WES orchestrator - queue, dispatch and monitor workflow runs
//!
//! This crate queues workflow-execution requests for remote GA4GH WES
//! endpoints, dispatches them one at a time per endpoint, and reconciles
//! their remote status against a persisted queue document until every
//! submission is COMPLETE or ERROR.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mock;
pub mod monitor;
pub mod orchestrator;
pub mod queue;
pub mod signal;
pub mod state;
pub mod submit;
pub mod timeout;

pub use client::{ClientError, EndpointClients, ExecutionClient, WesClient};
pub use config::{EndpointConfig, OrchestratorConfig, Proto, WorkflowConfig, WorkflowRegistry};
pub use dispatch::{DispatchOutcome, Dispatcher, RunAllReport};
pub use error::OrchestratorError;
pub use monitor::{MonitorExit, PollState, SnapshotSink, StatusMonitor, StatusReport, StatusSnapshot};
pub use orchestrator::Orchestrator;
pub use queue::{QueueStore, StoreError, SubmissionId};
pub use state::{ParamDoc, RunRecord, Submission, SubmissionStatus};
pub use submit::SubmissionManager;
pub use timeout::TimeoutConfig;
