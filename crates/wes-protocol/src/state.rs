//! Remote run states.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Run state as reported by a WES endpoint.
///
/// Strings the endpoint sends that are not part of the WES state set
/// decode as [`RunState::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Accepted by the endpoint, waiting for resources.
    Queued,
    /// Being set up.
    Initializing,
    /// Executing.
    Running,
    /// Paused by the endpoint.
    Paused,
    /// Finished successfully.
    Complete,
    /// The workflow itself failed.
    ExecutorError,
    /// The endpoint failed while running the workflow.
    SystemError,
    /// Cancelled.
    Canceled,
    /// Cancellation in progress.
    Canceling,
    /// State not (yet) known.
    #[serde(other)]
    Unknown,
}

/// How a terminal run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalOutcome {
    Complete,
    Error,
}

impl RunState {
    /// All states, in declaration order.
    pub const ALL: [RunState; 10] = [
        RunState::Unknown,
        RunState::Queued,
        RunState::Initializing,
        RunState::Running,
        RunState::Paused,
        RunState::Complete,
        RunState::ExecutorError,
        RunState::SystemError,
        RunState::Canceled,
        RunState::Canceling,
    ];

    /// Terminal outcome of this state, `None` while the run is still live.
    pub fn outcome(&self) -> Option<TerminalOutcome> {
        match self {
            RunState::Complete => Some(TerminalOutcome::Complete),
            RunState::ExecutorError | RunState::SystemError | RunState::Canceled => {
                Some(TerminalOutcome::Error)
            }
            RunState::Unknown
            | RunState::Queued
            | RunState::Initializing
            | RunState::Running
            | RunState::Paused
            | RunState::Canceling => None,
        }
    }

    /// Check if no further state changes will be reported.
    pub fn is_terminal(&self) -> bool {
        self.outcome().is_some()
    }

    /// Wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Unknown => "UNKNOWN",
            RunState::Queued => "QUEUED",
            RunState::Initializing => "INITIALIZING",
            RunState::Running => "RUNNING",
            RunState::Paused => "PAUSED",
            RunState::Complete => "COMPLETE",
            RunState::ExecutorError => "EXECUTOR_ERROR",
            RunState::SystemError => "SYSTEM_ERROR",
            RunState::Canceled => "CANCELED",
            RunState::Canceling => "CANCELING",
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Unknown
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RunState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .unwrap_or(RunState::Unknown))
    }
}
