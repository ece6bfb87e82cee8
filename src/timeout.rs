//! Timeout configuration for remote calls
//!
//! - `start_run_seconds`: bound on a single "start run" request
//! - `status_seconds`: bound on a single "get status" request
//! - `poll_interval_seconds`: pause between status polls while waiting for
//!   a dispatched run to finish
//!
//! Timeouts are enforced host-side around each call; an elapsed timeout is
//! reported as a transient failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Maximum time for a start-run request (default: 60)
    pub start_run_seconds: u64,

    /// Maximum time for a status request (default: 30)
    pub status_seconds: u64,

    /// Pause between polls of an in-flight run (default: 4)
    pub poll_interval_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            start_run_seconds: 60,
            status_seconds: 30,
            poll_interval_seconds: 4,
        }
    }
}

impl TimeoutConfig {
    /// Validate timeout bounds
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        // start_run_seconds must be in (0, 600]
        if self.start_run_seconds == 0 || self.start_run_seconds > 600 {
            return Err(TimeoutValidationError::StartRunOutOfBounds {
                value: self.start_run_seconds,
            });
        }

        // status_seconds must be in (0, 600]
        if self.status_seconds == 0 || self.status_seconds > 600 {
            return Err(TimeoutValidationError::StatusOutOfBounds {
                value: self.status_seconds,
            });
        }

        // poll_interval_seconds must be in (0, 3600]
        if self.poll_interval_seconds == 0 || self.poll_interval_seconds > 3600 {
            return Err(TimeoutValidationError::PollIntervalOutOfBounds {
                value: self.poll_interval_seconds,
            });
        }

        Ok(())
    }

    pub fn start_run(&self) -> Duration {
        Duration::from_secs(self.start_run_seconds)
    }

    pub fn status(&self) -> Duration {
        Duration::from_secs(self.status_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Timeout validation errors
#[derive(Debug, thiserror::Error)]
pub enum TimeoutValidationError {
    #[error("start_run_seconds must be in (0, 600], got {value}")]
    StartRunOutOfBounds { value: u64 },

    #[error("status_seconds must be in (0, 600], got {value}")]
    StatusOutOfBounds { value: u64 },

    #[error("poll_interval_seconds must be in (0, 3600], got {value}")]
    PollIntervalOutOfBounds { value: u64 },
}
