//! Submission data model and lifecycle state machine
//!
//! Submission statuses: RECEIVED → SUBMITTED → {COMPLETE | ERROR}
//!
//! A submission carries a run record exactly when it has left RECEIVED,
//! which the [`Lifecycle`] sum type makes unrepresentable otherwise.

mod codec;
mod submission;

pub use codec::{format_elapsed, format_elapsed_secs, parse_elapsed, parse_start_time};
pub use submission::{
    Lifecycle, Observation, ParamDoc, RunRecord, StateError, Submission, SubmissionData,
    SubmissionStatus, WorkflowRef, DEFAULT_SAMPLE, DEFAULT_TYPE_VERSION,
};

use chrono::{DateTime, Utc};

/// Current UTC timestamp
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Check if a state is terminal (no further transitions possible)
pub trait TerminalState {
    fn is_terminal(&self) -> bool;
}

impl TerminalState for wes_protocol::RunState {
    fn is_terminal(&self) -> bool {
        wes_protocol::RunState::is_terminal(self)
    }
}
