//! Submission record and its state machine
//!
//! Statuses: RECEIVED → SUBMITTED → {COMPLETE | ERROR}

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wes_protocol::{RunState, TerminalOutcome};

use super::codec;
use super::TerminalState;

/// Sample label used when the caller does not supply one
pub const DEFAULT_SAMPLE: &str = "NA";

/// Workflow language version assumed when a submission does not record one
pub const DEFAULT_TYPE_VERSION: &str = "v1.0";

/// Submission status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Queued locally, not yet sent to the endpoint
    Received,
    /// Started on the endpoint
    Submitted,
    /// Remote run finished successfully
    Complete,
    /// Remote run failed or was cancelled
    Error,
}

impl TerminalState for SubmissionStatus {
    fn is_terminal(&self) -> bool {
        matches!(self, SubmissionStatus::Complete | SubmissionStatus::Error)
    }
}

impl SubmissionStatus {
    /// Check if transition from this status to target is valid
    pub fn can_transition_to(&self, target: SubmissionStatus) -> bool {
        matches!(
            (self, target),
            (SubmissionStatus::Received, SubmissionStatus::Submitted)
                | (SubmissionStatus::Submitted, SubmissionStatus::Complete)
                | (SubmissionStatus::Submitted, SubmissionStatus::Error)
        )
    }

    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Received => "RECEIVED",
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::Complete => "COMPLETE",
            SubmissionStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TerminalOutcome> for SubmissionStatus {
    fn from(outcome: TerminalOutcome) -> Self {
        match outcome {
            TerminalOutcome::Complete => SubmissionStatus::Complete,
            TerminalOutcome::Error => SubmissionStatus::Error,
        }
    }
}

/// Remote-side execution record, present once a submission is dispatched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier assigned by the endpoint
    pub run_id: String,

    /// When the run was started
    #[serde(with = "codec::start_time")]
    pub start_time: DateTime<Utc>,

    /// Last observed remote state
    #[serde(default)]
    pub state: RunState,

    /// Time spent running, frozen once the run is terminal
    #[serde(with = "codec::elapsed", default)]
    pub elapsed_time: Duration,
}

impl RunRecord {
    /// Create a record for a run that has just been started
    pub fn started(run_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.into(),
            start_time,
            state: RunState::Unknown,
            elapsed_time: Duration::ZERO,
        }
    }

    /// Time since `start_time` at microsecond resolution (what the queue
    /// document keeps), zero if the clock reads earlier
    pub fn elapsed_since_start(&self, now: DateTime<Utc>) -> Duration {
        let elapsed = (now - self.start_time).to_std().unwrap_or(Duration::ZERO);
        Duration::from_micros(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX))
    }
}

/// Lifecycle of a submission; the run record exists iff it left RECEIVED
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Received,
    Submitted(RunRecord),
    Complete(RunRecord),
    Error(RunRecord),
}

impl Lifecycle {
    /// Status corresponding to this lifecycle stage
    pub fn status(&self) -> SubmissionStatus {
        match self {
            Lifecycle::Received => SubmissionStatus::Received,
            Lifecycle::Submitted(_) => SubmissionStatus::Submitted,
            Lifecycle::Complete(_) => SubmissionStatus::Complete,
            Lifecycle::Error(_) => SubmissionStatus::Error,
        }
    }

    /// The run record, if dispatched
    pub fn run(&self) -> Option<&RunRecord> {
        match self {
            Lifecycle::Received => None,
            Lifecycle::Submitted(run) | Lifecycle::Complete(run) | Lifecycle::Error(run) => {
                Some(run)
            }
        }
    }

    fn run_mut(&mut self) -> Option<&mut RunRecord> {
        match self {
            Lifecycle::Received => None,
            Lifecycle::Submitted(run) | Lifecycle::Complete(run) | Lifecycle::Error(run) => {
                Some(run)
            }
        }
    }

    /// Pair a status with an optional run, rejecting mismatches
    pub fn from_parts(
        status: SubmissionStatus,
        run: Option<RunRecord>,
    ) -> Result<Self, StateError> {
        match (status, run) {
            (SubmissionStatus::Received, None) => Ok(Lifecycle::Received),
            (SubmissionStatus::Received, Some(_)) => Err(StateError::SchemaViolation(
                "run record present on a RECEIVED submission".to_string(),
            )),
            (SubmissionStatus::Submitted, Some(run)) => Ok(Lifecycle::Submitted(run)),
            (SubmissionStatus::Complete, Some(run)) => Ok(Lifecycle::Complete(run)),
            (SubmissionStatus::Error, Some(run)) => Ok(Lifecycle::Error(run)),
            (status, None) => Err(StateError::SchemaViolation(format!(
                "{} submission has no run record",
                status
            ))),
        }
    }
}

/// Workflow identity recorded on a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRef {
    /// Descriptor URL
    pub url: String,
    /// Workflow language, e.g. `CWL`
    pub workflow_type: String,
    /// Workflow language version, if recorded
    pub type_version: Option<String>,
    /// Registered workflow name (absent for anonymous workflows)
    pub name: Option<String>,
}

/// Prepared parameter document: a reference or an inline object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamDoc {
    Url(String),
    Inline(serde_json::Map<String, serde_json::Value>),
}

impl ParamDoc {
    /// Interpret caller input: JSON objects stay inline, anything else is a reference
    pub fn from_arg(text: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(serde_json::Value::Object(map)) => ParamDoc::Inline(map),
            _ => ParamDoc::Url(text.to_string()),
        }
    }

    /// Parameter document as a JSON value
    pub fn to_value(&self) -> serde_json::Value {
        match self {
            ParamDoc::Url(url) => serde_json::Value::String(url.clone()),
            ParamDoc::Inline(map) => serde_json::Value::Object(map.clone()),
        }
    }
}

/// The `data` block of a persisted submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionData {
    /// Workflow descriptor URL
    pub wf: String,
    /// Parameter document
    pub jsonyaml: ParamDoc,
    /// Auxiliary file references
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// On-disk shape of a submission
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SubmissionRecord {
    status: SubmissionStatus,
    data: SubmissionData,
    #[serde(default)]
    wf_id: Option<String>,
    #[serde(rename = "type")]
    wf_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    type_version: Option<String>,
    #[serde(default = "default_sample")]
    sample: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    run: Option<RunRecord>,
}

fn default_sample() -> String {
    DEFAULT_SAMPLE.to_string()
}

/// One queued or executing request to run a workflow on an endpoint.
///
/// The submission id and endpoint id are the keys under which the
/// submission is stored, not fields of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SubmissionRecord", into = "SubmissionRecord")]
pub struct Submission {
    /// Workflow to run
    pub workflow: WorkflowRef,
    /// Parameter document
    pub params: ParamDoc,
    /// Auxiliary file references
    pub attachments: Vec<String>,
    /// Caller-supplied tag
    pub sample: String,
    /// Status and run record
    pub lifecycle: Lifecycle,
}

/// What a status observation did to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Run still live; state and elapsed time updated
    Live,
    /// Run reached a terminal state; status advanced
    Finished(SubmissionStatus),
    /// Submission was already terminal; nothing changed
    AlreadyTerminal,
}

/// Errors for submission state operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("Submission is {0}, expected RECEIVED")]
    NotReceived(SubmissionStatus),

    #[error("Submission has not been dispatched")]
    NotDispatched,

    #[error("Run record of a {0} submission is frozen")]
    Frozen(SubmissionStatus),

    #[error("Elapsed time may not decrease ({requested:?} < {current:?})")]
    ElapsedRegression {
        current: Duration,
        requested: Duration,
    },

    #[error("Schema violation: {0}")]
    SchemaViolation(String),
}

impl Submission {
    /// Create a new submission in RECEIVED state
    pub fn new(
        workflow: WorkflowRef,
        params: ParamDoc,
        attachments: Vec<String>,
        sample: Option<String>,
    ) -> Self {
        Self {
            workflow,
            params,
            attachments,
            sample: sample.unwrap_or_else(default_sample),
            lifecycle: Lifecycle::Received,
        }
    }

    /// Current status
    pub fn status(&self) -> SubmissionStatus {
        self.lifecycle.status()
    }

    /// Run record, if dispatched
    pub fn run(&self) -> Option<&RunRecord> {
        self.lifecycle.run()
    }

    /// Check if the submission is COMPLETE or ERROR
    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Attach a run record (RECEIVED → SUBMITTED)
    pub fn mark_submitted(&mut self, run: RunRecord) -> Result<(), StateError> {
        if self.lifecycle != Lifecycle::Received {
            return Err(StateError::NotReceived(self.status()));
        }
        self.lifecycle = Lifecycle::Submitted(run);
        Ok(())
    }

    /// Advance to a terminal status, keeping the run record
    pub fn advance(&mut self, target: SubmissionStatus) -> Result<(), StateError> {
        let from = self.status();
        if !from.can_transition_to(target) {
            return Err(StateError::InvalidTransition { from, to: target });
        }

        let run = match &self.lifecycle {
            Lifecycle::Submitted(run) => run.clone(),
            // RECEIVED → SUBMITTED needs a run record, see mark_submitted
            _ => return Err(StateError::InvalidTransition { from, to: target }),
        };

        self.lifecycle = match target {
            SubmissionStatus::Complete => Lifecycle::Complete(run),
            SubmissionStatus::Error => Lifecycle::Error(run),
            _ => return Err(StateError::InvalidTransition { from, to: target }),
        };
        Ok(())
    }

    /// Apply a remote state reported at `now`.
    ///
    /// Live states refresh the elapsed time (never decreasing it); a
    /// terminal state freezes it and advances the status.
    pub fn observe(&mut self, state: RunState, now: DateTime<Utc>) -> Result<Observation, StateError> {
        let run = match &mut self.lifecycle {
            Lifecycle::Received => return Err(StateError::NotDispatched),
            Lifecycle::Complete(_) | Lifecycle::Error(_) => return Ok(Observation::AlreadyTerminal),
            Lifecycle::Submitted(run) => run,
        };

        run.state = state;
        match state.outcome() {
            None => {
                let elapsed = run.elapsed_since_start(now);
                if elapsed > run.elapsed_time {
                    run.elapsed_time = elapsed;
                }
                Ok(Observation::Live)
            }
            Some(outcome) => {
                let status = SubmissionStatus::from(outcome);
                self.advance(status)?;
                Ok(Observation::Finished(status))
            }
        }
    }

    /// Mutable access to the run record for field updates
    pub fn run_mut(&mut self) -> Result<&mut RunRecord, StateError> {
        self.lifecycle.run_mut().ok_or(StateError::NotDispatched)
    }
}

impl TryFrom<SubmissionRecord> for Submission {
    type Error = StateError;

    fn try_from(record: SubmissionRecord) -> Result<Self, Self::Error> {
        let lifecycle = Lifecycle::from_parts(record.status, record.run)?;
        Ok(Self {
            workflow: WorkflowRef {
                url: record.data.wf,
                workflow_type: record.wf_type,
                type_version: record.type_version,
                name: record.wf_id,
            },
            params: record.data.jsonyaml,
            attachments: record.data.attachments,
            sample: record.sample,
            lifecycle,
        })
    }
}

impl From<Submission> for SubmissionRecord {
    fn from(submission: Submission) -> Self {
        let status = submission.status();
        let run = submission.lifecycle.run().cloned();
        Self {
            status,
            data: SubmissionData {
                wf: submission.workflow.url,
                jsonyaml: submission.params,
                attachments: submission.attachments,
            },
            wf_id: submission.workflow.name,
            wf_type: submission.workflow.workflow_type,
            type_version: submission.workflow.type_version,
            sample: submission.sample,
            run,
        }
    }
}
