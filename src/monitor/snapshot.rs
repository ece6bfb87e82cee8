//! Structured status snapshots handed to presentation layers.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use wes_protocol::RunState;

use crate::queue::SubmissionId;
use crate::state::{format_elapsed, Submission, SubmissionStatus, TerminalState};

/// What one poll learned about a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Not dispatched yet
    Queued,
    /// Remote state, freshly observed or stored for terminal submissions
    Remote(RunState),
    /// Endpoint could not be reached this pass
    Unreachable,
    /// Endpoint answered with an error this pass
    PollError,
}

impl PollState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollState::Queued => "QUEUED",
            PollState::Remote(state) => state.as_str(),
            PollState::Unreachable => "UNREACHABLE",
            PollState::PollError => "POLL_ERROR",
        }
    }

    /// Poll failed; persisted state was left untouched
    pub fn is_failure(&self) -> bool {
        matches!(self, PollState::Unreachable | PollState::PollError)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PollState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One row of a status report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub endpoint: String,
    pub id: SubmissionId,
    pub workflow_name: Option<String>,
    pub run_id: Option<String>,
    pub sample: String,
    /// Persisted submission status after this poll
    pub status: SubmissionStatus,
    /// Run state reported for this poll
    pub state: PollState,
    pub start_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_elapsed")]
    pub elapsed_time: Option<Duration>,
    /// Error text for failed polls
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn serialize_elapsed<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(elapsed) => serializer.serialize_str(&format_elapsed(*elapsed)),
        None => serializer.serialize_none(),
    }
}

impl StatusSnapshot {
    /// Snapshot of a submission as stored, reporting `state`
    pub fn from_submission(
        endpoint: &str,
        id: &SubmissionId,
        submission: &Submission,
        state: PollState,
    ) -> Self {
        let run = submission.run();
        Self {
            endpoint: endpoint.to_string(),
            id: id.clone(),
            workflow_name: submission.workflow.name.clone(),
            run_id: run.map(|r| r.run_id.clone()),
            sample: submission.sample.clone(),
            status: submission.status(),
            state,
            start_time: run.map(|r| r.start_time),
            elapsed_time: run.map(|r| r.elapsed_time),
            detail: None,
        }
    }

    /// Snapshot using the stored run state (or QUEUED before dispatch)
    pub fn stored(endpoint: &str, id: &SubmissionId, submission: &Submission) -> Self {
        let state = match submission.run() {
            Some(run) => PollState::Remote(run.state),
            None => PollState::Queued,
        };
        Self::from_submission(endpoint, id, submission, state)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Everything one `poll_all` pass produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub snapshots: Vec<StatusSnapshot>,
}

impl StatusReport {
    pub fn new(snapshots: Vec<StatusSnapshot>) -> Self {
        Self { snapshots }
    }

    /// Every submission is COMPLETE or ERROR (an empty report counts)
    pub fn all_terminal(&self) -> bool {
        self.snapshots.iter().all(StatusSnapshot::is_terminal)
    }

    /// Snapshots for one endpoint
    pub fn for_endpoint<'a>(&'a self, endpoint: &'a str) -> impl Iterator<Item = &'a StatusSnapshot> {
        self.snapshots.iter().filter(move |s| s.endpoint == endpoint)
    }

    pub fn get(&self, endpoint: &str, id: &SubmissionId) -> Option<&StatusSnapshot> {
        self.snapshots
            .iter()
            .find(|s| s.endpoint == endpoint && &s.id == id)
    }

    /// Number of polls that failed this pass
    pub fn failures(&self) -> usize {
        self.snapshots.iter().filter(|s| s.state.is_failure()).count()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Receives each report produced by the monitor loop
pub trait SnapshotSink {
    fn accept(&mut self, report: &StatusReport);
}

impl<F> SnapshotSink for F
where
    F: FnMut(&StatusReport),
{
    fn accept(&mut self, report: &StatusReport) {
        self(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ParamDoc, RunRecord, WorkflowRef};

    fn submission() -> Submission {
        Submission::new(
            WorkflowRef {
                url: "https://example.org/md5sum.cwl".to_string(),
                workflow_type: "CWL".to_string(),
                type_version: None,
                name: Some("md5sum".to_string()),
            },
            ParamDoc::Url("params.json".to_string()),
            Vec::new(),
            None,
        )
    }

    #[test]
    fn test_stored_snapshot_of_queued_submission() {
        let id = SubmissionId::new("20261019120000000001");
        let snapshot = StatusSnapshot::stored("local", &id, &submission());
        assert_eq!(snapshot.state, PollState::Queued);
        assert_eq!(snapshot.run_id, None);
        assert_eq!(snapshot.elapsed_time, None);
        assert_eq!(snapshot.sample, "NA");
        assert!(!snapshot.is_terminal());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let mut sub = submission();
        let start = Utc::now();
        sub.mark_submitted(RunRecord::started("run-1", start)).unwrap();
        let id = SubmissionId::new("20261019120000000001");
        let snapshot = StatusSnapshot::from_submission("local", &id, &sub, PollState::Unreachable)
            .with_detail("connection refused");

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["state"], "UNREACHABLE");
        assert_eq!(json["status"], "SUBMITTED");
        assert_eq!(json["run_id"], "run-1");
        assert_eq!(json["elapsed_time"], "0h:0m:0s");
        assert_eq!(json["detail"], "connection refused");
    }

    #[test]
    fn test_empty_report_is_terminal() {
        assert!(StatusReport::default().all_terminal());
    }

    #[test]
    fn test_report_counts_failures() {
        let id = SubmissionId::new("1");
        let report = StatusReport::new(vec![
            StatusSnapshot::from_submission("a", &id, &submission(), PollState::Unreachable),
            StatusSnapshot::from_submission("b", &id, &submission(), PollState::Queued),
        ]);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.for_endpoint("b").count(), 1);
        assert!(report.get("a", &id).is_some());
        assert!(!report.all_terminal());
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = 0;
        let mut sink = |report: &StatusReport| seen += report.len();
        sink.accept(&StatusReport::default());
        assert_eq!(seen, 0);
    }
}
