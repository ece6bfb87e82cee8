//! Legacy Queue Document Tests
//!
//! Queue files written by earlier tooling use `ctime` start times,
//! `"<h>h:<m>m:<s>s"` elapsed times and 18-digit ids. They must load,
//! poll and accept new submissions without rewriting history.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, Timelike};
use tempfile::TempDir;
use wes_orchestrator::dispatch::DispatchOutcome;
use wes_orchestrator::mock::MockEndpoint;
use wes_orchestrator::{
    EndpointClients, Orchestrator, OrchestratorConfig, OrchestratorError, ParamDoc, PollState,
    QueueStore, SubmissionId, SubmissionStatus, WorkflowConfig,
};
use wes_protocol::RunState;

const LEGACY_DOCUMENT: &str = r#"{
  "local": {
    "202003101200001234": {
      "status": "COMPLETE",
      "data": {
        "wf": "https://example.org/md5sum.cwl",
        "jsonyaml": "file:///data/md5sum.json",
        "attachments": ["file:///data/md5sum.input"]
      },
      "wf_id": "md5sum",
      "type": "CWL",
      "sample": "NA12878",
      "run": {
        "run_id": "legacy-run-1",
        "start_time": "Tue Mar 10 12:00:00 2020",
        "state": "COMPLETE",
        "elapsed_time": "0h:1m:5s"
      }
    },
    "202003101300005678": {
      "status": "RECEIVED",
      "data": {
        "wf": "https://example.org/md5sum.cwl",
        "jsonyaml": {"input_file": {"class": "File", "path": "md5sum.input"}}
      },
      "type": "CWL"
    }
  }
}"#;

fn config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config
        .add_workflow(WorkflowConfig::new("md5sum", "https://example.org/md5sum.cwl", "CWL"))
        .unwrap();
    config
}

fn setup(temp: &TempDir, document: &str, mock: &MockEndpoint) -> (Orchestrator, Arc<QueueStore>) {
    let path = temp.path().join("submission_queue.json");
    std::fs::write(&path, document).unwrap();
    let store = Arc::new(QueueStore::open(path));
    let clients = EndpointClients::new().with("local", Arc::new(mock.clone()));
    let orchestrator = Orchestrator::with_parts(config(), store.clone(), clients);
    (orchestrator, store)
}

#[test]
fn test_legacy_fields_load() {
    let temp = TempDir::new().unwrap();
    let (_orchestrator, store) = setup(&temp, LEGACY_DOCUMENT, &MockEndpoint::new());

    let done = store
        .get("local", &SubmissionId::new("202003101200001234"))
        .unwrap();
    assert_eq!(done.status(), SubmissionStatus::Complete);
    assert_eq!(done.workflow.name.as_deref(), Some("md5sum"));
    assert_eq!(done.workflow.type_version, None);
    assert_eq!(done.sample, "NA12878");
    assert_eq!(done.params, ParamDoc::Url("file:///data/md5sum.json".to_string()));

    let run = done.run().unwrap();
    assert_eq!(run.run_id, "legacy-run-1");
    assert_eq!(run.state, RunState::Complete);
    assert_eq!(run.elapsed_time, Duration::from_secs(65));
    let local = run.start_time.with_timezone(&Local);
    assert_eq!((local.year(), local.month(), local.day()), (2020, 3, 10));
    assert_eq!(local.hour(), 12);

    let queued = store
        .get("local", &SubmissionId::new("202003101300005678"))
        .unwrap();
    assert_eq!(queued.status(), SubmissionStatus::Received);
    assert_eq!(queued.sample, "NA");
    assert!(queued.attachments.is_empty());
    assert!(queued.run().is_none());
}

#[tokio::test]
async fn test_legacy_terminal_submission_not_polled() {
    let temp = TempDir::new().unwrap();
    let mock = MockEndpoint::new();
    let (orchestrator, _store) = setup(&temp, LEGACY_DOCUMENT, &mock);

    let report = orchestrator.monitor.poll_all().await.unwrap();
    assert_eq!(report.len(), 2);

    let done = report
        .get("local", &SubmissionId::new("202003101200001234"))
        .unwrap();
    assert_eq!(done.state, PollState::Remote(RunState::Complete));
    assert_eq!(done.elapsed_time, Some(Duration::from_secs(65)));

    let queued = report
        .get("local", &SubmissionId::new("202003101300005678"))
        .unwrap();
    assert_eq!(queued.state, PollState::Queued);
    assert_eq!(mock.status_calls(), 0);
}

#[tokio::test]
async fn test_new_ids_follow_legacy_ids() {
    let temp = TempDir::new().unwrap();
    let mock = MockEndpoint::new();
    let (orchestrator, store) = setup(&temp, LEGACY_DOCUMENT, &mock);

    let new_id = orchestrator
        .manager
        .queue("local", "md5sum", ParamDoc::from_arg("file:///data/second.json"), None, None)
        .unwrap();
    assert_eq!(new_id.as_str().len(), 20);
    assert!(new_id > SubmissionId::new("202003101300005678"));

    let received = store.list_by_status("local", SubmissionStatus::Received).unwrap();
    assert_eq!(
        received,
        vec![SubmissionId::new("202003101300005678"), new_id.clone()]
    );

    // the legacy submission is still first in line
    match orchestrator.dispatcher.run_next_queued("local").await.unwrap() {
        DispatchOutcome::Dispatched { id, .. } => {
            assert_eq!(id, SubmissionId::new("202003101300005678"))
        }
        DispatchOutcome::NothingQueued => panic!("legacy submission should dispatch"),
    }
    assert_eq!(mock.started_runs().len(), 1);
}

#[tokio::test]
async fn test_received_with_run_is_corrupt() {
    let document = r#"{
      "local": {
        "202003101300005678": {
          "status": "RECEIVED",
          "data": {"wf": "https://example.org/md5sum.cwl", "jsonyaml": "file:///p.json"},
          "type": "CWL",
          "run": {"run_id": "r", "start_time": "2026-10-19T12:00:00+00:00"}
        }
      }
    }"#;
    let temp = TempDir::new().unwrap();
    let (orchestrator, _store) = setup(&temp, document, &MockEndpoint::new());

    let result = orchestrator.monitor.poll_all().await;
    assert!(matches!(result, Err(OrchestratorError::StoreCorruption { .. })));
}

#[tokio::test]
async fn test_submitted_without_run_is_corrupt() {
    let document = r#"{
      "local": {
        "202003101300005678": {
          "status": "SUBMITTED",
          "data": {"wf": "https://example.org/md5sum.cwl", "jsonyaml": "file:///p.json"},
          "type": "CWL"
        }
      }
    }"#;
    let temp = TempDir::new().unwrap();
    let (orchestrator, _store) = setup(&temp, document, &MockEndpoint::new());

    let result = orchestrator.monitor.poll_all().await;
    assert!(matches!(result, Err(OrchestratorError::StoreCorruption { .. })));
}

#[tokio::test]
async fn test_unparseable_document_is_corrupt() {
    let temp = TempDir::new().unwrap();
    let (orchestrator, _store) = setup(&temp, "{ not json", &MockEndpoint::new());

    let result = orchestrator.monitor.poll_all().await;
    assert!(matches!(result, Err(OrchestratorError::StoreCorruption { .. })));

    let queued = orchestrator
        .manager
        .queue("local", "md5sum", ParamDoc::from_arg("file:///p.json"), None, None);
    assert!(matches!(queued, Err(OrchestratorError::StoreCorruption { .. })));
}
