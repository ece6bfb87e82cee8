//! Concurrent Dispatch and Monitoring Tests
//!
//! `run_all` keeps one run in flight per endpoint while endpoints proceed
//! independently; the monitor loop stops on quiescence or cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wes_orchestrator::mock::{FailureConfig, MockEndpoint, MockOperation};
use wes_orchestrator::{
    Dispatcher, EndpointClients, MonitorExit, OrchestratorError, ParamDoc, QueueStore,
    StatusMonitor, StatusReport, Submission, SubmissionStatus, TimeoutConfig,
};
use wes_orchestrator::state::WorkflowRef;
use wes_protocol::RunState;

fn submission(sample: &str) -> Submission {
    Submission::new(
        WorkflowRef {
            url: "https://example.org/md5sum.cwl".to_string(),
            workflow_type: "CWL".to_string(),
            type_version: Some("v1.0".to_string()),
            name: Some("md5sum".to_string()),
        },
        ParamDoc::Url("file:///params.json".to_string()),
        Vec::new(),
        Some(sample.to_string()),
    )
}

fn clients(endpoints: &[(&str, &MockEndpoint)]) -> EndpointClients {
    endpoints.iter().fold(EndpointClients::new(), |clients, (id, mock)| {
        clients.with(*id, Arc::new((*mock).clone()))
    })
}

#[tokio::test]
async fn test_run_all_drains_each_endpoint_in_order() {
    let alpha = MockEndpoint::new();
    let beta = MockEndpoint::with_progression(vec![RunState::Running, RunState::ExecutorError]);
    let store = Arc::new(QueueStore::in_memory());

    let alpha_ids: Vec<_> = (0..3)
        .map(|i| store.create("alpha", submission(&format!("a{}", i))).unwrap())
        .collect();
    let beta_ids: Vec<_> = (0..2)
        .map(|i| store.create("beta", submission(&format!("b{}", i))).unwrap())
        .collect();

    let dispatcher = Dispatcher::new(
        store.clone(),
        clients(&[("alpha", &alpha), ("beta", &beta)]),
        &TimeoutConfig::default(),
    )
    .with_poll_interval(Duration::from_millis(5));

    let report = dispatcher.run_all(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.dispatched(), 5);

    let alpha_report = report.get("alpha").unwrap();
    assert!(alpha_report.is_drained());
    assert_eq!(
        alpha_report.dispatched.iter().map(|d| d.id.clone()).collect::<Vec<_>>(),
        alpha_ids
    );
    assert!(alpha_report
        .dispatched
        .iter()
        .all(|d| d.status == SubmissionStatus::Complete));

    let beta_report = report.get("beta").unwrap();
    assert_eq!(
        beta_report.dispatched.iter().map(|d| d.id.clone()).collect::<Vec<_>>(),
        beta_ids
    );
    assert!(beta_report
        .dispatched
        .iter()
        .all(|d| d.status == SubmissionStatus::Error));

    // Runs were started in queue order
    let started: Vec<_> = alpha_ids
        .iter()
        .map(|id| store.get("alpha", id).unwrap().run().unwrap().run_id.clone())
        .collect();
    assert_eq!(alpha.started_runs(), started);
    assert!(store.load().unwrap().all_terminal());
}

#[tokio::test]
async fn test_one_in_flight_per_endpoint() {
    let mock = MockEndpoint::with_progression(vec![RunState::Running]);
    let store = Arc::new(QueueStore::in_memory());
    store.create("local", submission("s1")).unwrap();
    store.create("local", submission("s2")).unwrap();

    let dispatcher = Dispatcher::new(
        store.clone(),
        clients(&[("local", &mock)]),
        &TimeoutConfig::default(),
    )
    .with_poll_interval(Duration::from_millis(5));

    let cancel = CancellationToken::new();
    let task = {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run_all(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    // First run never finishes, so the second must not have been started
    assert_eq!(mock.started_runs().len(), 1);
    assert_eq!(
        store.list_by_status("local", SubmissionStatus::Received).unwrap().len(),
        1
    );

    mock.set_state(&mock.started_runs()[0], RunState::Complete);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.started_runs().len(), 2);

    cancel.cancel();
    let report = task.await.unwrap().unwrap();
    assert!(report.get("local").unwrap().cancelled);
}

#[tokio::test]
async fn test_waits_for_run_started_before_run_all() {
    let mock = MockEndpoint::with_progression(vec![RunState::Running]);
    let store = Arc::new(QueueStore::in_memory());
    let first = store.create("local", submission("s1")).unwrap();
    let second = store.create("local", submission("s2")).unwrap();

    let dispatcher = Dispatcher::new(
        store.clone(),
        clients(&[("local", &mock)]),
        &TimeoutConfig::default(),
    )
    .with_poll_interval(Duration::from_millis(5));

    // Dispatched outside run_all, e.g. by `run-next`
    dispatcher.run_next_queued("local").await.unwrap();
    assert_eq!(store.get("local", &first).unwrap().status(), SubmissionStatus::Submitted);

    let cancel = CancellationToken::new();
    let task = {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run_all(&cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mock.started_runs().len(), 1);
    assert_eq!(
        store.list_by_status("local", SubmissionStatus::Submitted).unwrap(),
        vec![first.clone()]
    );
    assert_eq!(store.get("local", &second).unwrap().status(), SubmissionStatus::Received);

    mock.set_default_progression(vec![RunState::Complete]);
    mock.set_state(&mock.started_runs()[0], RunState::Complete);

    let report = task.await.unwrap().unwrap();
    assert_eq!(mock.started_runs().len(), 2);
    let entry = report.get("local").unwrap();
    assert!(entry.is_drained());
    assert_eq!(entry.dispatched.len(), 1);
    assert_eq!(entry.dispatched[0].id, second);
    assert!(store.load().unwrap().all_terminal());
}

#[tokio::test]
async fn test_cancel_while_waiting_on_earlier_run() {
    let mock = MockEndpoint::with_progression(vec![RunState::Running]);
    let store = Arc::new(QueueStore::in_memory());
    store.create("local", submission("s1")).unwrap();
    store.create("local", submission("s2")).unwrap();

    let dispatcher = Dispatcher::new(
        store.clone(),
        clients(&[("local", &mock)]),
        &TimeoutConfig::default(),
    )
    .with_poll_interval(Duration::from_millis(5));
    dispatcher.run_next_queued("local").await.unwrap();

    let cancel = CancellationToken::new();
    let task = {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run_all(&cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let report = task.await.unwrap().unwrap();
    let entry = report.get("local").unwrap();
    assert!(entry.cancelled);
    assert!(entry.dispatched.is_empty());
    assert_eq!(mock.started_runs().len(), 1);
    assert_eq!(
        store.list_by_status("local", SubmissionStatus::Received).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_failing_endpoint_does_not_stop_others() {
    let healthy = MockEndpoint::new();
    let broken = MockEndpoint::new();
    broken.inject_failure(MockOperation::StartRun, FailureConfig::unreachable("refused"));

    let store = Arc::new(QueueStore::in_memory());
    store.create("healthy", submission("h")).unwrap();
    let stuck = store.create("broken", submission("b")).unwrap();

    let dispatcher = Dispatcher::new(
        store.clone(),
        clients(&[("healthy", &healthy), ("broken", &broken)]),
        &TimeoutConfig::default(),
    )
    .with_poll_interval(Duration::from_millis(5));

    let report = dispatcher.run_all(&CancellationToken::new()).await.unwrap();
    assert!(report.get("healthy").unwrap().is_drained());
    assert_eq!(report.get("healthy").unwrap().dispatched.len(), 1);

    let broken_report = report.get("broken").unwrap();
    assert!(matches!(&broken_report.error, Some(e) if e.is_transient()));
    assert_eq!(report.failed().count(), 1);
    assert_eq!(store.get("broken", &stuck).unwrap().status(), SubmissionStatus::Received);
}

#[tokio::test]
async fn test_monitor_loop_until_quiescent() {
    let mock = MockEndpoint::new();
    let store = Arc::new(QueueStore::in_memory());
    store.create("local", submission("s1")).unwrap();
    store.create("local", submission("s2")).unwrap();

    let dispatcher = Dispatcher::new(
        store.clone(),
        clients(&[("local", &mock)]),
        &TimeoutConfig::default(),
    )
    .with_poll_interval(Duration::from_millis(5));
    let monitor = StatusMonitor::new(store.clone(), clients(&[("local", &mock)]), &TimeoutConfig::default());

    let dispatch = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.run_all(&CancellationToken::new()).await })
    };

    let mut passes = 0usize;
    let mut sink = |_: &StatusReport| passes += 1;
    let exit = monitor
        .monitor_loop(Duration::from_millis(5), &mut sink, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(exit, MonitorExit::Quiescent);
    assert!(passes >= 1);
    assert!(store.load().unwrap().all_terminal());
    dispatch.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_monitor_loop_stops_on_cancel_despite_failures() {
    let mock = MockEndpoint::with_progression(vec![RunState::Running]);
    mock.inject_failure(MockOperation::RunStatus, FailureConfig::unreachable("down"));
    let store = Arc::new(QueueStore::in_memory());
    store.create("local", submission("s1")).unwrap();

    let dispatcher = Dispatcher::new(
        store.clone(),
        clients(&[("local", &mock)]),
        &TimeoutConfig::default(),
    );
    dispatcher.run_next_queued("local").await.unwrap();

    let monitor = StatusMonitor::new(store.clone(), clients(&[("local", &mock)]), &TimeoutConfig::default());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        trigger.cancel();
    });

    let mut unreachable = 0usize;
    let mut sink = |report: &StatusReport| unreachable += report.failures();
    let exit = monitor
        .monitor_loop(Duration::from_millis(5), &mut sink, &cancel)
        .await
        .unwrap();

    assert_eq!(exit, MonitorExit::Cancelled);
    assert!(unreachable >= 1);
    assert_eq!(
        store.list_by_status("local", SubmissionStatus::Submitted).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_corrupt_store_aborts_run_all() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("submission_queue.json");
    std::fs::write(&path, "{ not json").unwrap();

    let mock = MockEndpoint::new();
    let dispatcher = Dispatcher::new(
        Arc::new(QueueStore::open(&path)),
        clients(&[("local", &mock)]),
        &TimeoutConfig::default(),
    );

    let result = dispatcher.run_all(&CancellationToken::new()).await;
    assert!(matches!(result, Err(OrchestratorError::StoreCorruption { .. })));
    assert!(mock.started_runs().is_empty());
}
