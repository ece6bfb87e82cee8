//! Dispatcher
//!
//! Moves RECEIVED submissions onto their endpoint:
//! RECEIVED --(start_run succeeds)--> SUBMITTED
//!
//! The remote call happens outside any store cycle; only the final
//! RECEIVED → SUBMITTED write takes the store lock. A failed start leaves
//! the submission RECEIVED for a later retry.

mod report;

pub use report::{DispatchedRun, EndpointReport, RunAllReport};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use wes_protocol::RunRequest;

use crate::client::{with_timeout, EndpointClients};
use crate::error::OrchestratorError;
use crate::monitor::StatusMonitor;
use crate::queue::{run_blocking, QueueStore, SubmissionId};
use crate::state::{now_utc, RunRecord, Submission, SubmissionStatus, DEFAULT_TYPE_VERSION};
use crate::timeout::TimeoutConfig;

/// Result of asking an endpoint for its next queued submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The oldest RECEIVED submission was started
    Dispatched { id: SubmissionId, run: RunRecord },
    /// No RECEIVED submission exists on the endpoint
    NothingQueued,
}

/// Starts queued submissions on their endpoints
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<QueueStore>,
    clients: EndpointClients,
    monitor: StatusMonitor,
    start_run_timeout: Duration,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(store: Arc<QueueStore>, clients: EndpointClients, timeouts: &TimeoutConfig) -> Self {
        let monitor = StatusMonitor::new(store.clone(), clients.clone(), timeouts);
        Self {
            store,
            clients,
            monitor,
            start_run_timeout: timeouts.start_run(),
            poll_interval: timeouts.poll_interval(),
        }
    }

    /// Override the pause between polls while waiting for a run to finish
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the bound on each start-run request
    pub fn with_start_run_timeout(mut self, timeout: Duration) -> Self {
        self.start_run_timeout = timeout;
        self
    }

    /// Monitor used to wait for dispatched runs
    pub fn monitor(&self) -> &StatusMonitor {
        &self.monitor
    }

    /// Check if a client is configured for `endpoint`
    pub fn knows_endpoint(&self, endpoint: &str) -> bool {
        self.clients.contains(endpoint)
    }

    /// Start one RECEIVED submission and record its run.
    ///
    /// Re-dispatching a submission that already left RECEIVED is rejected.
    /// Remote failures propagate unchanged and leave the submission RECEIVED.
    pub async fn run_submission(
        &self,
        endpoint: &str,
        id: &SubmissionId,
    ) -> Result<RunRecord, OrchestratorError> {
        let client = self
            .clients
            .get(endpoint)
            .ok_or_else(|| OrchestratorError::UnknownEndpoint(endpoint.to_string()))?;

        let submission = {
            let (endpoint, id) = (endpoint.to_string(), id.clone());
            run_blocking(&self.store, move |store| store.get(&endpoint, &id)).await?
        };
        let status = submission.status();
        if status != SubmissionStatus::Received {
            return Err(OrchestratorError::NotReceived {
                id: id.clone(),
                status,
            });
        }

        tracing::info!(endpoint, submission_id = %id, "Submitting to endpoint");
        let request = run_request(id, &submission);
        let run_id = with_timeout("start_run", self.start_run_timeout, client.start_run(&request))
            .await
            .map_err(|e| {
                tracing::warn!(endpoint, submission_id = %id, error = %e, "Start run failed; submission left queued");
                e
            })?;

        let run = RunRecord::started(run_id, now_utc());
        {
            let (endpoint, id, record) = (endpoint.to_string(), id.clone(), run.clone());
            run_blocking(&self.store, move |store| {
                store.modify(&endpoint, &id, |submission| submission.mark_submitted(record))
            })
            .await?;
        }

        tracing::info!(endpoint, submission_id = %id, run_id = %run.run_id, "Submission dispatched");
        Ok(run)
    }

    /// Start the oldest RECEIVED submission on an endpoint
    pub async fn run_next_queued(&self, endpoint: &str) -> Result<DispatchOutcome, OrchestratorError> {
        if !self.knows_endpoint(endpoint) {
            return Err(OrchestratorError::UnknownEndpoint(endpoint.to_string()));
        }

        let queued = self.list(endpoint, SubmissionStatus::Received).await?;
        let Some(id) = queued.into_iter().next() else {
            tracing::debug!(endpoint, "Nothing queued");
            return Ok(DispatchOutcome::NothingQueued);
        };

        let run = self.run_submission(endpoint, &id).await?;
        Ok(DispatchOutcome::Dispatched { id, run })
    }

    /// Drain every endpoint's queue, one run in flight per endpoint.
    ///
    /// Endpoints are drained concurrently. Runs already SUBMITTED on an
    /// endpoint are waited out first. After each dispatch the endpoint
    /// waits for the run to reach a terminal state before starting the next
    /// submission. A dispatch failure stops that endpoint only and is
    /// recorded in its report entry; store corruption aborts the whole call.
    pub async fn run_all(&self, cancel: &CancellationToken) -> Result<RunAllReport, OrchestratorError> {
        let cancel = cancel.child_token();
        let mut tasks = JoinSet::new();

        for endpoint in self.clients.endpoint_ids() {
            let dispatcher = self.clone();
            let endpoint = endpoint.to_string();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let result = dispatcher.drain_endpoint(&endpoint, &cancel).await;
                (endpoint, result)
            });
        }

        let mut report = RunAllReport::default();
        while let Some(joined) = tasks.join_next().await {
            let (endpoint, result) = joined.map_err(|e| OrchestratorError::TaskFailed {
                endpoint: "(unknown)".to_string(),
                reason: e.to_string(),
            })?;

            match result {
                Ok(entry) => report.endpoints.push(entry),
                Err(e) => {
                    tracing::error!(endpoint = %endpoint, error = %e, "Aborting run_all");
                    cancel.cancel();
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        report.endpoints.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        Ok(report)
    }

    /// Dispatch-and-wait loop for one endpoint. Only fatal errors escape.
    async fn drain_endpoint(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<EndpointReport, OrchestratorError> {
        let mut entry = EndpointReport::new(endpoint);

        loop {
            if cancel.is_cancelled() {
                entry.cancelled = true;
                break;
            }

            match self.wait_for_in_flight(endpoint, cancel).await {
                Ok(true) => {}
                Ok(false) => {
                    entry.cancelled = true;
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    entry.error = Some(e);
                    break;
                }
            }

            let (id, run) = match self.run_next_queued(endpoint).await {
                Ok(DispatchOutcome::Dispatched { id, run }) => (id, run),
                Ok(DispatchOutcome::NothingQueued) => break,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    entry.error = Some(e);
                    break;
                }
            };

            match self.wait_for_terminal(endpoint, &id, cancel).await {
                Ok(Some(status)) => entry.dispatched.push(DispatchedRun {
                    id,
                    run_id: run.run_id,
                    status,
                }),
                Ok(None) => {
                    entry.dispatched.push(DispatchedRun {
                        id,
                        run_id: run.run_id,
                        status: SubmissionStatus::Submitted,
                    });
                    entry.cancelled = true;
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    entry.error = Some(e);
                    break;
                }
            }
        }

        Ok(entry)
    }

    /// Wait out SUBMITTED runs already on the endpoint, e.g. from `run-next`
    /// or a cancelled earlier drain.
    ///
    /// Returns `false` if cancelled first.
    async fn wait_for_in_flight(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, OrchestratorError> {
        let in_flight = self.list(endpoint, SubmissionStatus::Submitted).await?;
        for id in &in_flight {
            tracing::info!(endpoint, submission_id = %id, "Waiting for run already in flight");
            if self.wait_for_terminal(endpoint, id, cancel).await?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn list(
        &self,
        endpoint: &str,
        status: SubmissionStatus,
    ) -> Result<Vec<SubmissionId>, OrchestratorError> {
        let endpoint = endpoint.to_string();
        Ok(run_blocking(&self.store, move |store| store.list_by_status(&endpoint, status)).await?)
    }

    /// Poll a dispatched submission until it is terminal.
    ///
    /// Returns `None` if cancelled first.
    async fn wait_for_terminal(
        &self,
        endpoint: &str,
        id: &SubmissionId,
        cancel: &CancellationToken,
    ) -> Result<Option<SubmissionStatus>, OrchestratorError> {
        loop {
            let snapshot = self.monitor.poll_once(endpoint, id).await?;
            if snapshot.is_terminal() {
                return Ok(Some(snapshot.status));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}

/// Remote request for a stored submission
fn run_request(id: &SubmissionId, submission: &Submission) -> RunRequest {
    let workflow = &submission.workflow;
    let type_version = workflow
        .type_version
        .clone()
        .unwrap_or_else(|| DEFAULT_TYPE_VERSION.to_string());

    let mut request = RunRequest::new(
        workflow.url.clone(),
        workflow.workflow_type.clone(),
        type_version,
        submission.params.to_value(),
    )
    .with_attachments(submission.attachments.clone())
    .with_tag("submission_id", id.as_str())
    .with_tag("sample", submission.sample.clone());

    if let Some(name) = &workflow.name {
        request = request.with_tag("wf_id", name.clone());
    }
    request
}
