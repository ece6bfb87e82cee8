//! Status Monitor
//!
//! Polls execution endpoints for the state of every dispatched submission,
//! refreshes elapsed time, and advances submissions to COMPLETE or ERROR
//! when their run finishes.
//!
//! Poll failures are contained per submission: the stored record is left
//! untouched and the snapshot reports `UNREACHABLE` (connectivity) or
//! `POLL_ERROR` (endpoint answered with an error). Only store failures
//! escape a poll.

mod snapshot;

pub use snapshot::{PollState, SnapshotSink, StatusReport, StatusSnapshot};

use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;

use crate::client::{with_timeout, EndpointClients};
use crate::error::OrchestratorError;
use crate::queue::{run_blocking, QueueStore, SubmissionId};
use crate::state::{now_utc, Lifecycle, Observation};
use crate::timeout::TimeoutConfig;

/// Why the monitor loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Every submission reached a terminal state
    Quiescent,
    /// Stop signal received
    Cancelled,
}

/// Reconciles stored submissions against remote run state
#[derive(Clone)]
pub struct StatusMonitor {
    store: Arc<QueueStore>,
    clients: EndpointClients,
    status_timeout: Duration,
}

impl StatusMonitor {
    pub fn new(store: Arc<QueueStore>, clients: EndpointClients, timeouts: &TimeoutConfig) -> Self {
        Self {
            store,
            clients,
            status_timeout: timeouts.status(),
        }
    }

    /// Override the bound on each status request
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    /// Poll one submission.
    ///
    /// RECEIVED submissions report QUEUED and terminal submissions report
    /// their stored state; neither contacts the endpoint.
    pub async fn poll_once(
        &self,
        endpoint: &str,
        id: &SubmissionId,
    ) -> Result<StatusSnapshot, OrchestratorError> {
        let submission = {
            let (endpoint, id) = (endpoint.to_string(), id.clone());
            run_blocking(&self.store, move |store| store.get(&endpoint, &id)).await?
        };
        let run_id = match &submission.lifecycle {
            Lifecycle::Submitted(run) => run.run_id.clone(),
            _ => return Ok(StatusSnapshot::stored(endpoint, id, &submission)),
        };

        let Some(client) = self.clients.get(endpoint) else {
            tracing::warn!(endpoint, submission_id = %id, "No client configured for endpoint");
            return Ok(
                StatusSnapshot::from_submission(endpoint, id, &submission, PollState::PollError)
                    .with_detail(format!("unknown endpoint '{}'", endpoint)),
            );
        };

        let remote = with_timeout("run_status", self.status_timeout, client.run_status(&run_id)).await;
        let state = match remote {
            Ok(state) => state,
            Err(e) => {
                let poll_state = if e.is_transient() {
                    PollState::Unreachable
                } else {
                    PollState::PollError
                };
                tracing::warn!(
                    endpoint,
                    submission_id = %id,
                    run_id = %run_id,
                    error = %e,
                    "Status poll failed; stored state left unchanged",
                );
                return Ok(
                    StatusSnapshot::from_submission(endpoint, id, &submission, poll_state)
                        .with_detail(e.to_string()),
                );
            }
        };

        let now = now_utc();
        let (observation, updated) = {
            let (endpoint, id) = (endpoint.to_string(), id.clone());
            run_blocking(&self.store, move |store| {
                store.modify(&endpoint, &id, |submission| {
                    let observation = submission.observe(state, now)?;
                    Ok((observation, submission.clone()))
                })
            })
            .await?
        };

        match observation {
            Observation::Finished(status) => tracing::info!(
                endpoint,
                submission_id = %id,
                run_id = %run_id,
                status = %status,
                "Run finished",
            ),
            Observation::Live => tracing::debug!(
                endpoint,
                submission_id = %id,
                state = %state,
                "Run state refreshed",
            ),
            Observation::AlreadyTerminal => {}
        }

        Ok(StatusSnapshot::from_submission(
            endpoint,
            id,
            &updated,
            PollState::Remote(state),
        ))
    }

    /// Poll every submission stored for one endpoint, in id order
    pub async fn poll_endpoint(&self, endpoint: &str) -> Result<Vec<StatusSnapshot>, OrchestratorError> {
        let ids: Vec<SubmissionId> = run_blocking(&self.store, |store| store.load())
            .await?
            .endpoint_entries(endpoint)
            .map(|entry| entry.id.clone())
            .collect();

        let mut snapshots = Vec::with_capacity(ids.len());
        for id in &ids {
            snapshots.push(self.poll_once(endpoint, id).await?);
        }
        Ok(snapshots)
    }

    /// Poll every submission on every endpoint; endpoints are polled concurrently
    pub async fn poll_all(&self) -> Result<StatusReport, OrchestratorError> {
        let endpoints = run_blocking(&self.store, |store| store.endpoints()).await?;
        let per_endpoint = try_join_all(endpoints.iter().map(|e| self.poll_endpoint(e))).await?;
        Ok(StatusReport::new(per_endpoint.into_iter().flatten().collect()))
    }

    /// Poll until every submission is terminal or `cancel` fires.
    ///
    /// Each pass is handed to `sink`. A stop signal received mid-pass takes
    /// effect once the pass completes.
    pub async fn monitor_loop<S: SnapshotSink + Send>(
        &self,
        interval: Duration,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<MonitorExit, OrchestratorError> {
        tracing::info!(interval_ms = interval.as_millis() as u64, "Status monitor started");

        loop {
            let report = self.poll_all().await?;
            let quiescent = report.all_terminal();
            sink.accept(&report);

            if quiescent {
                tracing::info!(submissions = report.len(), "All submissions terminal");
                return Ok(MonitorExit::Quiescent);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Status monitor shutting down");
                    return Ok(MonitorExit::Cancelled);
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
