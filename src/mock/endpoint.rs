//! Mock Endpoint Implementation
//!
//! Configurable in-process endpoint implementing [`ExecutionClient`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use wes_protocol::{RunRequest, RunState};

use super::failure::{FailureConfig, FailureInjector, MockOperation};
use super::state::MockState;
use crate::client::{ClientError, ExecutionClient};

/// Configurable mock endpoint for testing
#[derive(Clone, Default)]
pub struct MockEndpoint {
    /// Mutable state (wrapped for interior mutability)
    state: Arc<Mutex<MockState>>,
    /// Failure injector
    failures: Arc<Mutex<FailureInjector>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint whose runs all follow `states`
    pub fn with_progression(states: Vec<RunState>) -> Self {
        let endpoint = Self::new();
        endpoint.set_default_progression(states);
        endpoint
    }

    /// Progression for runs accepted from now on
    pub fn set_default_progression(&self, states: Vec<RunState>) {
        lock(&self.state).default_progression = states;
    }

    /// Replace the remaining progression of an accepted run
    pub fn set_progression(&self, run_id: &str, states: Vec<RunState>) -> bool {
        match lock(&self.state).get_mut(run_id) {
            Some(run) => {
                run.progression = states;
                run.cursor = 0;
                true
            }
            None => false,
        }
    }

    /// Pin an accepted run to one state
    pub fn set_state(&self, run_id: &str, state: RunState) -> bool {
        match lock(&self.state).get_mut(run_id) {
            Some(run) => {
                run.set_state(state);
                true
            }
            None => false,
        }
    }

    /// Keep a run in its current state until released
    pub fn hold(&self, run_id: &str) -> bool {
        self.set_held(run_id, true)
    }

    pub fn release(&self, run_id: &str) -> bool {
        self.set_held(run_id, false)
    }

    fn set_held(&self, run_id: &str, held: bool) -> bool {
        match lock(&self.state).get_mut(run_id) {
            Some(run) => {
                run.held = held;
                true
            }
            None => false,
        }
    }

    /// Inject a failure for an operation
    pub fn inject_failure(&self, op: MockOperation, config: FailureConfig) {
        lock(&self.failures).inject(op, config);
    }

    /// Clear all failure injections
    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Run ids in the order they were accepted
    pub fn started_runs(&self) -> Vec<String> {
        lock(&self.state).started.clone()
    }

    /// Request received for a run
    pub fn request(&self, run_id: &str) -> Option<RunRequest> {
        lock(&self.state).get(run_id).map(|run| run.request.clone())
    }

    /// State the next status query would report
    pub fn peek_state(&self, run_id: &str) -> Option<RunState> {
        lock(&self.state).get(run_id).map(|run| run.current())
    }

    /// Number of status queries received
    pub fn status_calls(&self) -> u64 {
        lock(&self.state).status_calls
    }

    /// Apply an injected failure, sleeping for any configured delay
    async fn check_failure(&self, op: MockOperation) -> Result<(), ClientError> {
        let failure = lock(&self.failures).check(op);
        let Some(failure) = failure else {
            return Ok(());
        };

        if let Some(delay) = failure.delay {
            tokio::time::sleep(delay).await;
        }

        match failure.to_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ExecutionClient for MockEndpoint {
    async fn start_run(&self, request: &RunRequest) -> Result<String, ClientError> {
        self.check_failure(MockOperation::StartRun).await?;

        let run_id = ulid::Ulid::new().to_string();
        lock(&self.state).accept(run_id.clone(), request.clone());
        tracing::debug!(run_id = %run_id, workflow_url = %request.workflow_url, "Mock run accepted");
        Ok(run_id)
    }

    async fn run_status(&self, run_id: &str) -> Result<RunState, ClientError> {
        lock(&self.state).status_calls += 1;
        self.check_failure(MockOperation::RunStatus).await?;

        let mut state = lock(&self.state);
        match state.get_mut(run_id) {
            Some(run) => Ok(run.advance()),
            None => Err(ClientError::Api {
                status: 404,
                message: format!("run {} not found", run_id),
            }),
        }
    }
}
