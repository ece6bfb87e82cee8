//! Queue store with serialized read-modify-write cycles.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use wes_protocol::RunState;

use super::backend::{DocumentBackend, JsonFileBackend, MemoryBackend};
use super::document::QueueDocument;
use super::id::{next_submission_id, SubmissionId};
use crate::state::{StateError, Submission, SubmissionStatus, TerminalState};

/// Errors from queue store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Submission {id} not found on endpoint '{endpoint}'")]
    NotFound { endpoint: String, id: SubmissionId },

    #[error("Submission id {id} already exists on endpoint '{endpoint}'")]
    DuplicateId { endpoint: String, id: SubmissionId },

    #[error("Queue document at {location} is corrupt: {reason}")]
    Corrupt { location: String, reason: String },

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Failed to encode queue document: {0}")]
    Encode(serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Queue lock poisoned")]
    LockPoisoned,

    #[error("System clock out of range for id generation")]
    IdExhausted,

    #[error("Store task failed: {0}")]
    Task(String),
}

/// Top-level submission field written by [`QueueStore::update_field`]
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionField {
    /// Forward-only status change; RECEIVED → SUBMITTED requires a run and
    /// goes through the dispatcher instead
    Status(SubmissionStatus),
    Sample(String),
    Attachments(Vec<String>),
}

/// Run-record field written by [`QueueStore::update_run_field`]
#[derive(Debug, Clone, PartialEq)]
pub enum RunField {
    State(RunState),
    StartTime(DateTime<Utc>),
    /// Must not decrease
    ElapsedTime(Duration),
}

/// The queue store: sole source of truth for submissions.
///
/// Each operation loads the whole document, mutates it in memory and saves
/// it back while holding an exclusive lock. The lock is never held across
/// an `.await`, so no remote call happens inside a cycle.
///
/// Operations block on file I/O. Async callers go through [`run_blocking`].
pub struct QueueStore {
    backend: Box<dyn DocumentBackend>,
    lock: Mutex<()>,
}

impl QueueStore {
    /// Create a store over any backend
    pub fn new(backend: impl DocumentBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            lock: Mutex::new(()),
        }
    }

    /// Store backed by a JSON file
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileBackend::new(path))
    }

    /// Store held in memory only
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Where the document lives
    pub fn location(&self) -> String {
        self.backend.location()
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.lock.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Read a consistent copy of the whole document
    pub fn load(&self) -> Result<QueueDocument, StoreError> {
        let _guard = self.guard()?;
        self.backend.load()
    }

    /// Queue a new submission under a freshly generated id
    pub fn create(&self, endpoint: &str, submission: Submission) -> Result<SubmissionId, StoreError> {
        let _guard = self.guard()?;
        let mut document = self.backend.load()?;

        let id = next_submission_id(document.last_id(endpoint)).ok_or(StoreError::IdExhausted)?;
        document.insert(endpoint, id.clone(), submission)?;
        self.backend.save(&document)?;

        tracing::info!(endpoint, submission_id = %id, "Submission queued");
        Ok(id)
    }

    /// Fetch one submission
    pub fn get(&self, endpoint: &str, id: &SubmissionId) -> Result<Submission, StoreError> {
        self.load()?
            .get(endpoint, id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                endpoint: endpoint.to_string(),
                id: id.clone(),
            })
    }

    /// Ids on an endpoint with the given status, oldest first
    pub fn list_by_status(
        &self,
        endpoint: &str,
        status: SubmissionStatus,
    ) -> Result<Vec<SubmissionId>, StoreError> {
        Ok(self.load()?.ids_with_status(endpoint, status))
    }

    /// Endpoint ids that have at least one stored submission
    pub fn endpoints(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.load()?.endpoints().map(str::to_string).collect())
    }

    /// Run one read-modify-write cycle on a submission.
    ///
    /// If `f` fails nothing is written.
    pub fn modify<T>(
        &self,
        endpoint: &str,
        id: &SubmissionId,
        f: impl FnOnce(&mut Submission) -> Result<T, StateError>,
    ) -> Result<T, StoreError> {
        let _guard = self.guard()?;
        let mut document = self.backend.load()?;

        let submission = document
            .get_mut(endpoint, id)
            .ok_or_else(|| StoreError::NotFound {
                endpoint: endpoint.to_string(),
                id: id.clone(),
            })?;
        let result = f(submission)?;

        self.backend.save(&document)?;
        Ok(result)
    }

    /// Write one top-level field
    pub fn update_field(
        &self,
        endpoint: &str,
        id: &SubmissionId,
        field: SubmissionField,
    ) -> Result<Submission, StoreError> {
        self.modify(endpoint, id, |submission| {
            match field {
                SubmissionField::Status(status) => submission.advance(status)?,
                SubmissionField::Sample(sample) => submission.sample = sample,
                SubmissionField::Attachments(attachments) => submission.attachments = attachments,
            }
            Ok(submission.clone())
        })
    }

    /// Write one run-record field; terminal runs are frozen
    pub fn update_run_field(
        &self,
        endpoint: &str,
        id: &SubmissionId,
        field: RunField,
    ) -> Result<Submission, StoreError> {
        self.modify(endpoint, id, |submission| {
            let status = submission.status();
            if status.is_terminal() {
                return Err(StateError::Frozen(status));
            }

            let run = submission.run_mut()?;
            match field {
                RunField::State(state) => run.state = state,
                RunField::StartTime(start_time) => run.start_time = start_time,
                RunField::ElapsedTime(elapsed) => {
                    if elapsed < run.elapsed_time {
                        return Err(StateError::ElapsedRegression {
                            current: run.elapsed_time,
                            requested: elapsed,
                        });
                    }
                    run.elapsed_time = elapsed;
                }
            }
            Ok(submission.clone())
        })
    }
}

/// Run store operations on the blocking thread pool.
pub async fn run_blocking<T, F>(store: &Arc<QueueStore>, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&QueueStore) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
