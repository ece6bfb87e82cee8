//! Queue Store
//!
//! Durable mapping of endpoint → submission id → submission. Every
//! mutation is a read-modify-write of the whole document, serialized by an
//! exclusive lock and persisted with write-then-rename so readers never
//! observe a partially written queue.

mod backend;
mod document;
mod id;
mod store;

pub use backend::{DocumentBackend, JsonFileBackend, MemoryBackend};
pub use document::{QueueDocument, SubmissionEntry};
pub use id::{next_submission_id, SubmissionId};
pub use store::{run_blocking, QueueStore, RunField, StoreError, SubmissionField};

/// File name of the queue document inside a data directory
pub const QUEUE_FILENAME: &str = "submission_queue.json";
