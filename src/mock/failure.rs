//! Failure Injection for Mock Endpoint
//!
//! Supports configurable failure injection for testing error paths.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

/// Operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    StartRun,
    RunStatus,
}

/// What an injected failure looks like to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection-level failure (transient)
    Unreachable(String),
    /// Non-2xx response
    Api { status: u16, message: String },
}

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error to return (if any)
    pub kind: Option<FailureKind>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Connectivity failure
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: Some(FailureKind::Unreachable(message.into())),
            delay: None,
            fail_count: None,
        }
    }

    /// Endpoint answers with an error status
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: Some(FailureKind::Api {
                status,
                message: message.into(),
            }),
            delay: None,
            fail_count: None,
        }
    }

    /// Create a config that just adds delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            kind: None,
            delay: Some(duration),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    /// The client error this failure produces, if any
    pub fn to_error(&self) -> Option<ClientError> {
        self.kind.as_ref().map(|kind| match kind {
            FailureKind::Unreachable(message) => ClientError::Unreachable(message.clone()),
            FailureKind::Api { status, message } => ClientError::Api {
                status: *status,
                message: message.clone(),
            },
        })
    }
}

/// Failure injector for the mock endpoint
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Per-operation failure configs
    configs: HashMap<MockOperation, FailureConfig>,
    /// Call counts per operation (for fail_count tracking)
    call_counts: HashMap<MockOperation, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation
    pub fn inject(&mut self, op: MockOperation, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Clear failure injection for a specific operation
    pub fn clear_op(&mut self, op: MockOperation) {
        self.configs.remove(&op);
        self.call_counts.remove(&op);
    }

    /// Check if a failure should occur for an operation.
    /// Returns the failure config if one should occur, None otherwise.
    pub fn check(&mut self, op: MockOperation) -> Option<FailureConfig> {
        let config = self.configs.get(&op)?;
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }

        Some(config.clone())
    }
}
