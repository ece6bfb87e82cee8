//! Per-endpoint results of a `run_all` pass.

use crate::error::OrchestratorError;
use crate::queue::SubmissionId;
use crate::state::SubmissionStatus;

/// A submission started during `run_all`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedRun {
    pub id: SubmissionId,
    pub run_id: String,
    /// Status when the endpoint moved on (SUBMITTED if cancelled while waiting)
    pub status: SubmissionStatus,
}

/// What happened on one endpoint
#[derive(Debug)]
pub struct EndpointReport {
    pub endpoint: String,
    /// Runs in dispatch order
    pub dispatched: Vec<DispatchedRun>,
    /// Error that stopped this endpoint early
    pub error: Option<OrchestratorError>,
    /// Stop signal received before the queue drained
    pub cancelled: bool,
}

impl EndpointReport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            dispatched: Vec::new(),
            error: None,
            cancelled: false,
        }
    }

    /// Queue drained without error or cancellation
    pub fn is_drained(&self) -> bool {
        self.error.is_none() && !self.cancelled
    }
}

/// Result of `Dispatcher::run_all`, one entry per endpoint
#[derive(Debug, Default)]
pub struct RunAllReport {
    pub endpoints: Vec<EndpointReport>,
}

impl RunAllReport {
    pub fn get(&self, endpoint: &str) -> Option<&EndpointReport> {
        self.endpoints.iter().find(|e| e.endpoint == endpoint)
    }

    /// Total runs started across endpoints
    pub fn dispatched(&self) -> usize {
        self.endpoints.iter().map(|e| e.dispatched.len()).sum()
    }

    /// Endpoints stopped by an error
    pub fn failed(&self) -> impl Iterator<Item = &EndpointReport> {
        self.endpoints.iter().filter(|e| e.error.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_totals() {
        let mut ok = EndpointReport::new("a");
        ok.dispatched.push(DispatchedRun {
            id: SubmissionId::new("1"),
            run_id: "r1".to_string(),
            status: SubmissionStatus::Complete,
        });
        let mut failed = EndpointReport::new("b");
        failed.error = Some(OrchestratorError::UnknownEndpoint("b".to_string()));

        let report = RunAllReport {
            endpoints: vec![ok, failed],
        };
        assert_eq!(report.dispatched(), 1);
        assert_eq!(report.failed().count(), 1);
        assert!(report.get("a").unwrap().is_drained());
        assert!(!report.get("b").unwrap().is_drained());
    }
}
