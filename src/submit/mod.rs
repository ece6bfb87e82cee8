//! Submission Manager
//!
//! Resolves a workflow name through the registry, builds a RECEIVED
//! submission and hands it to the queue store.

mod batch;

pub use batch::{BatchEntry, BatchFile, BatchQueued};

use std::sync::Arc;

use crate::config::WorkflowRegistry;
use crate::dispatch::Dispatcher;
use crate::error::OrchestratorError;
use crate::queue::{QueueStore, SubmissionId};
use crate::state::{ParamDoc, RunRecord, Submission, WorkflowRef};

/// Builds and enqueues submissions
pub struct SubmissionManager {
    store: Arc<QueueStore>,
    registry: Arc<dyn WorkflowRegistry>,
    dispatcher: Dispatcher,
}

impl SubmissionManager {
    pub fn new(store: Arc<QueueStore>, registry: Arc<dyn WorkflowRegistry>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            registry,
            dispatcher,
        }
    }

    /// Queue a registered workflow on an endpoint.
    ///
    /// Without caller attachments (none or empty) the workflow's default
    /// attachments are used.
    pub fn queue(
        &self,
        endpoint: &str,
        workflow_name: &str,
        params: ParamDoc,
        sample: Option<String>,
        attachments: Option<Vec<String>>,
    ) -> Result<SubmissionId, OrchestratorError> {
        if !self.dispatcher.knows_endpoint(endpoint) {
            return Err(OrchestratorError::UnknownEndpoint(endpoint.to_string()));
        }

        let descriptor = self
            .registry
            .resolve(workflow_name)
            .ok_or_else(|| OrchestratorError::UnknownWorkflow(workflow_name.to_string()))?;

        let attachments = match attachments {
            Some(attachments) if !attachments.is_empty() => attachments,
            _ => descriptor.default_attachments,
        };

        let workflow = WorkflowRef {
            url: descriptor.url,
            workflow_type: descriptor.workflow_type,
            type_version: Some(descriptor.type_version),
            name: Some(workflow_name.to_string()),
        };
        let submission = Submission::new(workflow, params, attachments, sample);

        Ok(self.store.create(endpoint, submission)?)
    }

    /// Queue, then dispatch immediately.
    ///
    /// Not atomic: if dispatch fails the submission stays RECEIVED.
    pub async fn queue_and_run(
        &self,
        endpoint: &str,
        workflow_name: &str,
        params: ParamDoc,
        sample: Option<String>,
        attachments: Option<Vec<String>>,
    ) -> Result<(SubmissionId, RunRecord), OrchestratorError> {
        let id = self.queue(endpoint, workflow_name, params, sample, attachments)?;
        match self.dispatcher.run_submission(endpoint, &id).await {
            Ok(run) => Ok((id, run)),
            Err(e) => {
                tracing::warn!(endpoint, submission_id = %id, error = %e, "Queued but not started");
                Err(e)
            }
        }
    }

    /// Queue every entry of a batch file, stopping at the first failure
    pub fn queue_batch(&self, batch: &BatchFile) -> Result<Vec<BatchQueued>, OrchestratorError> {
        let mut queued = Vec::new();
        for (endpoint, sample, entry) in batch.entries() {
            tracing::info!(endpoint, workflow = %entry.wf_name, sample, "Queueing batch entry");
            let id = self.queue(
                endpoint,
                &entry.wf_name,
                entry.jsonyaml.clone(),
                Some(sample.to_string()),
                None,
            )?;
            queued.push(BatchQueued {
                endpoint: endpoint.to_string(),
                sample: sample.to_string(),
                id,
            });
        }
        Ok(queued)
    }

    /// Load a batch file and queue its entries
    pub fn queue_file(&self, path: &std::path::Path) -> Result<Vec<BatchQueued>, OrchestratorError> {
        let batch = BatchFile::load(path)?;
        self.queue_batch(&batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::EndpointClients;
    use crate::config::{OrchestratorConfig, WorkflowConfig};
    use crate::mock::{FailureConfig, MockEndpoint, MockOperation};
    use crate::state::SubmissionStatus;
    use crate::timeout::TimeoutConfig;

    fn setup(mock: &MockEndpoint) -> (SubmissionManager, Arc<QueueStore>) {
        let mut config = OrchestratorConfig::default();
        config
            .add_workflow(
                WorkflowConfig::new("md5sum", "https://example.org/md5sum.cwl", "CWL")
                    .with_attachments(vec!["file:///data/md5sum.input".to_string()]),
            )
            .unwrap();

        let store = Arc::new(QueueStore::in_memory());
        let clients = EndpointClients::new().with("local", Arc::new(mock.clone()));
        let dispatcher = Dispatcher::new(store.clone(), clients, &TimeoutConfig::default());
        let manager = SubmissionManager::new(store.clone(), Arc::new(config), dispatcher);
        (manager, store)
    }

    #[test]
    fn test_queue_uses_default_attachments() {
        let (manager, store) = setup(&MockEndpoint::new());
        let id = manager
            .queue("local", "md5sum", ParamDoc::from_arg("params.json"), None, None)
            .unwrap();

        let stored = store.get("local", &id).unwrap();
        assert_eq!(stored.status(), SubmissionStatus::Received);
        assert_eq!(stored.attachments, vec!["file:///data/md5sum.input"]);
        assert_eq!(stored.workflow.name.as_deref(), Some("md5sum"));
        assert_eq!(stored.workflow.workflow_type, "CWL");
        assert_eq!(stored.sample, "NA");
        assert!(stored.run().is_none());
    }

    #[test]
    fn test_queue_caller_attachments_win() {
        let (manager, store) = setup(&MockEndpoint::new());
        let id = manager
            .queue(
                "local",
                "md5sum",
                ParamDoc::from_arg("params.json"),
                Some("NA12878".to_string()),
                Some(vec!["file:///other".to_string()]),
            )
            .unwrap();

        let stored = store.get("local", &id).unwrap();
        assert_eq!(stored.attachments, vec!["file:///other"]);
        assert_eq!(stored.sample, "NA12878");
    }

    #[test]
    fn test_unknown_workflow() {
        let (manager, store) = setup(&MockEndpoint::new());
        let result = manager.queue("local", "nope", ParamDoc::from_arg("{}"), None, None);
        assert!(matches!(result, Err(OrchestratorError::UnknownWorkflow(name)) if name == "nope"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_endpoint() {
        let (manager, _store) = setup(&MockEndpoint::new());
        let result = manager.queue("remote", "md5sum", ParamDoc::from_arg("{}"), None, None);
        assert!(matches!(result, Err(OrchestratorError::UnknownEndpoint(_))));
    }

    #[tokio::test]
    async fn test_queue_and_run() {
        let mock = MockEndpoint::new();
        let (manager, store) = setup(&mock);
        let (id, run) = manager
            .queue_and_run("local", "md5sum", ParamDoc::from_arg("{}"), None, None)
            .await
            .unwrap();

        assert_eq!(store.get("local", &id).unwrap().run(), Some(&run));
        let request = mock.request(&run.run_id).unwrap();
        assert_eq!(request.workflow_url, "https://example.org/md5sum.cwl");
    }

    #[tokio::test]
    async fn test_queue_and_run_failure_keeps_submission() {
        let mock = MockEndpoint::new();
        mock.inject_failure(MockOperation::StartRun, FailureConfig::unreachable("refused"));
        let (manager, store) = setup(&mock);

        let result = manager
            .queue_and_run("local", "md5sum", ParamDoc::from_arg("{}"), None, None)
            .await;
        assert!(result.is_err());
        assert_eq!(
            store.list_by_status("local", SubmissionStatus::Received).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_queue_batch_stops_at_first_failure() {
        let (manager, store) = setup(&MockEndpoint::new());
        let batch = BatchFile::parse(
            r#"{
                "local": {
                    "a_sample": {"wf_name": "md5sum", "jsonyaml": "a.json"},
                    "b_sample": {"wf_name": "missing", "jsonyaml": "b.json"},
                    "c_sample": {"wf_name": "md5sum", "jsonyaml": "c.json"}
                }
            }"#,
        )
        .unwrap();

        let result = manager.queue_batch(&batch);
        assert!(matches!(result, Err(OrchestratorError::UnknownWorkflow(_))));
        assert_eq!(store.load().unwrap().len(), 1);
    }
}
