//! Wiring of store, clients and components from a configuration.

use std::sync::Arc;

use crate::client::EndpointClients;
use crate::config::OrchestratorConfig;
use crate::dispatch::Dispatcher;
use crate::error::OrchestratorError;
use crate::monitor::StatusMonitor;
use crate::queue::QueueStore;
use crate::submit::SubmissionManager;

/// Components sharing one queue store
pub struct Orchestrator {
    pub config: Arc<OrchestratorConfig>,
    pub store: Arc<QueueStore>,
    pub manager: SubmissionManager,
    pub dispatcher: Dispatcher,
    pub monitor: StatusMonitor,
}

impl Orchestrator {
    /// Open the configured queue file and build a client per endpoint
    pub fn from_config(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let queue_path = config.resolved_queue_path()?;
        tracing::debug!(queue = %queue_path.display(), endpoints = config.endpoints.len(), "Opening queue");

        let store = Arc::new(QueueStore::open(queue_path));
        let clients = EndpointClients::from_config(&config.endpoints);
        Ok(Self::with_parts(config, store, clients))
    }

    /// Assemble from explicit parts
    pub fn with_parts(config: OrchestratorConfig, store: Arc<QueueStore>, clients: EndpointClients) -> Self {
        let config = Arc::new(config);
        let dispatcher = Dispatcher::new(store.clone(), clients.clone(), &config.timeouts);
        let monitor = StatusMonitor::new(store.clone(), clients, &config.timeouts);
        let manager = SubmissionManager::new(store.clone(), config.clone(), dispatcher.clone());
        Self {
            config,
            store,
            manager,
            dispatcher,
            monitor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EndpointConfig, WorkflowConfig};
    use crate::state::ParamDoc;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_uses_queue_path() {
        let temp = TempDir::new().unwrap();
        let queue_path = temp.path().join("queue.json");

        let mut config = OrchestratorConfig {
            queue_path: Some(queue_path.clone()),
            ..OrchestratorConfig::default()
        };
        config.add_endpoint(EndpointConfig::mock("sim")).unwrap();
        config
            .add_workflow(WorkflowConfig::new("md5sum", "https://example.org/md5sum.cwl", "CWL"))
            .unwrap();

        let orchestrator = Orchestrator::from_config(config).unwrap();
        orchestrator
            .manager
            .queue("sim", "md5sum", ParamDoc::from_arg("{}"), None, None)
            .unwrap();

        assert!(queue_path.exists());
        assert_eq!(orchestrator.store.location(), queue_path.display().to_string());
    }
}
