//! Orchestrator Configuration
//!
//! Parses and validates the configuration file at
//! `~/.config/wes-orchestrator/config.toml`: the queue location, remote-call
//! timeouts, the known execution endpoints and the workflow registry.

mod endpoint;
mod workflow;

pub use endpoint::{EndpointConfig, Proto};
pub use workflow::{WorkflowConfig, WorkflowDescriptor, WorkflowRegistry};

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::queue::QUEUE_FILENAME;
use crate::timeout::{TimeoutConfig, TimeoutValidationError};

/// Directory under `$HOME` holding configuration and the default queue
const CONFIG_DIR: &str = ".config/wes-orchestrator";

/// Orchestrator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Queue document location (default: next to the config file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_path: Option<PathBuf>,

    /// Remote-call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Known execution endpoints
    #[serde(default, rename = "endpoint")]
    pub endpoints: Vec<EndpointConfig>,

    /// Registered workflows
    #[serde(default, rename = "workflow")]
    pub workflows: Vec<WorkflowConfig>,
}

/// Errors that can occur when loading, validating or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("HOME environment variable not set")]
    NoHome,

    #[error("Duplicate endpoint id: '{0}'")]
    DuplicateEndpoint(String),

    #[error("Duplicate workflow name: '{0}'")]
    DuplicateWorkflow(String),

    #[error("{kind} '{name}': missing required field '{field}'")]
    MissingField {
        kind: &'static str,
        name: String,
        field: &'static str,
    },

    #[error("{kind} '{name}': invalid value for '{field}': {reason}")]
    InvalidValue {
        kind: &'static str,
        name: String,
        field: &'static str,
        reason: String,
    },

    #[error("Invalid timeouts: {0}")]
    Timeout(#[from] TimeoutValidationError),

    #[error("Endpoint '{0}' is an in-process mock; its runs cannot be polled from a separate process")]
    ProcessLocalEndpoint(String),
}

impl OrchestratorConfig {
    /// Load configuration from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        Self::load(&path)
    }

    /// Get the default configuration directory
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME").map_err(|_| ConfigError::NoHome)?;
        Ok(PathBuf::from(home).join(CONFIG_DIR))
    }

    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::default_dir()?.join("config.toml"))
    }

    /// Load configuration from a specific path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: OrchestratorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts.validate()?;

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if !seen.insert(endpoint.id.as_str()) {
                return Err(ConfigError::DuplicateEndpoint(endpoint.id.clone()));
            }
            endpoint.validate()?;
        }

        let mut seen = HashSet::new();
        for workflow in &self.workflows {
            if !seen.insert(workflow.name.as_str()) {
                return Err(ConfigError::DuplicateWorkflow(workflow.name.clone()));
            }
            workflow.validate()?;
        }

        Ok(())
    }

    /// Write the configuration atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, content)?;
        std::fs::rename(&temp_path, path)?;

        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Queue document location: configured, else the default directory
    pub fn resolved_queue_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.queue_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::default_dir()?.join(QUEUE_FILENAME)),
        }
    }

    /// Get an endpoint by id
    pub fn endpoint(&self, id: &str) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    /// Get a workflow by name
    pub fn workflow(&self, name: &str) -> Option<&WorkflowConfig> {
        self.workflows.iter().find(|w| w.name == name)
    }

    /// Known endpoint ids in configuration order
    pub fn endpoint_ids(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.id.as_str()).collect()
    }

    /// Fail if `endpoint` (or any endpoint, when `None`) is a mock.
    ///
    /// Mock runs live only in the process that dispatched them.
    pub fn require_persistent_endpoints(&self, endpoint: Option<&str>) -> Result<(), ConfigError> {
        let mock = self
            .endpoints
            .iter()
            .filter(|e| endpoint.map_or(true, |id| e.id == id))
            .find(|e| e.proto == Proto::Mock);
        match mock {
            Some(e) => Err(ConfigError::ProcessLocalEndpoint(e.id.clone())),
            None => Ok(()),
        }
    }

    /// Register a workflow; names must stay unique
    pub fn add_workflow(&mut self, workflow: WorkflowConfig) -> Result<(), ConfigError> {
        if self.workflow(&workflow.name).is_some() {
            return Err(ConfigError::DuplicateWorkflow(workflow.name));
        }
        workflow.validate()?;
        self.workflows.push(workflow);
        Ok(())
    }

    /// Register an endpoint; ids must stay unique
    pub fn add_endpoint(&mut self, endpoint: EndpointConfig) -> Result<(), ConfigError> {
        if self.endpoint(&endpoint.id).is_some() {
            return Err(ConfigError::DuplicateEndpoint(endpoint.id));
        }
        endpoint.validate()?;
        self.endpoints.push(endpoint);
        Ok(())
    }
}

impl WorkflowRegistry for OrchestratorConfig {
    fn resolve(&self, name: &str) -> Option<WorkflowDescriptor> {
        self.workflow(name).map(WorkflowConfig::descriptor)
    }
}
