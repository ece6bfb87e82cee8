//! Workflow registry entries

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::state::DEFAULT_TYPE_VERSION;

/// Runnable descriptor for a registered workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDescriptor {
    pub url: String,
    pub workflow_type: String,
    pub type_version: String,
    /// Attachments used when the caller supplies none
    pub default_attachments: Vec<String>,
}

/// Resolves workflow names to runnable descriptors
pub trait WorkflowRegistry: Send + Sync {
    /// `None` when the name is not registered
    fn resolve(&self, name: &str) -> Option<WorkflowDescriptor>;
}

/// A single `[[workflow]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Unique workflow name
    pub name: String,

    /// Descriptor URL
    pub url: String,

    /// Workflow language (default: CWL)
    #[serde(rename = "type", default = "default_type")]
    pub workflow_type: String,

    /// Workflow language version
    #[serde(default = "default_version")]
    pub version: String,

    /// Default attachments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

fn default_type() -> String {
    "CWL".to_string()
}

fn default_version() -> String {
    DEFAULT_TYPE_VERSION.to_string()
}

impl WorkflowConfig {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        workflow_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            workflow_type: workflow_type.into(),
            version: default_version(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn descriptor(&self) -> WorkflowDescriptor {
        WorkflowDescriptor {
            url: self.url.clone(),
            workflow_type: self.workflow_type.clone(),
            type_version: self.version.clone(),
            default_attachments: self.attachments.clone(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::MissingField {
                kind: "Workflow",
                name: "(unnamed)".to_string(),
                field: "name",
            });
        }

        if self.url.is_empty() {
            return Err(ConfigError::MissingField {
                kind: "Workflow",
                name: self.name.clone(),
                field: "url",
            });
        }

        if self.workflow_type.is_empty() {
            return Err(ConfigError::InvalidValue {
                kind: "Workflow",
                name: self.name.clone(),
                field: "type",
                reason: "type cannot be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let workflow: WorkflowConfig = toml::from_str(
            r#"
            name = "md5sum"
            url = "https://example.org/md5sum.cwl"
        "#,
        )
        .unwrap();
        assert_eq!(workflow.workflow_type, "CWL");
        assert_eq!(workflow.version, "v1.0");
        assert!(workflow.attachments.is_empty());
    }

    #[test]
    fn test_missing_url_rejected() {
        let workflow = WorkflowConfig::new("md5sum", "", "CWL");
        assert!(matches!(
            workflow.validate(),
            Err(ConfigError::MissingField { field: "url", .. })
        ));
    }

    #[test]
    fn test_descriptor_carries_attachments() {
        let workflow = WorkflowConfig::new("md5sum", "https://example.org/md5sum.cwl", "CWL")
            .with_attachments(vec!["file:///data/in.txt".to_string()]);
        let descriptor = workflow.descriptor();
        assert_eq!(descriptor.default_attachments, vec!["file:///data/in.txt"]);
        assert_eq!(descriptor.type_version, "v1.0");
    }
}
