//! Run request fields.

use serde::{Deserialize, Serialize};

/// Fields of a `POST /runs` request.
///
/// On the wire this is sent as a multipart form; `workflow_params` and
/// `tags` travel as JSON-encoded text parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Descriptor URL of the workflow to run.
    pub workflow_url: String,
    /// Workflow language, e.g. `CWL` or `WDL`.
    pub workflow_type: String,
    /// Workflow language version.
    pub workflow_type_version: String,
    /// Parameter document: either a URL string or an inline object.
    pub workflow_params: serde_json::Value,
    /// Free-form key/value tags.
    #[serde(default)]
    pub tags: serde_json::Map<String, serde_json::Value>,
    /// Auxiliary file references uploaded as `workflow_attachment`.
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl RunRequest {
    /// Create a request with no tags or attachments.
    pub fn new(
        workflow_url: impl Into<String>,
        workflow_type: impl Into<String>,
        workflow_type_version: impl Into<String>,
        workflow_params: serde_json::Value,
    ) -> Self {
        Self {
            workflow_url: workflow_url.into(),
            workflow_type: workflow_type.into(),
            workflow_type_version: workflow_type_version.into(),
            workflow_params,
            tags: serde_json::Map::new(),
            attachments: Vec::new(),
        }
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .insert(key.into(), serde_json::Value::String(value.into()));
        self
    }

    /// Replace the attachment list.
    pub fn with_attachments(mut self, attachments: Vec<String>) -> Self {
        self.attachments = attachments;
        self
    }

    /// `workflow_params` as the text sent in the form part.
    pub fn params_text(&self) -> String {
        match &self.workflow_params {
            serde_json::Value::String(url) => url.clone(),
            other => other.to_string(),
        }
    }
}
