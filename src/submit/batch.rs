//! Batch queue files
//!
//! JSON mapping `endpoint → sample → {wf_name, jsonyaml}`:
//!
//! ```json
//! {"local": {"NA12878": {"wf_name": "md5sum", "jsonyaml": "file:///p.json"}}}
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::OrchestratorError;
use crate::queue::SubmissionId;
use crate::state::ParamDoc;

/// One workflow to queue for a sample
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchEntry {
    pub wf_name: String,
    pub jsonyaml: ParamDoc,
}

/// Parsed batch file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct BatchFile {
    endpoints: BTreeMap<String, BTreeMap<String, BatchEntry>>,
}

/// A batch entry that was queued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchQueued {
    pub endpoint: String,
    pub sample: String,
    pub id: SubmissionId,
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<Self, OrchestratorError> {
        let invalid = |reason: String| OrchestratorError::InvalidBatch {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        Self::parse(&content).map_err(|e| invalid(e.to_string()))
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// `(endpoint, sample, entry)` in key order
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &BatchEntry)> {
        self.endpoints.iter().flat_map(|(endpoint, samples)| {
            samples
                .iter()
                .map(move |(sample, entry)| (endpoint.as_str(), sample.as_str(), entry))
        })
    }

    pub fn len(&self) -> usize {
        self.endpoints.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
