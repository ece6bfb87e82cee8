//! Persistence backends for the queue document.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::document::QueueDocument;
use super::store::StoreError;

/// Loads and saves the whole queue document
pub trait DocumentBackend: Send + Sync {
    /// Read the full document
    fn load(&self) -> Result<QueueDocument, StoreError>;

    /// Replace the full document; readers see either the old or the new one
    fn save(&self, document: &QueueDocument) -> Result<(), StoreError>;

    /// Human-readable location for logs and errors
    fn location(&self) -> String;
}

/// JSON file backend with write-then-rename replacement
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl DocumentBackend for JsonFileBackend {
    fn load(&self) -> Result<QueueDocument, StoreError> {
        if !self.path.exists() {
            return Ok(QueueDocument::new());
        }

        let json = fs::read_to_string(&self.path)?;
        if json.trim().is_empty() {
            return Ok(QueueDocument::new());
        }

        serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
            location: self.location(),
            reason: e.to_string(),
        })
    }

    fn save(&self, document: &QueueDocument) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(document).map_err(StoreError::Encode)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to temp file first
        let temp_path = self.temp_path();
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        // Atomic rename
        fs::rename(&temp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), bytes = json.len(), "Queue document saved");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-process backend, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryBackend {
    document: Mutex<QueueDocument>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document
    pub fn with_document(document: QueueDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }
}

impl DocumentBackend for MemoryBackend {
    fn load(&self) -> Result<QueueDocument, StoreError> {
        self.document
            .lock()
            .map(|document| document.clone())
            .map_err(|_| StoreError::LockPoisoned)
    }

    fn save(&self, document: &QueueDocument) -> Result<(), StoreError> {
        let mut current = self.document.lock().map_err(|_| StoreError::LockPoisoned)?;
        *current = document.clone();
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_queue() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("queue.json"));
        assert!(backend.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("queue.json");
        let backend = JsonFileBackend::new(&path);

        backend.save(&QueueDocument::new()).unwrap();

        assert!(path.exists());
        assert!(!backend.temp_path().exists());
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn test_unparseable_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(&path, "{\"local\": {\"1\": ").unwrap();

        let err = JsonFileBackend::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got {:?}", err);
    }

    #[test]
    fn test_schema_violation_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("queue.json");
        fs::write(
            &path,
            r#"{"local": {"20261019120000000001": {
                "status": "COMPLETE",
                "data": {"wf": "w.cwl", "jsonyaml": "p.json", "attachments": []},
                "wf_id": "w", "type": "CWL", "sample": "NA"
            }}}"#,
        )
        .unwrap();

        let err = JsonFileBackend::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }), "got {:?}", err);
    }
}
