//! State document storage.
//!
//! The shared document is `{"indicators": {...}, "lastUpdated": "..."}`.
//! [`FileStore`] keeps it as a JSON file; other backends implement
//! [`SnapshotStore`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persisted indicator state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    /// Snapshot document; decoded leniently on merge.
    pub indicators: Value,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

/// Backend holding the shared state document.
pub trait SnapshotStore {
    /// Read the document, `Ok(None)` when it does not exist yet.
    fn load(&self) -> Result<Option<StoredState>>;

    /// Replace the document.
    fn save(&self, state: &StoredState) -> Result<()>;

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
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

impl SnapshotStore for FileStore {
    fn load(&self) -> Result<Option<StoredState>> {
        if !self.path.exists() {
            debug!("No state document at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        Ok(Some(state))
    }

    fn save(&self, state: &StoredState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(state)?;
        let temp = self.temp_path();
        fs::write(&temp, content)
            .with_context(|| format!("Failed to write state file: {}", temp.display()))?;
        fs::rename(&temp, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        debug!("Saved state document to {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("state.json"));
        let state = StoredState {
            indicators: json!({ "military": { "ussGeorgia": 60.0 } }),
            last_updated: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        };

        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
        assert!(!store.temp_path().exists());

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"lastUpdated\""));
    }

    #[test]
    fn test_corrupt_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }
}
