//! Persistence of the polling watermark.
//!
//! The state file is a small JSON document holding the time of the last
//! completed check. Read and write failures are logged and never fatal: a
//! lost watermark only means the next run behaves like a first run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Watermark timestamp format. Fixed-width, so it compares lexically.
pub const WATERMARK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// On-disk state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollState {
    /// When the last check started, in [`WATERMARK_FORMAT`].
    #[serde(default)]
    pub last_check_time: Option<String>,
}

/// The current local time as a watermark.
pub fn now_watermark() -> String {
    Local::now().format(WATERMARK_FORMAT).to_string()
}

/// Reads and writes the state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the state file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last watermark.
    ///
    /// Returns `None` when the file is missing, unreadable or malformed.
    pub fn load(&self) -> Option<String> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to read state file {:?}: {}", self.path, e);
                }
                return None;
            }
        };

        match serde_json::from_str::<PollState>(&content) {
            Ok(state) => state
                .last_check_time
                .map(|time| time.trim().to_string())
                .filter(|time| !time.is_empty()),
            Err(e) => {
                warn!("Failed to parse state file {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Persist a new watermark, creating the parent directory if needed.
    pub fn save(&self, last_check_time: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let state = PollState {
            last_check_time: Some(last_check_time.to_string()),
        };
        let content = serde_json::to_string_pretty(&state)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, content)?;
        debug!("Saved watermark {} to {:?}", last_check_time, self.path);
        Ok(())
    }

    /// Persist a watermark, logging instead of failing.
    pub fn save_or_log(&self, last_check_time: &str) {
        if let Err(e) = self.save(last_check_time) {
            error!("Failed to write state file {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));

        store.save("2024-06-01 12:00:00").unwrap();

        assert_eq!(store.load().as_deref(), Some("2024-06-01 12:00:00"));
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"last_check_time\""));
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();
        assert!(StateStore::new(path).load().is_none());
    }

    #[test]
    fn test_load_without_time() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{}").unwrap();
        assert!(StateStore::new(path).load().is_none());
    }

    #[test]
    fn test_now_watermark_format() {
        let now = now_watermark();
        assert_eq!(now.len(), 19);
        assert_eq!(&now[4..5], "-");
        assert_eq!(&now[10..11], " ");
    }
}
