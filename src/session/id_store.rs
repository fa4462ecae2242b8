//! Durable session-id persistence
//!
//! When the agent process issues a durable session id mid-stream, it is saved
//! here immediately so a crashed executor can resume from the furthest known
//! point instead of from scratch.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::CoreResult;

/// Default directory for session-id storage
const SESSIONS_DIR: &str = "sessions";

/// One persisted session id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSessionId {
    /// The durable session id issued by the agent process
    pub session_id: String,
    /// When it was observed
    pub saved_at: DateTime<Utc>,
}

/// Disk-backed map of session key → durable session id
#[derive(Debug, Clone)]
pub struct SessionIdStore {
    base_dir: PathBuf,
}

impl SessionIdStore {
    /// Create a store under the default directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(SESSIONS_DIR),
        }
    }

    /// Create a store under a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
        }
    }

    fn map_path(&self) -> PathBuf {
        self.base_dir.join("session_ids.json")
    }

    fn load_map(&self) -> CoreResult<HashMap<String, SavedSessionId>> {
        let path = self.map_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let map = serde_json::from_reader(reader)?;
        Ok(map)
    }

    fn store_map(&self, map: &HashMap<String, SavedSessionId>) -> CoreResult<()> {
        if !self.base_dir.exists() {
            fs::create_dir_all(&self.base_dir)?;
        }
        let file = File::create(self.map_path())?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, map)?;
        Ok(())
    }

    /// Persist a durable session id for a session key
    pub fn save(&self, key: &str, session_id: &str) -> CoreResult<()> {
        let mut map = self.load_map()?;
        map.insert(
            key.to_string(),
            SavedSessionId {
                session_id: session_id.to_string(),
                saved_at: Utc::now(),
            },
        );
        self.store_map(&map)
    }

    /// Load the durable session id for a session key
    pub fn load(&self, key: &str) -> CoreResult<Option<String>> {
        let map = self.load_map()?;
        Ok(map.get(key).map(|saved| saved.session_id.clone()))
    }

    /// Remove the saved id for a session key
    pub fn remove(&self, key: &str) -> CoreResult<()> {
        let mut map = self.load_map()?;
        if map.remove(key).is_some() {
            self.store_map(&map)?;
        }
        Ok(())
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for SessionIdStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (SessionIdStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionIdStore::with_dir(temp_dir.path());
        (store, temp_dir)
    }

    #[test]
    fn test_save_load() {
        let (store, _temp) = create_test_store();

        assert_eq!(store.load("task-1").unwrap(), None);

        store.save("task-1", "durable-abc").unwrap();
        assert_eq!(store.load("task-1").unwrap().as_deref(), Some("durable-abc"));
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let (store, _temp) = create_test_store();

        store.save("task-1", "first").unwrap();
        store.save("task-1", "second").unwrap();

        assert_eq!(store.load("task-1").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_remove() {
        let (store, _temp) = create_test_store();

        store.save("task-1", "durable-abc").unwrap();
        store.remove("task-1").unwrap();

        assert_eq!(store.load("task-1").unwrap(), None);
    }

    #[test]
    fn test_keys_are_independent() {
        let (store, _temp) = create_test_store();

        store.save("task-1", "id-1").unwrap();
        store.save("task-1:planner", "id-2").unwrap();

        assert_eq!(store.load("task-1").unwrap().as_deref(), Some("id-1"));
        assert_eq!(store.load("task-1:planner").unwrap().as_deref(), Some("id-2"));
    }
}
