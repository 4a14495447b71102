//! Device-local key/value storage for the study client.
//!
//! Values are JSON documents kept in one file. A schema version key guards
//! the whole map: when it does not match [`STORAGE_VERSION`] every key is
//! dropped and readers get their defaults.
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STORAGE_VERSION: &str = "1.0";

pub mod keys {
    pub const VERSION: &str = "cquizy_version";
    pub const BOOKMARKS: &str = "cquizy_bookmarks";
    pub const LAST_POSITION: &str = "cquizy_lastPosition";
    pub const STATS: &str = "cquizy_stats";
    pub const STUDY_TIMER: &str = "studyTimer";
    pub const TIMER_ACTIVE: &str = "timerActive";
    pub const THEME: &str = "theme";
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Default)]
pub struct LocalStorage {
    path: Option<PathBuf>,
    entries: Map<String, Value>,
}

impl LocalStorage {
    /// Storage that lives only as long as the value.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens `path`, starting empty when the file is missing or unreadable.
    pub fn open(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("[Storage] Ignoring malformed storage file {:?}: {}", path, err);
                Map::new()
            }),
            Err(err) => {
                debug!("[Storage] Starting fresh storage at {:?} ({})", path, err);
                Map::new()
            }
        };

        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    fn version_matches(&self) -> bool {
        self.entries.get(keys::VERSION).and_then(Value::as_str) == Some(STORAGE_VERSION)
    }

    fn reset_if_stale(&mut self) {
        if !self.version_matches() {
            debug!("[Storage] Schema version changed, clearing storage");
            self.entries.clear();
            self.entries
                .insert(keys::VERSION.to_string(), Value::from(STORAGE_VERSION));
            if let Err(err) = self.flush() {
                warn!("[Storage] Failed to persist storage reset: {}", err);
            }
        }
    }

    /// Reads `key`, falling back to `default` when it is absent, unreadable or
    /// the storage schema is stale.
    pub fn get_or<T: DeserializeOwned>(&mut self, key: &str, default: T) -> T {
        self.reset_if_stale();
        match self.entries.get(key) {
            None => default,
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|err| {
                warn!("[Storage] Error reading {}: {}", key, err);
                default
            }),
        }
    }

    pub fn get<T: DeserializeOwned + Default>(&mut self, key: &str) -> T {
        self.get_or(key, T::default())
    }

    /// Writes `key`, dropping stale entries first.
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.reset_if_stale();
        self.entries
            .insert(key.to_string(), serde_json::to_value(value)?);
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        if let Some(path) = &self.path {
            fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        }
        Ok(())
    }
}
