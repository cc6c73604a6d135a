//! File-backed settings store
//!
//! Stores each key as a JSON file in an XDG-compliant data directory
//! (`~/.local/share/weatherfeed/` on Linux).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Persistence, PersistenceError};

/// Wrapper struct for values stored on disk
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    /// The stored value
    data: Value,
    /// When the value was written
    saved_at: DateTime<Utc>,
}

/// Persists settings as one JSON file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where settings files are stored
    data_dir: PathBuf,
}

impl FileStore {
    /// Creates a new FileStore using the XDG-compliant data directory
    ///
    /// Returns `None` if the directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "weatherfeed")?;
        let data_dir = project_dirs.data_dir().to_path_buf();
        Some(Self { data_dir })
    }

    /// Creates a new FileStore with a custom directory
    pub fn with_dir(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Directory the settings files live in
    pub fn dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the path to the settings file for the given key
    fn entry_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

impl Persistence for FileStore {
    fn read_value(&self, key: &str) -> Option<Value> {
        let content = fs::read_to_string(self.entry_path(key)).ok()?;
        let entry: StoredEntry = serde_json::from_str(&content).ok()?;
        Some(entry.data)
    }

    fn write_value(&self, key: &str, value: Option<Value>) -> Result<(), PersistenceError> {
        let path = self.entry_path(key);
        let Some(data) = value else {
            return match fs::remove_file(&path) {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
                _ => Ok(()),
            };
        };

        fs::create_dir_all(&self.data_dir)?;
        let entry = StoredEntry {
            data,
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&entry)?;
        fs::write(path, json)?;
        Ok(())
    }
}
