//! In-memory settings store for tests and ephemeral runs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::{Persistence, PersistenceError};

/// Keeps settings in a map for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently holding a value
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Persistence for MemoryStore {
    fn read_value(&self, key: &str) -> Option<Value> {
        self.values().get(key).cloned()
    }

    fn write_value(&self, key: &str, value: Option<Value>) -> Result<(), PersistenceError> {
        let mut values = self.values();
        match value {
            Some(value) => values.insert(key.to_string(), value),
            None => values.remove(key),
        };
        Ok(())
    }
}
