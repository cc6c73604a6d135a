//! Persisted user settings
//!
//! The saved city list, the last known device location, the temperature
//! unit and the onboarding flag are kept behind the [`Persistence`] port.
//! Components receive it as a constructor dependency. Values are stored as
//! JSON under fixed keys; the layout is opaque to the rest of the crate.

mod file_store;
mod memory;

pub use file_store::FileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::data::{City, LocationData};

/// Key of the saved city list
pub const SAVED_CITIES_KEY: &str = "saved_cities";
/// Key of the last resolved device location
pub const CURRENT_LOCATION_KEY: &str = "current_location";
/// Key of the preferred temperature unit
pub const TEMPERATURE_UNIT_KEY: &str = "temperature_unit";
/// Key of the onboarding flag
pub const ONBOARDING_KEY: &str = "completed_onboarding";

/// Errors that can occur when writing settings
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the backing file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The value could not be serialized
    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key/value store for user settings
///
/// Implementors provide raw JSON access; the typed accessors are built on
/// top. Reads never fail: a missing or undecodable value reads as absent.
pub trait Persistence: Send + Sync {
    /// Returns the stored value for `key`, if any
    fn read_value(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key`, or removes the key when `value` is `None`
    fn write_value(&self, key: &str, value: Option<Value>) -> Result<(), PersistenceError>;

    fn load_cities(&self) -> Vec<City> {
        decode(self, SAVED_CITIES_KEY).unwrap_or_default()
    }

    fn save_cities(&self, cities: &[City]) -> Result<(), PersistenceError> {
        self.write_value(SAVED_CITIES_KEY, Some(serde_json::to_value(cities)?))
    }

    fn load_current_location(&self) -> Option<LocationData> {
        decode(self, CURRENT_LOCATION_KEY)
    }

    /// Stores the device location; `None` clears it
    fn save_current_location(&self, data: Option<&LocationData>) -> Result<(), PersistenceError> {
        let value = data.map(serde_json::to_value).transpose()?;
        self.write_value(CURRENT_LOCATION_KEY, value)
    }

    fn load_temperature_unit(&self) -> Option<String> {
        decode(self, TEMPERATURE_UNIT_KEY)
    }

    fn save_temperature_unit(&self, unit: &str) -> Result<(), PersistenceError> {
        self.write_value(TEMPERATURE_UNIT_KEY, Some(Value::from(unit)))
    }

    fn load_onboarding_completed(&self) -> bool {
        decode(self, ONBOARDING_KEY).unwrap_or(false)
    }

    fn save_onboarding_completed(&self, completed: bool) -> Result<(), PersistenceError> {
        self.write_value(ONBOARDING_KEY, Some(Value::Bool(completed)))
    }
}

fn decode<T, P>(store: &P, key: &str) -> Option<T>
where
    T: DeserializeOwned,
    P: Persistence + ?Sized,
{
    let value = store.read_value(key)?;
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            warn!(key, error = %err, "ignoring undecodable stored value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors_roundtrip() {
        let store = MemoryStore::new();
        let cities = vec![City::new("Ann Arbor", "US"), City::new("Lisbon", "PT")];
        let location = LocationData {
            city: "Vancouver".to_string(),
            latitude: 49.28,
            longitude: -123.12,
        };

        store.save_cities(&cities).expect("Failed to save cities");
        store
            .save_current_location(Some(&location))
            .expect("Failed to save location");
        store
            .save_temperature_unit("celsius")
            .expect("Failed to save unit");
        store
            .save_onboarding_completed(true)
            .expect("Failed to save onboarding");

        let loaded = store.load_cities();
        assert_eq!(loaded, cities);
        assert_eq!(loaded[0].id, cities[0].id);
        assert_eq!(store.load_current_location(), Some(location));
        assert_eq!(store.load_temperature_unit().as_deref(), Some("celsius"));
        assert!(store.load_onboarding_completed());
    }

    #[test]
    fn test_missing_values_read_as_absent() {
        let store = MemoryStore::new();
        assert!(store.load_cities().is_empty());
        assert!(store.load_current_location().is_none());
        assert!(store.load_temperature_unit().is_none());
        assert!(!store.load_onboarding_completed());
    }

    #[test]
    fn test_clearing_current_location() {
        let store = MemoryStore::new();
        let location = LocationData {
            city: "Lisbon".to_string(),
            latitude: 38.72,
            longitude: -9.14,
        };
        store
            .save_current_location(Some(&location))
            .expect("Failed to save location");
        store
            .save_current_location(None)
            .expect("Failed to clear location");

        assert!(store.load_current_location().is_none());
        assert!(store.read_value(CURRENT_LOCATION_KEY).is_none());
    }

    #[test]
    fn test_undecodable_value_reads_as_absent() {
        let store = MemoryStore::new();
        store
            .write_value(SAVED_CITIES_KEY, Some(Value::from("not a list")))
            .expect("Failed to write value");

        assert!(store.load_cities().is_empty());
    }
}
