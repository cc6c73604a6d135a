//! Saved city list
//!
//! Owns the ordered, deduplicated list of cities the user tracks and writes
//! it through to persistence on every change.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::data::{default_cities, City, LocationData};
use crate::persistence::Persistence;

/// Ordered list of user-tracked cities
///
/// Newest cities come first. Uniqueness follows `City` equality, so "miami"
/// and "Miami" with the same country code are the same entry.
pub struct CityListManager {
    persistence: Arc<dyn Persistence>,
    cities: Vec<City>,
}

impl CityListManager {
    /// Loads the saved list, seeding it with the default cities when empty
    pub fn load(persistence: Arc<dyn Persistence>) -> Self {
        let cities = persistence.load_cities();
        let mut manager = Self {
            persistence,
            cities,
        };
        if manager.cities.is_empty() {
            debug!("no saved cities, seeding defaults");
            manager.cities = default_cities();
            manager.save();
        }
        manager
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn contains(&self, city: &City) -> bool {
        self.cities.contains(city)
    }

    /// Prepends `city` unless an equal city is already saved
    ///
    /// # Returns
    /// * `true` if the city was added
    /// * `false` if it was a duplicate
    pub fn add(&mut self, city: City) -> bool {
        if self.contains(&city) {
            return false;
        }
        self.cities.insert(0, city);
        self.save();
        true
    }

    /// Removes the entry with the given identifier
    pub fn remove(&mut self, id: Uuid) -> Option<City> {
        let index = self.cities.iter().position(|c| c.id == id)?;
        let removed = self.cities.remove(index);
        self.save();
        Some(removed)
    }

    /// Replaces the whole list with the default cities
    pub fn reset(&mut self) {
        self.cities = default_cities();
        self.save();
    }

    fn save(&self) {
        if let Err(err) = self.persistence.save_cities(&self.cities) {
            warn!(error = %err, "failed to save city list");
        }
    }
}

/// Builds the display feed: the device location first, then saved cities
pub fn feed_cities(current_location: Option<&LocationData>, saved: &[City]) -> Vec<City> {
    current_location
        .filter(|location| !location.city.is_empty())
        .map(|location| City::current_location(location.city.clone()))
        .into_iter()
        .chain(saved.iter().cloned())
        .collect()
}
