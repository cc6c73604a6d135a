//! Static default city list
//!
//! The saved city list is seeded from this table on first run and restored
//! from it when the user resets their cities.

use super::City;

/// A built-in city entry
///
/// Uses `&'static str` so the table can be initialized statically. Call
/// [`default_cities`] to get owned `City` values with fresh identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultCity {
    pub name: &'static str,
    pub country_code: &'static str,
}

/// Cities shown on first run
pub static DEFAULT_CITIES: [DefaultCity; 6] = [
    DefaultCity {
        name: "Los Angeles",
        country_code: "US",
    },
    DefaultCity {
        name: "San Francisco",
        country_code: "US",
    },
    DefaultCity {
        name: "Austin",
        country_code: "US",
    },
    DefaultCity {
        name: "Lisbon",
        country_code: "PT",
    },
    DefaultCity {
        name: "Auckland",
        country_code: "NZ",
    },
    DefaultCity {
        name: "Ann Arbor",
        country_code: "US",
    },
];

/// Returns the default cities in display order
pub fn default_cities() -> Vec<City> {
    DEFAULT_CITIES
        .iter()
        .map(|c| City::new(c.name, c.country_code))
        .collect()
}
