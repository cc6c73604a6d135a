//! Per-city weather state
//!
//! [`CityWeatherStore`] is a plain container with no synchronization of its
//! own; the feed actor is its only writer. [`FeedSnapshot`] is the read-only
//! copy the actor publishes to consumers after every change.

use std::collections::HashMap;

use crate::data::{City, CurrentWeather, DailySummary, TemperatureUnit};

/// Message shown when any fetch of a cycle fails
pub const LOAD_ERROR_MESSAGE: &str = "Problem loading weather";

/// Current weather and forecasts keyed by city
///
/// A city with no weather entry has either never been fetched or failed its
/// last fetch. The two cases are not distinguished.
#[derive(Debug, Clone, Default)]
pub struct CityWeatherStore {
    weather: HashMap<City, CurrentWeather>,
    forecasts: HashMap<City, Vec<DailySummary>>,
}

impl CityWeatherStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the weather snapshot for `city`
    pub fn set(&mut self, city: City, weather: CurrentWeather) {
        self.weather.insert(city, weather);
    }

    pub fn clear(&mut self, city: &City) {
        self.weather.remove(city);
    }

    pub fn get(&self, city: &City) -> Option<&CurrentWeather> {
        self.weather.get(city)
    }

    /// Stores the forecast for `city`; `None` removes it
    pub fn set_forecast(&mut self, city: City, summaries: Option<Vec<DailySummary>>) {
        match summaries {
            Some(summaries) => {
                self.forecasts.insert(city, summaries);
            }
            None => {
                self.forecasts.remove(&city);
            }
        }
    }

    pub fn forecast(&self, city: &City) -> Option<&[DailySummary]> {
        self.forecasts.get(city).map(Vec::as_slice)
    }

    /// Drops every current-weather entry; forecasts are kept
    pub fn clear_all(&mut self) {
        self.weather.clear();
    }

    pub fn weather(&self) -> &HashMap<City, CurrentWeather> {
        &self.weather
    }

    pub fn forecasts(&self) -> &HashMap<City, Vec<DailySummary>> {
        &self.forecasts
    }
}

/// Point-in-time view of the feed
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Saved cities, newest first
    pub cities: Vec<City>,
    /// Device location city included in the last whole-feed load
    pub current_location: Option<City>,
    pub weather: HashMap<City, CurrentWeather>,
    pub forecasts: HashMap<City, Vec<DailySummary>>,
    /// True while any fetch batch is outstanding
    pub is_loading: bool,
    /// First failure of the current cycle
    pub last_error: Option<String>,
    pub unit: TemperatureUnit,
}

impl FeedSnapshot {
    /// Cities in display order: the device location first, then saved cities
    pub fn feed(&self) -> Vec<City> {
        self.current_location
            .iter()
            .chain(self.cities.iter())
            .cloned()
            .collect()
    }

    pub fn weather_for(&self, city: &City) -> Option<&CurrentWeather> {
        self.weather.get(city)
    }

    pub fn has_weather(&self, city: &City) -> bool {
        self.weather.contains_key(city)
    }

    pub fn forecast_for(&self, city: &City) -> Option<&[DailySummary]> {
        self.forecasts.get(city).map(Vec::as_slice)
    }

    /// Current temperature of `city` rendered in the selected unit
    pub fn display_temperature(&self, city: &City) -> String {
        self.unit
            .display(self.weather_for(city).map(|weather| weather.main.temp))
    }
}
