//! Core data models for the weather feed
//!
//! This module contains the types shared by the provider, the feed and the
//! location coordinator: cities, current conditions as returned by the
//! provider, daily forecast summaries and the temperature unit used at the
//! display boundary. Temperatures are always Kelvin inside these types.

pub mod cities;
pub mod forecast;
pub mod openweather;
pub mod provider;

pub use cities::{default_cities, DEFAULT_CITIES};
pub use forecast::{aggregate_forecast, summarize, ForecastSample};
pub use openweather::{OpenWeatherClient, OpenWeatherGeocoder};
pub use provider::{ProviderStatus, WeatherError, WeatherProvider};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Base URL for condition icons
const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Offset between Kelvin and Celsius
const KELVIN_OFFSET: f64 = 273.15;

/// A city tracked by the user
///
/// Two cities are the same city when their name and country code match
/// case-insensitively. The `id` only identifies a particular entry in the
/// saved list and takes no part in equality or hashing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    /// Opaque identifier of this list entry
    pub id: Uuid,
    /// Display name, also used as the provider query
    pub name: String,
    /// ISO country code, empty for the current-location city
    pub country_code: String,
}

impl City {
    /// Creates a city with a fresh identifier
    pub fn new(name: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            country_code: country_code.into(),
        }
    }

    /// Creates the city entry used for the device location (no country code)
    pub fn current_location(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }

    /// Provider query string: `name` or `name,CC`
    pub fn query(&self) -> String {
        if self.country_code.is_empty() {
            self.name.clone()
        } else {
            format!("{},{}", self.name, self.country_code)
        }
    }
}

impl PartialEq for City {
    fn eq(&self, other: &Self) -> bool {
        self.name.to_lowercase() == other.name.to_lowercase()
            && self.country_code.to_lowercase() == other.country_code.to_lowercase()
    }
}

impl Eq for City {}

impl Hash for City {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.to_lowercase().hash(state);
        self.country_code.to_lowercase().hash(state);
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.country_code.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}, {}", self.name, self.country_code)
        }
    }
}

/// Geographic coordinates as reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
}

/// Size variants for condition icons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IconSize {
    #[default]
    Standard,
    Double,
    Quadruple,
}

impl IconSize {
    fn suffix(self) -> &'static str {
        match self {
            IconSize::Standard => "",
            IconSize::Double => "@2x",
            IconSize::Quadruple => "@4x",
        }
    }
}

/// Builds the URL of a provider condition icon
pub fn icon_url(code: &str, size: IconSize) -> String {
    format!("{}/{}{}.png", ICON_BASE_URL, code, size.suffix())
}

/// One weather condition entry; the first entry of a snapshot is the primary one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub id: i64,
    /// Condition group name, e.g. "Rain"
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl WeatherCondition {
    pub fn icon_url(&self, size: IconSize) -> String {
        icon_url(&self.icon, size)
    }
}

/// Atmospheric readings, temperatures in Kelvin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atmosphere {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Pressure in hPa
    pub pressure: f64,
    /// Relative humidity percentage (0-100)
    pub humidity: f64,
    #[serde(default)]
    pub sea_level: Option<f64>,
    #[serde(default)]
    pub grnd_level: Option<f64>,
}

/// Wind readings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// Speed in m/s
    pub speed: f64,
    /// Direction in degrees
    pub deg: f64,
    #[serde(default)]
    pub gust: Option<f64>,
}

/// Precipitation volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    /// Volume for the last hour in mm
    #[serde(rename = "1h", default)]
    pub one_hour: Option<f64>,
}

/// Cloud coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clouds {
    /// Coverage percentage
    pub all: f64,
}

/// Provider system block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(rename = "type", default)]
    pub kind: Option<i64>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub country: String,
    /// Sunrise as a unix timestamp
    pub sunrise: i64,
    /// Sunset as a unix timestamp
    pub sunset: i64,
}

/// Current conditions for one location
///
/// Replaced as a whole on every successful fetch and never patched field by
/// field. Field names follow the provider's JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub coord: Option<Coordinates>,
    /// Conditions, primary first
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
    /// Station source
    #[serde(default)]
    pub base: String,
    pub main: Atmosphere,
    /// Visibility in meters
    #[serde(default)]
    pub visibility: u32,
    pub wind: Wind,
    #[serde(default)]
    pub rain: Option<Precipitation>,
    pub clouds: Clouds,
    /// Observation time as a unix timestamp
    pub dt: i64,
    pub sys: SystemInfo,
    /// Shift from UTC in seconds
    #[serde(default)]
    pub timezone: i64,
    pub id: i64,
    pub name: String,
    pub cod: i64,
}

impl CurrentWeather {
    /// The primary condition, if the provider sent any
    pub fn primary_condition(&self) -> Option<&WeatherCondition> {
        self.weather.first()
    }

    /// Observation time
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.dt, 0)
    }
}

/// One day of the 5-day forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Minimum temperature in Kelvin
    pub min_temp: f64,
    /// Maximum temperature in Kelvin
    pub max_temp: f64,
    /// Most frequent condition group of the day
    pub condition: String,
    /// Description of the first sample with one
    pub description: String,
    /// Icon code of the first sample with one
    pub icon: String,
}

impl DailySummary {
    pub fn icon_url(&self, size: IconSize) -> String {
        icon_url(&self.icon, size)
    }
}

/// Persisted record of the device location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationData {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Unit used when rendering temperatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    Celsius,
    #[default]
    Fahrenheit,
}

impl TemperatureUnit {
    /// Persisted name of the unit
    pub fn as_str(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }

    /// Converts a Kelvin reading into this unit
    pub fn convert(self, kelvin: f64) -> f64 {
        let celsius = kelvin - KELVIN_OFFSET;
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }

    /// Renders a Kelvin reading rounded to whole degrees, or "-" when absent
    pub fn display(self, kelvin: Option<f64>) -> String {
        match kelvin {
            Some(k) => format!("{:.0}{}", self.convert(k), self.symbol()),
            None => "-".to_string(),
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "celsius" | "c" => Ok(TemperatureUnit::Celsius),
            "fahrenheit" | "f" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
