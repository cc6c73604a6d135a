//! Weather provider interface
//!
//! The feed and the location coordinator only talk to weather data through
//! [`WeatherProvider`], so tests can swap in scripted implementations.

use async_trait::async_trait;
use thiserror::Error;

use super::{City, CurrentWeather, DailySummary};

/// Semantic outcome reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Ok,
    LocationNotFound,
    Unauthorized,
    /// Any other code, kept verbatim
    Other(String),
}

impl ProviderStatus {
    /// Maps an HTTP status code
    pub fn from_http(code: u16) -> Self {
        match code {
            200..=299 => ProviderStatus::Ok,
            401 => ProviderStatus::Unauthorized,
            404 => ProviderStatus::LocationNotFound,
            other => ProviderStatus::Other(other.to_string()),
        }
    }

    /// Maps the `cod` field of a provider error body
    pub fn from_raw(code: &str) -> Self {
        match code {
            "200" => ProviderStatus::Ok,
            "401" => ProviderStatus::Unauthorized,
            "404" => ProviderStatus::LocationNotFound,
            other => ProviderStatus::Other(other.to_string()),
        }
    }
}

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Transport failure or timeout
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with a semantic error
    #[error("{message}")]
    Provider {
        status: ProviderStatus,
        message: String,
    },

    /// Response body did not have the expected shape
    #[error("Failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Forecast body without a `list` container
    #[error("Malformed forecast data")]
    MalformedForecast,
}

impl WeatherError {
    /// Semantic status carried by this error
    pub fn status(&self) -> ProviderStatus {
        match self {
            WeatherError::Network(_) => ProviderStatus::Other("network".to_string()),
            WeatherError::Provider { status, .. } => status.clone(),
            WeatherError::Parse(_) => ProviderStatus::Other("parse".to_string()),
            WeatherError::MalformedForecast => {
                ProviderStatus::Other("No list in response".to_string())
            }
        }
    }

    /// Short message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self.status() {
            ProviderStatus::LocationNotFound => "City not found. Please try again.".to_string(),
            ProviderStatus::Unauthorized => "Weather unavailable.".to_string(),
            ProviderStatus::Ok => "Weather unavailable.".to_string(),
            ProviderStatus::Other(code) => format!("Weather error ({}). Please try again.", code),
        }
    }
}

/// Source of current conditions and forecasts for a single city
///
/// Implementations perform exactly one attempt per call; retrying is up to
/// the caller.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetches current conditions for `city`
    async fn fetch_current_weather(&self, city: &City) -> Result<CurrentWeather, WeatherError>;

    /// Fetches up to five daily summaries for `city`, ascending by date
    async fn fetch_forecast(&self, city: &City) -> Result<Vec<DailySummary>, WeatherError>;
}
