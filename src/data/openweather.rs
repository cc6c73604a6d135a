//! OpenWeather API client
//!
//! This module fetches current conditions and the 5-day forecast from the
//! OpenWeather API, mapping HTTP failures onto [`WeatherError`]. It also
//! provides a reverse geocoder backed by the OpenWeather geocoding API, used
//! when a position is supplied on the command line.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::location::{Geocoder, LocationError, Placemark};

use super::forecast::aggregate_forecast;
use super::provider::{ProviderStatus, WeatherError, WeatherProvider};
use super::{City, CurrentWeather, DailySummary};

/// Base URL for the OpenWeather API
const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Base URL for the OpenWeather geocoding API
const OPENWEATHER_GEO_URL: &str = "https://api.openweathermap.org/geo/1.0";

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Error body sent by the provider on non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    cod: RawCode,
    message: String,
}

/// The provider sends `cod` either as a string or a number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCode {
    Text(String),
    Number(i64),
}

impl RawCode {
    fn into_string(self) -> String {
        match self {
            RawCode::Text(s) => s,
            RawCode::Number(n) => n.to_string(),
        }
    }
}

/// Client for fetching weather data from the OpenWeather API
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherClient {
    /// Create a new OpenWeatherClient with default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, api_key)
    }

    /// Create a new OpenWeatherClient with a custom HTTP client
    pub fn with_client(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: OPENWEATHER_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different server, e.g. a mock
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Performs one GET and returns the body of a successful response
    async fn get(
        &self,
        endpoint: &str,
        query: &str,
        not_found_message: String,
    ) -> Result<String, WeatherError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(%url, query, "requesting weather data");

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("appid", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        check_status(status, &text, not_found_message)?;
        Ok(text)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    /// Fetch current conditions, querying `name,CC` when a country code is set
    async fn fetch_current_weather(&self, city: &City) -> Result<CurrentWeather, WeatherError> {
        let text = self
            .get(
                "weather",
                &city.query(),
                format!("City '{}' not found", city.name),
            )
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch the forecast, querying by name only
    async fn fetch_forecast(&self, city: &City) -> Result<Vec<DailySummary>, WeatherError> {
        let text = self
            .get("forecast", &city.name, "Forecast not found".to_string())
            .await?;
        let body: serde_json::Value = serde_json::from_str(&text)?;
        aggregate_forecast(&body)
    }
}

/// One result of the reverse geocoding endpoint
#[derive(Debug, Deserialize)]
struct GeoPlace {
    name: String,
    #[serde(default)]
    state: Option<String>,
}

/// Reverse geocoder backed by the OpenWeather geocoding API
#[derive(Debug, Clone)]
pub struct OpenWeatherGeocoder {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenWeatherGeocoder {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.into(),
            base_url: OPENWEATHER_GEO_URL.to_string(),
        }
    }

    /// Point the geocoder at a different server, e.g. a mock
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Geocoder for OpenWeatherGeocoder {
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Placemark>, LocationError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("limit", "1".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| LocationError::Geocode(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LocationError::Geocode(format!("HTTP {}", status.as_u16())));
        }

        let places: Vec<GeoPlace> = response
            .json()
            .await
            .map_err(|e| LocationError::Geocode(e.to_string()))?;

        Ok(places.into_iter().next().map(|place| Placemark {
            locality: Some(place.name.clone()),
            sub_administrative_area: place.state,
            name: Some(place.name),
        }))
    }
}

/// Maps a response status onto the provider error taxonomy
///
/// # Arguments
/// * `code` - HTTP status code
/// * `body` - Raw response body, inspected only for unexpected statuses
/// * `not_found_message` - Message used for 404 responses
fn check_status(code: u16, body: &str, not_found_message: String) -> Result<(), WeatherError> {
    match ProviderStatus::from_http(code) {
        ProviderStatus::Ok => Ok(()),
        ProviderStatus::Unauthorized => Err(WeatherError::Provider {
            status: ProviderStatus::Unauthorized,
            message: "Invalid API key".to_string(),
        }),
        ProviderStatus::LocationNotFound => Err(WeatherError::Provider {
            status: ProviderStatus::LocationNotFound,
            message: not_found_message,
        }),
        ProviderStatus::Other(raw) => Err(match serde_json::from_str::<ErrorBody>(body) {
            Ok(error) => WeatherError::Provider {
                status: ProviderStatus::from_raw(&error.cod.into_string()),
                message: error.message,
            },
            Err(_) => WeatherError::Provider {
                status: ProviderStatus::Other(raw),
                message: format!("HTTP {}", code),
            },
        }),
    }
}
