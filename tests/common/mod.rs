//! Shared fakes for integration tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use weatherfeed::data::{
    City, CurrentWeather, DailySummary, ProviderStatus, WeatherError, WeatherProvider,
};

/// Temperature returned for cities without a scripted one
pub const DEFAULT_TEMP: f64 = 288.15;

/// Builds a current-weather body the way the provider sends it
pub fn weather_named(name: &str, temp: f64) -> CurrentWeather {
    serde_json::from_value(json!({
        "coord": { "lon": -123.12, "lat": 49.28 },
        "weather": [
            { "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }
        ],
        "base": "stations",
        "main": {
            "temp": temp,
            "feels_like": temp,
            "temp_min": temp,
            "temp_max": temp,
            "pressure": 1013,
            "humidity": 60
        },
        "visibility": 10000,
        "wind": { "speed": 3.6, "deg": 250 },
        "clouds": { "all": 0 },
        "dt": 1_721_052_000,
        "sys": { "country": "", "sunrise": 1_721_019_000, "sunset": 1_721_075_000 },
        "timezone": 0,
        "id": 1,
        "name": name,
        "cod": 200
    }))
    .expect("Failed to build weather body")
}

pub fn summary(date: &str) -> DailySummary {
    DailySummary {
        date: date.to_string(),
        min_temp: 283.0,
        max_temp: 295.0,
        condition: "Clear".to_string(),
        description: "clear sky".to_string(),
        icon: "01d".to_string(),
    }
}

fn not_found(city: &City) -> WeatherError {
    WeatherError::Provider {
        status: ProviderStatus::LocationNotFound,
        message: format!("City '{}' not found", city.name),
    }
}

/// Provider answering from scripted tables
///
/// Every city succeeds with [`DEFAULT_TEMP`] unless it has been marked as
/// failing. A gated city waits for its gate to be opened before answering.
#[derive(Default)]
pub struct ScriptedProvider {
    temps: Mutex<HashMap<String, f64>>,
    failing: Mutex<HashSet<String>>,
    failing_forecasts: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    weather_calls: Mutex<Vec<String>>,
    forecast_calls: Mutex<Vec<String>>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_temp(&self, name: &str, temp: f64) {
        self.temps.lock().unwrap().insert(key(name), temp);
    }

    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().insert(key(name));
    }

    pub fn recover(&self, name: &str) {
        self.failing.lock().unwrap().remove(&key(name));
    }

    pub fn fail_forecast(&self, name: &str) {
        self.failing_forecasts.lock().unwrap().insert(key(name));
    }

    /// Holds weather fetches for `name` until the returned gate is notified
    pub fn gate(&self, name: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(key(name), gate.clone());
        gate
    }

    pub fn weather_calls(&self) -> Vec<String> {
        self.weather_calls.lock().unwrap().clone()
    }

    pub fn forecast_calls(&self) -> Vec<String> {
        self.forecast_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn fetch_current_weather(&self, city: &City) -> Result<CurrentWeather, WeatherError> {
        self.weather_calls.lock().unwrap().push(city.name.clone());
        let gate = self.gates.lock().unwrap().get(&key(&city.name)).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.lock().unwrap().contains(&key(&city.name)) {
            return Err(not_found(city));
        }
        let temp = self
            .temps
            .lock()
            .unwrap()
            .get(&key(&city.name))
            .copied()
            .unwrap_or(DEFAULT_TEMP);
        Ok(weather_named(&city.name, temp))
    }

    async fn fetch_forecast(&self, city: &City) -> Result<Vec<DailySummary>, WeatherError> {
        self.forecast_calls.lock().unwrap().push(city.name.clone());
        if self.failing_forecasts.lock().unwrap().contains(&key(&city.name)) {
            return Err(not_found(city));
        }
        Ok(vec![summary("2024-07-15"), summary("2024-07-16")])
    }
}
