//! Forecast aggregation
//!
//! The provider returns the 5-day forecast as roughly 40 three-hour samples,
//! with the first and last day usually partial. This module collapses them
//! into at most five daily summaries.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::{DailySummary, WeatherError};

/// Number of days kept from a forecast
const FORECAST_DAYS: usize = 5;

/// Length of the `YYYY-MM-DD` prefix of a sample timestamp
const DATE_PREFIX_LEN: usize = 10;

/// Condition part of a forecast sample
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleCondition {
    /// Condition group name, e.g. "Clouds"
    pub main: String,
    pub description: String,
    pub icon: String,
}

/// One three-hour forecast sample
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    /// Provider timestamp, `YYYY-MM-DD HH:MM:SS`
    pub timestamp: String,
    /// Temperature in Kelvin, if decodable
    pub temperature: Option<f64>,
    /// First weather entry of the sample, if any
    pub condition: Option<SampleCondition>,
}

impl ForecastSample {
    /// Extracts a sample from one element of the provider's `list`
    ///
    /// Returns `None` when the element has no `dt_txt`. Every other field is
    /// optional: an undecodable temperature or weather entry is simply left
    /// out of the day's statistics.
    pub fn from_value(entry: &Value) -> Option<Self> {
        let timestamp = entry.get("dt_txt")?.as_str()?.to_string();
        let temperature = entry
            .get("main")
            .and_then(|main| main.get("temp"))
            .and_then(Value::as_f64);
        let condition = entry
            .get("weather")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(Value::as_object)
            .map(|weather| {
                let field = |key: &str| {
                    weather
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                SampleCondition {
                    main: field("main"),
                    description: field("description"),
                    icon: field("icon"),
                }
            });

        Some(Self {
            timestamp,
            temperature,
            condition,
        })
    }

    /// The calendar date this sample belongs to
    pub fn date(&self) -> String {
        self.timestamp.chars().take(DATE_PREFIX_LEN).collect()
    }
}

/// Builds daily summaries from a raw forecast response body
///
/// # Arguments
/// * `body` - The decoded JSON response of the forecast endpoint
///
/// # Returns
/// * `Ok(Vec<DailySummary>)` - Up to five summaries in ascending date order
/// * `Err(WeatherError::MalformedForecast)` - If the body has no `list` array
pub fn aggregate_forecast(body: &Value) -> Result<Vec<DailySummary>, WeatherError> {
    let list = body
        .get("list")
        .and_then(Value::as_array)
        .ok_or(WeatherError::MalformedForecast)?;

    let samples: Vec<ForecastSample> = list.iter().filter_map(ForecastSample::from_value).collect();

    Ok(summarize(&samples))
}

/// Collapses forecast samples into at most five daily summaries
///
/// Samples are grouped by date and the first five dates in ascending order
/// are kept. Within a day, sample order is the input order: the dominant
/// condition is the first group name to reach the highest count, while the
/// description and icon come from the first sample that has a weather entry.
/// The two can disagree.
pub fn summarize(samples: &[ForecastSample]) -> Vec<DailySummary> {
    let mut days: BTreeMap<String, Vec<&ForecastSample>> = BTreeMap::new();
    for sample in samples {
        days.entry(sample.date()).or_default().push(sample);
    }

    days.into_iter()
        .take(FORECAST_DAYS)
        .map(|(date, entries)| summarize_day(date, &entries))
        .collect()
}

fn summarize_day(date: String, entries: &[&ForecastSample]) -> DailySummary {
    let temps: Vec<f64> = entries.iter().filter_map(|s| s.temperature).collect();
    let min_temp = temps.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max_temp = temps.iter().copied().reduce(f64::max).unwrap_or(0.0);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut dominant: Option<(&str, usize)> = None;
    let mut description = String::new();
    let mut icon = String::new();

    for condition in entries.iter().filter_map(|s| s.condition.as_ref()) {
        let count = counts.entry(condition.main.as_str()).or_insert(0);
        *count += 1;
        // Strictly greater: on a tie the earlier leader keeps its place
        if dominant.map_or(true, |(_, best)| *count > best) {
            dominant = Some((condition.main.as_str(), *count));
        }

        if description.is_empty() {
            description = condition.description.clone();
        }
        if icon.is_empty() {
            icon = condition.icon.clone();
        }
    }

    DailySummary {
        date,
        min_temp,
        max_temp,
        condition: dominant.map(|(main, _)| main.to_string()).unwrap_or_default(),
        description,
        icon,
    }
}
