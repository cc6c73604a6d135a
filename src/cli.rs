//! Command-line interface parsing for weatherfeed
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into a [`RunConfig`] for the binary. The API key may also come from the
//! `OPENWEATHER_API_KEY` environment variable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::data::{City, TemperatureUnit};

/// Environment variable holding the OpenWeather API key
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified unit name is not recognized
    #[error("Invalid unit: '{0}'. Valid units: celsius, fahrenheit")]
    InvalidUnit(String),

    /// A city name was empty
    #[error("City name must not be empty")]
    EmptyCityName,

    /// The command needs to fetch weather but no key was given
    #[error("Missing API key: pass --api-key or set OPENWEATHER_API_KEY")]
    MissingApiKey,
}

/// weatherfeed - Current weather and 5-day forecasts for your cities
#[derive(Parser, Debug)]
#[command(name = "weatherfeed")]
#[command(about = "Current weather and 5-day forecasts for your saved cities")]
#[command(version)]
pub struct Cli {
    /// OpenWeather API key
    #[arg(long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory for saved cities and settings (defaults to the XDG data dir)
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Temperature unit to display and remember: celsius or fahrenheit
    #[arg(long, value_name = "UNIT")]
    pub unit: Option<String>,

    /// Clear previously loaded weather before fetching
    #[arg(long)]
    pub refresh: bool,

    /// Also load the 5-day forecast for every city
    #[arg(long)]
    pub forecast: bool,

    /// Latitude of the current location
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude of the current location
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands; without one the feed is shown
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Show current weather for every city (default)
    Show,
    /// List saved cities
    List,
    /// Add a city to the top of the list
    Add {
        /// City name, e.g. "Ann Arbor"
        name: String,
        /// Two-letter country code, e.g. US
        #[arg(default_value = "")]
        country: String,
    },
    /// Remove a saved city
    Remove {
        name: String,
        #[arg(default_value = "")]
        country: String,
    },
    /// Restore the default cities
    Reset,
}

/// What the binary should do
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Show,
    List,
    Add(City),
    Remove(City),
    Reset,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub action: Action,
    pub api_key: Option<String>,
    pub data_dir: Option<PathBuf>,
    /// Unit to switch to, if one was given
    pub unit: Option<TemperatureUnit>,
    pub refresh: bool,
    pub forecast: bool,
    /// Current location as (latitude, longitude)
    pub position: Option<(f64, f64)>,
    pub verbose: bool,
}

/// Parses a unit string argument into a TemperatureUnit.
///
/// # Arguments
/// * `s` - The unit string from CLI
///
/// # Returns
/// * `Ok(TemperatureUnit)` if the string names a unit
/// * `Err(CliError::InvalidUnit)` if it doesn't
pub fn parse_unit_arg(s: &str) -> Result<TemperatureUnit, CliError> {
    s.parse().map_err(|_| CliError::InvalidUnit(s.to_string()))
}

fn parse_city_arg(name: &str, country: &str) -> Result<City, CliError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::EmptyCityName);
    }
    Ok(City::new(name, country.trim().to_uppercase()))
}

impl RunConfig {
    /// Creates a RunConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(RunConfig)` with the requested action and settings
    /// * `Err(CliError)` if a unit or city argument is invalid
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let action = match cli.command.as_ref().unwrap_or(&Commands::Show) {
            Commands::Show => Action::Show,
            Commands::List => Action::List,
            Commands::Add { name, country } => Action::Add(parse_city_arg(name, country)?),
            Commands::Remove { name, country } => Action::Remove(parse_city_arg(name, country)?),
            Commands::Reset => Action::Reset,
        };
        let unit = cli.unit.as_deref().map(parse_unit_arg).transpose()?;
        let api_key = cli
            .api_key
            .as_ref()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(RunConfig {
            action,
            api_key,
            data_dir: cli.data_dir.clone(),
            unit,
            refresh: cli.refresh,
            forecast: cli.forecast,
            position: cli.lat.zip(cli.lon),
            verbose: cli.verbose,
        })
    }

    /// Whether this run talks to the weather provider
    pub fn needs_api_key(&self) -> bool {
        matches!(self.action, Action::Show)
    }

    /// The API key, if this run needs one
    pub fn require_api_key(&self) -> Result<&str, CliError> {
        self.api_key.as_deref().ok_or(CliError::MissingApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_arg() {
        assert_eq!(parse_unit_arg("celsius").unwrap(), TemperatureUnit::Celsius);
        assert_eq!(parse_unit_arg("C").unwrap(), TemperatureUnit::Celsius);
        assert_eq!(
            parse_unit_arg("fahrenheit").unwrap(),
            TemperatureUnit::Fahrenheit
        );
    }

    #[test]
    fn test_parse_unit_arg_invalid() {
        let err = parse_unit_arg("kelvin").unwrap_err();
        assert!(err.to_string().contains("Invalid unit"));
        assert!(err.to_string().contains("kelvin"));
    }

    #[test]
    fn test_cli_parse_no_args_shows_feed() {
        let cli = Cli::parse_from(["weatherfeed", "--api-key", "abc"]);
        let config = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(config.action, Action::Show);
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert!(config.unit.is_none());
        assert!(config.position.is_none());
        assert!(config.needs_api_key());
    }

    #[test]
    fn test_cli_parse_add_city() {
        let cli = Cli::parse_from(["weatherfeed", "add", "Miami", "us"]);
        let config = RunConfig::from_cli(&cli).unwrap();
        match &config.action {
            Action::Add(city) => {
                assert_eq!(city.name, "Miami");
                assert_eq!(city.country_code, "US");
            }
            other => panic!("Expected add action, got {:?}", other),
        }
        assert!(!config.needs_api_key());
    }

    #[test]
    fn test_cli_parse_add_without_country() {
        let cli = Cli::parse_from(["weatherfeed", "add", "Reykjavik"]);
        let config = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(config.action, Action::Add(City::new("Reykjavik", "")));
    }

    #[test]
    fn test_cli_parse_empty_city_name() {
        let cli = Cli::parse_from(["weatherfeed", "remove", "  ", "US"]);
        assert!(matches!(
            RunConfig::from_cli(&cli),
            Err(CliError::EmptyCityName)
        ));
    }

    #[test]
    fn test_cli_parse_position() {
        let cli = Cli::parse_from(["weatherfeed", "--lat", "49.28", "--lon", "-123.12"]);
        let config = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(config.position, Some((49.28, -123.12)));
    }

    #[test]
    fn test_cli_lat_requires_lon() {
        assert!(Cli::try_parse_from(["weatherfeed", "--lat", "49.28"]).is_err());
    }

    #[test]
    fn test_cli_parse_flags() {
        let cli = Cli::parse_from([
            "weatherfeed",
            "--unit",
            "celsius",
            "--refresh",
            "--forecast",
            "-v",
        ]);
        let config = RunConfig::from_cli(&cli).unwrap();
        assert_eq!(config.unit, Some(TemperatureUnit::Celsius));
        assert!(config.refresh);
        assert!(config.forecast);
        assert!(config.verbose);
    }

    #[test]
    fn test_run_config_invalid_unit() {
        let cli = Cli::parse_from(["weatherfeed", "--unit", "rankine"]);
        assert!(RunConfig::from_cli(&cli).is_err());
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let cli = Cli::parse_from(["weatherfeed", "--api-key", "  "]);
        let config = RunConfig::from_cli(&cli).unwrap();
        assert!(matches!(
            config.require_api_key(),
            Err(CliError::MissingApiKey)
        ));
    }
}
