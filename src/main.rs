//! weatherfeed - Current weather and 5-day forecasts for your cities
//!
//! A command-line front end that loads the saved city feed (plus an optional
//! current location) and prints it as text.

use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use weatherfeed::cli::{Action, Cli, RunConfig};
use weatherfeed::data::{City, OpenWeatherClient, OpenWeatherGeocoder, WeatherProvider};
use weatherfeed::location::{
    FixedLocationSource, LocationEvent, LocationWeatherCoordinator, PermissionStatus, PositionFix,
};
use weatherfeed::persistence::{FileStore, MemoryStore, Persistence};
use weatherfeed::store::FeedSnapshot;
use weatherfeed::FeedOrchestrator;

/// Installs the stderr log subscriber; `RUST_LOG` takes precedence
fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Opens the settings store, falling back to memory when no data dir exists
fn open_persistence(config: &RunConfig) -> Arc<dyn Persistence> {
    if let Some(dir) = &config.data_dir {
        return Arc::new(FileStore::with_dir(dir.clone()));
    }
    match FileStore::new() {
        Some(store) => Arc::new(store),
        None => {
            warn!("no data directory available, settings will not be saved");
            Arc::new(MemoryStore::new())
        }
    }
}

/// Resolves the given position to a city name and records it as the current location
///
/// Only the persisted name is used afterwards: the feed load that follows
/// fetches the current location together with the saved cities, so the
/// coordinator's own weather and forecast are dropped with it.
async fn resolve_position(
    provider: Arc<dyn WeatherProvider>,
    persistence: Arc<dyn Persistence>,
    api_key: &str,
    (latitude, longitude): (f64, f64),
) {
    let mut coordinator = LocationWeatherCoordinator::new(
        provider,
        Arc::new(OpenWeatherGeocoder::new(api_key)),
        Arc::new(FixedLocationSource::new()),
        persistence,
        PermissionStatus::Undetermined,
    );
    coordinator
        .handle_event(LocationEvent::PermissionChanged(PermissionStatus::Authorized))
        .await;
    coordinator
        .handle_event(LocationEvent::PositionUpdated(PositionFix::new(
            latitude, longitude,
        )))
        .await;
}

/// Prints one line per city, with forecast rows when loaded
fn print_feed(snapshot: &FeedSnapshot) {
    for city in snapshot.feed() {
        let label = if snapshot.current_location.as_ref() == Some(&city) {
            format!("{} (current location)", city)
        } else {
            city.to_string()
        };
        let condition = snapshot
            .weather_for(&city)
            .and_then(|weather| weather.primary_condition())
            .map(|c| format!("{:<12} {}", c.main, c.description))
            .unwrap_or_else(|| "unavailable".to_string());

        println!(
            "{:<36} {:>6}  {}",
            label,
            snapshot.display_temperature(&city),
            condition
        );

        for day in snapshot.forecast_for(&city).unwrap_or_default() {
            println!(
                "    {}  {:>6} / {:<6} {}",
                day.date,
                snapshot.unit.display(Some(day.min_temp)),
                snapshot.unit.display(Some(day.max_temp)),
                day.condition
            );
        }
    }

    if let Some(error) = &snapshot.last_error {
        eprintln!("{}", error);
    }
}

fn print_cities(cities: &[City]) {
    for city in cities {
        println!("{}", city);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match RunConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(2);
        }
    };
    init_tracing(config.verbose);

    let api_key = if config.needs_api_key() {
        match config.require_api_key() {
            Ok(key) => key.to_string(),
            Err(err) => {
                eprintln!("Error: {}", err);
                process::exit(2);
            }
        }
    } else {
        config.api_key.clone().unwrap_or_default()
    };

    let persistence = open_persistence(&config);
    let provider: Arc<dyn WeatherProvider> = Arc::new(OpenWeatherClient::new(api_key.clone()));
    let feed = FeedOrchestrator::spawn(provider.clone(), persistence.clone());

    if let Some(unit) = config.unit {
        feed.set_temperature_unit(unit).await;
    }

    match &config.action {
        Action::Show => {
            if !persistence.load_onboarding_completed() {
                println!(
                    "Welcome to weatherfeed! Add your own cities with `weatherfeed add <name> <country>`.\n"
                );
                persistence.save_onboarding_completed(true)?;
            }

            if let Some(position) = config.position {
                resolve_position(provider.clone(), persistence.clone(), &api_key, position).await;
            }

            if config.refresh {
                feed.refresh_weather_feed().await;
            } else {
                feed.load_weather_feed().await;
            }

            if config.forecast {
                let cities = feed.snapshot().feed();
                futures::future::join_all(cities.iter().map(|city| feed.load_forecast(city))).await;
            }

            print_feed(&feed.snapshot());
        }
        Action::List => print_cities(&feed.saved_cities()),
        Action::Add(city) => {
            // Without a key there is nothing to fetch
            let added = if config.api_key.is_some() {
                feed.add_city(city.clone()).await
            } else {
                feed.add_saved_city(city.clone()).await
            };
            if added {
                println!("Added {}", city);
                if config.api_key.is_some() {
                    feed.settled().await;
                    let snapshot = feed.snapshot();
                    println!("{}: {}", city, snapshot.display_temperature(city));
                }
            } else {
                println!("{} is already saved", city);
            }
        }
        Action::Remove(city) => {
            let saved = feed.saved_cities().into_iter().find(|saved| saved == city);
            match saved {
                Some(saved) => {
                    feed.remove_city(&saved).await;
                    println!("Removed {}", saved);
                }
                None => {
                    eprintln!("{} is not saved", city);
                    process::exit(1);
                }
            }
        }
        Action::Reset => {
            feed.reset_cities().await;
            print_cities(&feed.saved_cities());
        }
    }

    feed.shutdown().await;
    Ok(())
}
