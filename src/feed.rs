//! Concurrent multi-city weather feed
//!
//! [`FeedOrchestrator`] is a cheap, cloneable handle to a single actor task.
//! The actor owns the saved city list, the per-city weather store and the
//! shared loading/error flags. Fetches run as independent tokio tasks and
//! report back over a channel the actor drains, so every mutation of shared
//! state happens in one place while the network calls proceed concurrently.
//!
//! After each mutation the actor publishes a [`FeedSnapshot`] on a watch
//! channel. Results are applied as they arrive, so a partially loaded feed is
//! visible to subscribers before the whole batch completes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::cities::{feed_cities, CityListManager};
use crate::data::{
    City, CurrentWeather, DailySummary, TemperatureUnit, WeatherError, WeatherProvider,
};
use crate::persistence::Persistence;
use crate::store::{CityWeatherStore, FeedSnapshot, LOAD_ERROR_MESSAGE};

/// Capacity of the command channel
const COMMAND_BUFFER: usize = 32;

/// Requests sent from handles to the actor
#[derive(Debug)]
enum Command {
    /// Fetch weather for `cities`, optionally clearing all weather first
    LoadFeed {
        cities: Vec<City>,
        clear_first: bool,
        done: oneshot::Sender<()>,
    },
    /// Same as `LoadFeed` over the device location plus saved cities
    LoadWeatherFeed {
        clear_first: bool,
        done: oneshot::Sender<()>,
    },
    AddCity {
        city: City,
        fetch: bool,
        reply: oneshot::Sender<bool>,
    },
    RemoveCity {
        city: City,
        reply: oneshot::Sender<bool>,
    },
    ResetCities {
        done: oneshot::Sender<()>,
    },
    LoadForecast {
        city: City,
        done: oneshot::Sender<()>,
    },
    SetTemperatureUnit {
        unit: TemperatureUnit,
        done: oneshot::Sender<()>,
    },
    ClearCurrentLocationWeather {
        done: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Results sent from fetch tasks to the actor
#[derive(Debug)]
enum FetchOutcome {
    Weather {
        batch: u64,
        city: City,
        result: Result<CurrentWeather, WeatherError>,
    },
    Forecast {
        city: City,
        result: Result<Vec<DailySummary>, WeatherError>,
        done: oneshot::Sender<()>,
    },
}

/// An outstanding group of weather fetches
#[derive(Debug)]
struct Batch {
    pending: usize,
    done: Option<oneshot::Sender<()>>,
}

/// Handle to the feed actor
///
/// Cloning the handle is cheap; all clones talk to the same actor. The actor
/// stops once every handle has been dropped or [`FeedOrchestrator::shutdown`]
/// is called.
#[derive(Debug, Clone)]
pub struct FeedOrchestrator {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<FeedSnapshot>,
}

impl FeedOrchestrator {
    /// Spawns the feed actor on the current tokio runtime
    ///
    /// Loads the saved city list (seeding the defaults on first run) and the
    /// preferred temperature unit from `persistence`.
    pub fn spawn(provider: Arc<dyn WeatherProvider>, persistence: Arc<dyn Persistence>) -> Self {
        let cities = CityListManager::load(persistence.clone());
        let unit = persistence
            .load_temperature_unit()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

        let (state_tx, state) = watch::channel(FeedSnapshot::default());

        let actor = FeedActor {
            provider,
            persistence,
            cities,
            store: CityWeatherStore::new(),
            unit,
            last_error: None,
            current_location: None,
            batches: HashMap::new(),
            next_batch: 0,
            outcomes: outcome_tx,
            state: state_tx,
        };
        actor.publish();

        tokio::spawn(actor.run(command_rx, outcome_rx));

        Self {
            commands: command_tx,
            state,
        }
    }

    /// Fetches current weather for every city in `cities` concurrently
    ///
    /// Returns once every fetch has reported, successfully or not. Does
    /// nothing for an empty list.
    pub async fn load_feed(&self, cities: Vec<City>) {
        self.request(|done| Command::LoadFeed {
            cities,
            clear_first: false,
            done,
        })
        .await;
    }

    /// Clears all current weather, then loads `cities`
    pub async fn refresh_feed(&self, cities: Vec<City>) {
        self.request(|done| Command::LoadFeed {
            cities,
            clear_first: true,
            done,
        })
        .await;
    }

    /// Loads the whole display feed: device location first, then saved cities
    pub async fn load_weather_feed(&self) {
        self.request(|done| Command::LoadWeatherFeed {
            clear_first: false,
            done,
        })
        .await;
    }

    /// Clears all current weather, then loads the whole display feed
    pub async fn refresh_weather_feed(&self) {
        self.request(|done| Command::LoadWeatherFeed {
            clear_first: true,
            done,
        })
        .await;
    }

    /// Prepends `city` to the saved list and fetches its weather in the background
    ///
    /// # Returns
    /// * `true` if the city was added
    /// * `false` if an equal city is already saved
    pub async fn add_city(&self, city: City) -> bool {
        self.request(|reply| Command::AddCity {
            city,
            fetch: true,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Prepends `city` to the saved list without fetching its weather
    ///
    /// Used when no provider access is configured.
    pub async fn add_saved_city(&self, city: City) -> bool {
        self.request(|reply| Command::AddCity {
            city,
            fetch: false,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Removes the saved entry with `city`'s identifier and drops its weather
    ///
    /// # Returns
    /// * `true` if an entry with that identifier was saved
    pub async fn remove_city(&self, city: &City) -> bool {
        let city = city.clone();
        self.request(|reply| Command::RemoveCity { city, reply })
            .await
            .unwrap_or(false)
    }

    /// Replaces the saved list with the default cities
    pub async fn reset_cities(&self) {
        self.request(|done| Command::ResetCities { done }).await;
    }

    /// Fetches and stores the forecast for `city`; a failure clears it
    pub async fn load_forecast(&self, city: &City) {
        let city = city.clone();
        self.request(|done| Command::LoadForecast { city, done }).await;
    }

    /// Re-fetches the forecast for `city`; a failure clears it
    pub async fn refresh_forecast(&self, city: &City) {
        self.load_forecast(city).await;
    }

    /// Changes and persists the display unit
    pub async fn set_temperature_unit(&self, unit: TemperatureUnit) {
        self.request(|done| Command::SetTemperatureUnit { unit, done }).await;
    }

    pub fn temperature_unit(&self) -> TemperatureUnit {
        self.state.borrow().unit
    }

    /// Drops the weather of the device location city from the feed
    pub async fn clear_current_location_weather(&self) {
        self.request(|done| Command::ClearCurrentLocationWeather { done }).await;
    }

    /// The latest published state
    pub fn snapshot(&self) -> FeedSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified after every state change
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.state.clone()
    }

    pub fn saved_cities(&self) -> Vec<City> {
        self.state.borrow().cities.clone()
    }

    /// Waits until no fetch batch is outstanding
    pub async fn settled(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|snapshot| !snapshot.is_loading).await;
    }

    /// Stops the actor; in-flight fetch results are discarded
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    /// Sends a command built around a reply channel and waits for the reply
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send(build(reply_tx)).await.is_err() {
            debug!("feed actor has stopped");
            return None;
        }
        reply_rx.await.ok()
    }
}

/// Single owner of all feed state
struct FeedActor {
    provider: Arc<dyn WeatherProvider>,
    persistence: Arc<dyn Persistence>,
    cities: CityListManager,
    store: CityWeatherStore,
    unit: TemperatureUnit,
    last_error: Option<String>,
    current_location: Option<City>,
    batches: HashMap<u64, Batch>,
    next_batch: u64,
    outcomes: mpsc::UnboundedSender<FetchOutcome>,
    state: watch::Sender<FeedSnapshot>,
}

impl FeedActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<FetchOutcome>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                // The actor holds a sender, so this never yields `None`
                Some(outcome) = outcomes.recv() => self.handle_outcome(outcome),
            }
        }
        debug!("feed actor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::LoadFeed {
                cities,
                clear_first,
                done,
            } => {
                if clear_first {
                    self.store.clear_all();
                }
                self.start_cycle(cities, done);
            }
            Command::LoadWeatherFeed { clear_first, done } => {
                if clear_first {
                    self.store.clear_all();
                }
                let location = self.persistence.load_current_location();
                let cities = feed_cities(location.as_ref(), self.cities.cities());
                self.current_location = location
                    .filter(|location| !location.city.is_empty())
                    .map(|location| City::current_location(location.city));
                self.start_cycle(cities, done);
            }
            Command::AddCity { city, fetch, reply } => {
                let added = self.cities.add(city.clone());
                if added {
                    info!(city = %city, "added city");
                    if fetch {
                        self.start_batch(vec![city], None);
                    } else {
                        self.publish();
                    }
                }
                let _ = reply.send(added);
            }
            Command::RemoveCity { city, reply } => {
                let removed = self.cities.remove(city.id).is_some();
                self.store.clear(&city);
                self.publish();
                let _ = reply.send(removed);
            }
            Command::ResetCities { done } => {
                self.cities.reset();
                self.publish();
                let _ = done.send(());
            }
            Command::LoadForecast { city, done } => {
                let provider = self.provider.clone();
                let outcomes = self.outcomes.clone();
                tokio::spawn(async move {
                    let result = provider.fetch_forecast(&city).await;
                    let _ = outcomes.send(FetchOutcome::Forecast { city, result, done });
                });
            }
            Command::SetTemperatureUnit { unit, done } => {
                self.unit = unit;
                if let Err(err) = self.persistence.save_temperature_unit(unit.as_str()) {
                    warn!(error = %err, "failed to save temperature unit");
                }
                self.publish();
                let _ = done.send(());
            }
            Command::ClearCurrentLocationWeather { done } => {
                if let Some(city) = self.current_location.take() {
                    self.store.clear(&city);
                    self.publish();
                }
                let _ = done.send(());
            }
            Command::Shutdown => {}
        }
    }

    fn handle_outcome(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Weather {
                batch,
                city,
                result,
            } => {
                match result {
                    Ok(weather) => self.store.set(city, weather),
                    Err(err) => {
                        warn!(city = %city, error = %err, "failed to load weather");
                        // First failure of the cycle wins
                        if self.last_error.is_none() {
                            self.last_error = Some(LOAD_ERROR_MESSAGE.to_string());
                        }
                    }
                }
                let finished = self.finish_fetch(batch);
                self.publish();
                if let Some(done) = finished {
                    let _ = done.send(());
                }
            }
            FetchOutcome::Forecast { city, result, done } => {
                let summaries = match result {
                    Ok(summaries) => Some(summaries),
                    Err(err) => {
                        warn!(city = %city, error = %err, "failed to load forecast");
                        None
                    }
                };
                self.store.set_forecast(city, summaries);
                self.publish();
                let _ = done.send(());
            }
        }
    }

    /// Starts a whole-feed load, which resets the error of the previous cycle
    ///
    /// Single-city batches from `add_city` leave the error alone so a failure
    /// in a cycle still in flight is not hidden.
    fn start_cycle(&mut self, cities: Vec<City>, done: oneshot::Sender<()>) {
        self.last_error = None;
        self.start_batch(cities, Some(done));
    }

    /// Starts one fetch task per city, all reporting under a new batch id
    fn start_batch(&mut self, cities: Vec<City>, done: Option<oneshot::Sender<()>>) {
        if cities.is_empty() {
            self.publish();
            if let Some(done) = done {
                let _ = done.send(());
            }
            return;
        }

        let batch = self.next_batch;
        self.next_batch += 1;
        debug!(batch, count = cities.len(), "loading weather");

        self.batches.insert(
            batch,
            Batch {
                pending: cities.len(),
                done,
            },
        );

        for city in cities {
            let provider = self.provider.clone();
            let outcomes = self.outcomes.clone();
            tokio::spawn(async move {
                let result = provider.fetch_current_weather(&city).await;
                let _ = outcomes.send(FetchOutcome::Weather {
                    batch,
                    city,
                    result,
                });
            });
        }
        self.publish();
    }

    /// Counts one fetch of `batch` as done, returning its completion signal
    /// when it was the last one
    fn finish_fetch(&mut self, batch: u64) -> Option<oneshot::Sender<()>> {
        let entry = self.batches.get_mut(&batch)?;
        entry.pending = entry.pending.saturating_sub(1);
        if entry.pending > 0 {
            return None;
        }
        self.batches.remove(&batch).and_then(|finished| finished.done)
    }

    fn publish(&self) {
        self.state.send_replace(FeedSnapshot {
            cities: self.cities.cities().to_vec(),
            current_location: self.current_location.clone(),
            weather: self.store.weather().clone(),
            forecasts: self.store.forecasts().clone(),
            is_loading: !self.batches.is_empty(),
            last_error: self.last_error.clone(),
            unit: self.unit,
        });
    }
}
