//! Current-location weather
//!
//! [`LocationWeatherCoordinator`] tracks one ambient location. It consumes
//! permission changes and raw position fixes from a [`LocationSource`],
//! reverse-geocodes them (throttled by time and distance) and fetches current
//! weather plus a forecast for the resolved city name. Events are processed
//! one at a time, in order, by a single owner.
//!
//! Failures reset state rather than propagate: a failed geocode forgets the
//! city name and weather, a failed weather fetch forgets weather and forecast,
//! and revoked permission wipes everything including the persisted location.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::data::{City, CurrentWeather, DailySummary, LocationData, WeatherProvider};
use crate::persistence::Persistence;

/// Minimum time between two reverse geocodes
pub const MIN_GEOCODE_INTERVAL_SECS: i64 = 300;

/// Minimum distance moved between two reverse geocodes, in meters
pub const MIN_GEOCODE_DISTANCE_M: f64 = 1000.0;

/// Errors reported by location collaborators
#[derive(Debug, Error)]
pub enum LocationError {
    /// Location access was revoked or never granted
    #[error("Location access denied")]
    PermissionDenied,

    /// Reverse geocoding failed
    #[error("Reverse geocoding failed: {0}")]
    Geocode(String),
}

/// Location permission as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    #[default]
    Undetermined,
    Authorized,
    Denied,
    Restricted,
}

impl PermissionStatus {
    pub fn is_authorized(self) -> bool {
        self == PermissionStatus::Authorized
    }

    /// Denied and restricted are handled the same way
    pub fn is_revoked(self) -> bool {
        matches!(self, PermissionStatus::Denied | PermissionStatus::Restricted)
    }
}

/// A raw position fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    /// When the fix was taken
    pub timestamp: DateTime<Utc>,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: Utc::now(),
        }
    }

    /// Great-circle distance to `other` in meters
    pub fn distance_to(&self, other: &PositionFix) -> f64 {
        let km = haversine::distance(
            haversine::Location {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            haversine::Location {
                latitude: other.latitude,
                longitude: other.longitude,
            },
            haversine::Units::Kilometers,
        );
        km * 1000.0
    }
}

/// Result of reverse geocoding a position
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Placemark {
    pub locality: Option<String>,
    pub sub_administrative_area: Option<String>,
    pub name: Option<String>,
}

impl Placemark {
    /// Locality, else sub-administrative area, else raw name
    pub fn display_name(&self) -> Option<String> {
        self.locality
            .clone()
            .or_else(|| self.sub_administrative_area.clone())
            .or_else(|| self.name.clone())
    }
}

/// Platform source of position fixes
pub trait LocationSource: Send + Sync {
    fn request_permission(&self);
    fn start_updates(&self);
    fn stop_updates(&self);
}

/// Turns coordinates into a place name
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Returns the best placemark for the position, if any
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Placemark>, LocationError>;
}

/// Limits reverse geocoding by elapsed time and distance moved
///
/// Both limits must be cleared for a geocode to be allowed. The first
/// attempt is always allowed.
#[derive(Debug, Clone)]
pub struct GeocodeThrottle {
    min_interval: Duration,
    min_distance_m: f64,
    last: Option<PositionFix>,
}

impl Default for GeocodeThrottle {
    fn default() -> Self {
        Self::new(
            Duration::seconds(MIN_GEOCODE_INTERVAL_SECS),
            MIN_GEOCODE_DISTANCE_M,
        )
    }
}

impl GeocodeThrottle {
    pub fn new(min_interval: Duration, min_distance_m: f64) -> Self {
        Self {
            min_interval,
            min_distance_m,
            last: None,
        }
    }

    /// Whether a geocode for `fix` is allowed
    pub fn allows(&self, fix: &PositionFix) -> bool {
        let Some(last) = &self.last else {
            return true;
        };
        if fix.timestamp - last.timestamp < self.min_interval {
            debug!("skipping geocode: too soon");
            return false;
        }
        if fix.distance_to(last) < self.min_distance_m {
            debug!("skipping geocode: too close");
            return false;
        }
        true
    }

    /// Records `fix` as the last geocoded position
    pub fn record(&mut self, fix: &PositionFix) {
        self.last = Some(*fix);
    }

    pub fn last_geocode(&self) -> Option<&PositionFix> {
        self.last.as_ref()
    }
}

/// Signals consumed by the coordinator
#[derive(Debug, Clone)]
pub enum LocationEvent {
    PermissionChanged(PermissionStatus),
    PositionUpdated(PositionFix),
    UpdateFailed(String),
}

/// Published view of the ambient location
#[derive(Debug, Clone, Default)]
pub struct AmbientLocation {
    pub permission: PermissionStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Resolved city name
    pub city: Option<String>,
    pub weather: Option<CurrentWeather>,
    pub forecast: Option<Vec<DailySummary>>,
    pub last_geocode_at: Option<DateTime<Utc>>,
}

impl AmbientLocation {
    /// The city used for provider queries, if a name is known
    pub fn as_city(&self) -> Option<City> {
        self.city.clone().map(City::current_location)
    }
}

/// Tracks the device location and keeps its weather current
pub struct LocationWeatherCoordinator {
    provider: Arc<dyn WeatherProvider>,
    geocoder: Arc<dyn Geocoder>,
    source: Arc<dyn LocationSource>,
    persistence: Arc<dyn Persistence>,
    throttle: GeocodeThrottle,
    current: AmbientLocation,
    state: watch::Sender<AmbientLocation>,
}

impl LocationWeatherCoordinator {
    /// Creates the coordinator, restoring the persisted location
    ///
    /// Position updates start right away when `permission` is already
    /// authorized.
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        geocoder: Arc<dyn Geocoder>,
        source: Arc<dyn LocationSource>,
        persistence: Arc<dyn Persistence>,
        permission: PermissionStatus,
    ) -> Self {
        let mut current = AmbientLocation {
            permission,
            ..Default::default()
        };
        if let Some(saved) = persistence.load_current_location() {
            current.city = Some(saved.city);
            current.latitude = Some(saved.latitude);
            current.longitude = Some(saved.longitude);
        }

        let (state, _) = watch::channel(current.clone());
        let coordinator = Self {
            provider,
            geocoder,
            source,
            persistence,
            throttle: GeocodeThrottle::default(),
            current,
            state,
        };
        if permission.is_authorized() {
            coordinator.source.start_updates();
        }
        coordinator
    }

    /// Replaces the default geocode throttle
    pub fn with_throttle(mut self, throttle: GeocodeThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn state(&self) -> &AmbientLocation {
        &self.current
    }

    /// Receiver notified after every processed event
    pub fn subscribe(&self) -> watch::Receiver<AmbientLocation> {
        self.state.subscribe()
    }

    pub fn request_permission(&self) {
        self.source.request_permission();
    }

    /// Processes events until the sender side is dropped
    pub async fn run(mut self, mut events: mpsc::Receiver<LocationEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("location event stream closed");
    }

    pub async fn handle_event(&mut self, event: LocationEvent) {
        match event {
            LocationEvent::PermissionChanged(status) => self.permission_changed(status),
            LocationEvent::PositionUpdated(fix) => self.position_updated(fix).await,
            LocationEvent::UpdateFailed(reason) => {
                warn!(%reason, "location update failed");
            }
        }
        self.publish();
    }

    fn permission_changed(&mut self, status: PermissionStatus) {
        self.current.permission = status;
        if status.is_authorized() {
            self.source.start_updates();
        } else if status.is_revoked() {
            info!("location access revoked, clearing location data");
            self.source.stop_updates();
            self.clear_location_data();
        }
    }

    async fn position_updated(&mut self, fix: PositionFix) {
        if self.current.permission.is_revoked() {
            debug!("ignoring position fix without location access");
            return;
        }
        self.current.latitude = Some(fix.latitude);
        self.current.longitude = Some(fix.longitude);

        if self.throttle.allows(&fix) || self.current.city.is_none() {
            self.reverse_geocode(&fix).await;
        } else {
            if self.current.weather.is_none() {
                self.fetch_weather().await;
            }
            self.source.stop_updates();
        }
    }

    async fn reverse_geocode(&mut self, fix: &PositionFix) {
        self.throttle.record(fix);
        self.current.last_geocode_at = Some(fix.timestamp);

        match self
            .geocoder
            .reverse_geocode(fix.latitude, fix.longitude)
            .await
        {
            Ok(Some(placemark)) => {
                let name = placemark.display_name();
                if name != self.current.city {
                    info!(city = ?name, "current location changed");
                    self.current.city = name;
                    self.persist_location();
                    self.fetch_weather().await;
                } else if self.current.weather.is_none() {
                    self.fetch_weather().await;
                }
            }
            Ok(None) => debug!("reverse geocoding returned no placemark"),
            Err(err) => {
                warn!(error = %err, "reverse geocoding failed");
                // The forecast is left as it was
                self.current.city = None;
                self.current.weather = None;
            }
        }
    }

    /// Fetches weather, then the forecast, for the resolved city
    async fn fetch_weather(&mut self) {
        let Some(city) = self.current.as_city() else {
            return;
        };

        match self.provider.fetch_current_weather(&city).await {
            Ok(weather) => {
                self.current.weather = Some(weather);
                self.current.forecast = match self.provider.fetch_forecast(&city).await {
                    Ok(summaries) => Some(summaries),
                    Err(err) => {
                        warn!(city = %city, error = %err, "failed to load current location forecast");
                        None
                    }
                };
                debug!(city = %city, "fetched current location weather");
            }
            Err(err) => {
                warn!(city = %city, error = %err, "failed to load current location weather");
                self.current.weather = None;
                self.current.forecast = None;
            }
        }
    }

    fn persist_location(&self) {
        let (Some(city), Some(latitude), Some(longitude)) = (
            self.current.city.clone(),
            self.current.latitude,
            self.current.longitude,
        ) else {
            return;
        };
        let data = LocationData {
            city,
            latitude,
            longitude,
        };
        if let Err(err) = self.persistence.save_current_location(Some(&data)) {
            warn!(error = %err, "failed to save current location");
        }
    }

    fn clear_location_data(&mut self) {
        self.current.city = None;
        self.current.latitude = None;
        self.current.longitude = None;
        self.current.weather = None;
        self.current.forecast = None;
        if let Err(err) = self.persistence.save_current_location(None) {
            warn!(error = %err, "failed to clear current location");
        }
    }

    fn publish(&self) {
        self.state.send_replace(self.current.clone());
    }
}

/// Location source for a position supplied up front, e.g. on the command line
///
/// There is no platform permission prompt, so requesting permission and
/// starting or stopping updates only record the call.
#[derive(Debug, Default)]
pub struct FixedLocationSource {
    updating: AtomicBool,
}

impl FixedLocationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::SeqCst)
    }
}

impl LocationSource for FixedLocationSource {
    fn request_permission(&self) {}

    fn start_updates(&self) {
        self.updating.store(true, Ordering::SeqCst);
    }

    fn stop_updates(&self) {
        self.updating.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix_at(latitude: f64, longitude: f64, seconds: i64) -> PositionFix {
        let base = DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp");
        PositionFix {
            latitude,
            longitude,
            timestamp: base + Duration::seconds(seconds),
        }
    }

    #[test]
    fn test_throttle_allows_first_attempt() {
        let throttle = GeocodeThrottle::default();
        assert!(throttle.allows(&fix_at(49.28, -123.12, 0)));
    }

    #[test]
    fn test_throttle_blocks_soon_and_close() {
        let mut throttle = GeocodeThrottle::default();
        throttle.record(&fix_at(49.2800, -123.1200, 0));

        // About 100 m north, 50 s later
        assert!(!throttle.allows(&fix_at(49.2809, -123.1200, 50)));
    }

    #[test]
    fn test_throttle_requires_both_time_and_distance() {
        let mut throttle = GeocodeThrottle::default();
        throttle.record(&fix_at(49.28, -123.12, 0));

        // Far away but too soon
        assert!(!throttle.allows(&fix_at(49.38, -123.12, 60)));
        // Late enough but not moved
        assert!(!throttle.allows(&fix_at(49.28, -123.12, 400)));
        // Late enough and about 11 km away
        assert!(throttle.allows(&fix_at(49.38, -123.12, 400)));
    }

    #[test]
    fn test_distance_to() {
        let a = fix_at(49.28, -123.12, 0);
        let b = fix_at(49.29, -123.12, 0);
        let meters = a.distance_to(&b);
        assert!((meters - 1112.0).abs() < 10.0, "unexpected distance {}", meters);
    }

    #[test]
    fn test_placemark_display_name_fallbacks() {
        let full = Placemark {
            locality: Some("Vancouver".to_string()),
            sub_administrative_area: Some("Metro Vancouver".to_string()),
            name: Some("Stanley Park".to_string()),
        };
        assert_eq!(full.display_name().as_deref(), Some("Vancouver"));

        let no_locality = Placemark {
            locality: None,
            ..full.clone()
        };
        assert_eq!(no_locality.display_name().as_deref(), Some("Metro Vancouver"));

        let only_name = Placemark {
            name: Some("Stanley Park".to_string()),
            ..Default::default()
        };
        assert_eq!(only_name.display_name().as_deref(), Some("Stanley Park"));
        assert!(Placemark::default().display_name().is_none());
    }

    #[test]
    fn test_permission_status_groups() {
        assert!(PermissionStatus::Authorized.is_authorized());
        assert!(PermissionStatus::Denied.is_revoked());
        assert!(PermissionStatus::Restricted.is_revoked());
        assert!(!PermissionStatus::Undetermined.is_revoked());
        assert!(!PermissionStatus::Undetermined.is_authorized());
    }

    #[test]
    fn test_fixed_source_tracks_updates() {
        let source = FixedLocationSource::new();
        assert!(!source.is_updating());
        source.start_updates();
        assert!(source.is_updating());
        source.stop_updates();
        assert!(!source.is_updating());
    }
}
