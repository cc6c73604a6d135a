//! weatherfeed library
//!
//! Weather for a list of saved cities plus the device location: concurrent
//! per-city fetching, 5-day forecast aggregation and persisted settings. The
//! binary in `main.rs` is a thin text front end over these modules.

pub mod cities;
pub mod cli;
pub mod data;
pub mod feed;
pub mod location;
pub mod persistence;
pub mod store;

pub use feed::FeedOrchestrator;
pub use location::LocationWeatherCoordinator;
