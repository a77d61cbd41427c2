//! Core library for the `weatherdash` dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The WeatherAPI.com client behind the `WeatherProvider` trait
//! - Favorites and unit preference persistence
//! - The dashboard controller and its view state
//!
//! It is used by `weatherdash-cli`, but any front end can drive the controller.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod preferences;
pub mod provider;
pub mod store;

pub use config::Config;
pub use dashboard::{DashboardController, Phase, ViewState, load_city};
pub use error::{DashboardError, StoreError, WeatherError};
pub use model::{
    CitySuggestion, CityWeather, Condition, DaySummary, ForecastDay, HourlyPoint, Location,
    TemperatureUnit, WeatherSnapshot,
};
pub use preferences::PreferencesStore;
pub use provider::{WeatherProvider, provider_from_config, weatherapi::WeatherApiClient};
pub use store::{FileStore, KeyValueStore, MemoryStore};
