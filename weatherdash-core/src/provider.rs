use crate::{
    Config,
    error::WeatherError,
    model::{CitySuggestion, ForecastDay, HourlyPoint, WeatherSnapshot},
    provider::weatherapi::WeatherApiClient,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

pub mod weatherapi;

/// Number of days in the weekly view.
pub const WEEK_DAYS: usize = 7;
/// Number of entries in the hourly view.
pub const HOURLY_POINTS: usize = 12;

/// Request/response wrappers around a weather data provider.
///
/// Every call is an independent request; nothing is cached or retried.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError>;

    /// Seven days, index 0 is today at the location.
    async fn weekly_forecast(&self, city: &str) -> Result<Vec<ForecastDay>, WeatherError>;

    /// Twelve hourly points starting from the current local hour.
    async fn hourly_forecast(&self, city: &str) -> Result<Vec<HourlyPoint>, WeatherError>;

    async fn historical(&self, city: &str, date: NaiveDate) -> Result<WeatherSnapshot, WeatherError>;

    /// Autocomplete. An empty prefix yields no suggestions and no request.
    async fn search_cities(&self, prefix: &str) -> Result<Vec<CitySuggestion>, WeatherError>;
}

/// Construct the WeatherAPI client from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.api_key()?;
    let client = WeatherApiClient::with_base_url(api_key, config.base_url())?;
    Ok(Box::new(client))
}
