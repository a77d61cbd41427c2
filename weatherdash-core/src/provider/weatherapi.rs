use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

use crate::{
    config::DEFAULT_BASE_URL,
    error::WeatherError,
    model::{
        CitySuggestion, Condition, DaySummary, ForecastDay, HourlyPoint, Location, WeatherSnapshot,
    },
    provider::{HOURLY_POINTS, WEEK_DAYS},
};

use super::WeatherProvider;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the WeatherAPI.com REST API.
#[derive(Debug, Clone)]
pub struct WeatherApiClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiClient {
    pub fn new(api_key: String) -> reqwest::Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Point the client at another host, e.g. a local mock server.
    pub fn with_base_url(api_key: String, base_url: &str) -> reqwest::Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { api_key, base_url: base_url.trim_end_matches('/').to_string(), http })
    }

    /// GET `<base>/<endpoint>.json` and decode the payload.
    ///
    /// An `error` object in the body wins over the HTTP status, so a provider
    /// message like "No matching location found." survives a 400.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        query: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}/{}.json", self.base_url, endpoint);
        debug!(endpoint, ?query, "WeatherAPI request");

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|source| WeatherError::Network { endpoint, source: source.without_url() })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|source| WeatherError::Network { endpoint, source: source.without_url() })?;

        if let Some(err) = provider_error(&body) {
            debug!(endpoint, %status, "WeatherAPI reported an error");
            return Err(err);
        }

        if !status.is_success() {
            return Err(WeatherError::Status {
                endpoint,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| WeatherError::Decode { endpoint, source })
    }

    async fn forecast(&self, city: &str, days: usize) -> Result<WaForecastResponse, WeatherError> {
        let days = days.to_string();
        let parsed: WaForecastResponse = self
            .get_json("forecast", &[("q", city), ("days", days.as_str()), ("alerts", "no"), ("aqi", "no")])
            .await?;

        if parsed.forecast.forecastday.is_empty() {
            return Err(WeatherError::MissingData { endpoint: "forecast" });
        }
        Ok(parsed)
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiClient {
    async fn current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        let parsed: WaCurrentResponse = self.get_json("current", &[("q", city), ("aqi", "no")]).await?;

        let ts = parsed.current.last_updated_epoch.or(parsed.location.localtime_epoch);
        let observed_at = ts.and_then(unix_to_utc).unwrap_or_else(Utc::now);
        let current = parsed.current;

        Ok(WeatherSnapshot {
            location: parsed.location.into_location(),
            observed_at,
            condition: current.condition.into(),
            temperature_c: current.temp_c,
            feels_like_c: current.feelslike_c,
            humidity_pct: current.humidity,
            wind_kph: current.wind_kph,
            wind_dir: current.wind_dir,
            pressure_mb: current.pressure_mb,
            cloud_pct: current.cloud,
        })
    }

    async fn weekly_forecast(&self, city: &str) -> Result<Vec<ForecastDay>, WeatherError> {
        let parsed = self.forecast(city, WEEK_DAYS).await?;

        Ok(parsed
            .forecast
            .forecastday
            .into_iter()
            .take(WEEK_DAYS)
            .map(|day| ForecastDay {
                date: day.date,
                summary: DaySummary {
                    min_c: day.day.mintemp_c,
                    max_c: day.day.maxtemp_c,
                    avg_c: day.day.avgtemp_c,
                    condition: day.day.condition.into(),
                },
                hours: day.hour.into_iter().map(WaHour::into_point).collect(),
            })
            .collect())
    }

    async fn hourly_forecast(&self, city: &str) -> Result<Vec<HourlyPoint>, WeatherError> {
        // Two days so the window can run past local midnight.
        let parsed = self.forecast(city, 2).await?;

        let start = parsed
            .location
            .localtime
            .as_deref()
            .and_then(parse_local)
            .and_then(|t| t.with_minute(0));

        Ok(parsed
            .forecast
            .forecastday
            .into_iter()
            .flat_map(|day| day.hour)
            .map(WaHour::into_point)
            .filter(|p| start.is_none_or(|s| p.local_time >= s))
            .take(HOURLY_POINTS)
            .collect())
    }

    async fn historical(&self, city: &str, date: NaiveDate) -> Result<WeatherSnapshot, WeatherError> {
        let dt = date.format("%Y-%m-%d").to_string();
        let parsed: WaForecastResponse =
            self.get_json("history", &[("q", city), ("dt", dt.as_str())]).await?;

        let location = parsed.location.into_location();

        let day = parsed
            .forecast
            .forecastday
            .into_iter()
            .next()
            .ok_or(WeatherError::MissingData { endpoint: "history" })?;

        // Local noon is the representative reading for a past day.
        let target = date.and_hms_opt(12, 0, 0).unwrap_or_default();

        let hour = day
            .hour
            .into_iter()
            .min_by_key(|h| {
                let local = parse_local(&h.time).unwrap_or(target);
                (local - target).num_seconds().abs()
            })
            .ok_or(WeatherError::MissingData { endpoint: "history" })?;

        let observed_at = unix_to_utc(hour.time_epoch).unwrap_or_else(Utc::now);

        Ok(WeatherSnapshot {
            location,
            observed_at,
            condition: hour.condition.into(),
            temperature_c: hour.temp_c,
            feels_like_c: hour.feelslike_c,
            humidity_pct: hour.humidity,
            wind_kph: hour.wind_kph,
            wind_dir: hour.wind_dir,
            pressure_mb: hour.pressure_mb,
            cloud_pct: hour.cloud,
        })
    }

    async fn search_cities(&self, prefix: &str) -> Result<Vec<CitySuggestion>, WeatherError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let hits: Vec<WaSearchHit> = self.get_json("search", &[("q", prefix)]).await?;

        Ok(hits
            .into_iter()
            .map(|h| CitySuggestion { name: h.name, region: h.region, country: h.country })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct WaErrorEnvelope {
    error: WaErrorBody,
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    code: Option<i64>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
    localtime_epoch: Option<i64>,
    localtime: Option<String>,
}

impl WaLocation {
    fn into_location(self) -> Location {
        Location { name: self.name, region: self.region, country: self.country }
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    #[serde(default)]
    icon: String,
}

impl From<WaCondition> for Condition {
    fn from(c: WaCondition) -> Self {
        Condition { text: c.text, icon: c.icon }
    }
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    last_updated_epoch: Option<i64>,
    temp_c: f64,
    feelslike_c: f64,
    humidity: u8,
    wind_kph: f64,
    #[serde(default)]
    wind_dir: String,
    pressure_mb: f64,
    cloud: u8,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaCurrentResponse {
    location: WaLocation,
    current: WaCurrent,
}

#[derive(Debug, Deserialize)]
struct WaHour {
    time_epoch: i64,
    time: String,
    temp_c: f64,
    #[serde(default)]
    feelslike_c: f64,
    #[serde(default)]
    humidity: u8,
    #[serde(default)]
    wind_kph: f64,
    #[serde(default)]
    wind_dir: String,
    #[serde(default)]
    pressure_mb: f64,
    #[serde(default)]
    cloud: u8,
    condition: WaCondition,
}

impl WaHour {
    fn into_point(self) -> HourlyPoint {
        let time = unix_to_utc(self.time_epoch).unwrap_or_else(Utc::now);
        let local_time = parse_local(&self.time).unwrap_or_else(|| time.naive_utc());
        HourlyPoint {
            local_time,
            time,
            temperature_c: self.temp_c,
            condition: self.condition.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    mintemp_c: f64,
    avgtemp_c: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: NaiveDate,
    day: WaDay,
    hour: Vec<WaHour>,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    forecast: WaForecast,
}

#[derive(Debug, Deserialize)]
struct WaSearchHit {
    name: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    country: String,
}

fn provider_error(body: &str) -> Option<WeatherError> {
    let envelope: WaErrorEnvelope = serde_json::from_str(body).ok()?;
    Some(WeatherError::Provider { code: envelope.error.code, message: envelope.error.message })
}

/// WeatherAPI local times look like `2024-04-22 13:00`.
fn parse_local(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M").ok()
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
