//! Dashboard controller: turns user intents into provider calls and
//! preference updates, and owns the resulting view state.
//!
//! Network work is split from state mutation so stale responses can be
//! recognized. Each orchestration goes through three steps:
//!
//! 1. `begin_*` bumps a generation counter and hands out a ticket,
//! 2. the async work runs against the provider only ([`load_city`],
//!    [`WeatherProvider::search_cities`]),
//! 3. `complete_*` applies the result only if the ticket is still current.
//!
//! [`DashboardController::search`] and friends chain the three steps for
//! callers that only ever have one request in flight.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{
    config::DEFAULT_NOTIFICATION_SECS,
    error::{DashboardError, WeatherError},
    model::{CitySuggestion, CityWeather, ForecastDay, HourlyPoint, TemperatureUnit, WeatherSnapshot},
    preferences::PreferencesStore,
    provider::WeatherProvider,
    store::KeyValueStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// Which user action started a fetch; decides input handling and error wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    Search,
    Favorite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct FetchTicket {
    generation: u64,
    city: String,
    origin: FetchOrigin,
}

impl FetchTicket {
    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn origin(&self) -> FetchOrigin {
        self.origin
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SuggestionTicket {
    generation: u64,
    prefix: String,
}

impl SuggestionTicket {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Transient message shown next to the dashboard, e.g. after adding a favorite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub city: String,
    raised_at: Instant,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub phase: Phase,
    pub weather: Option<WeatherSnapshot>,
    pub forecast: Option<Vec<ForecastDay>>,
    pub hourly: Option<Vec<HourlyPoint>>,
    pub error: Option<String>,
    pub notification: Option<Notification>,
    pub search_input: String,
    pub suggestions: Vec<CitySuggestion>,
}

/// Current conditions, then the week, then the next hours, for one city.
/// The first failure ends the pipeline.
pub async fn load_city(provider: &dyn WeatherProvider, city: &str) -> Result<CityWeather, WeatherError> {
    let current = provider.current(city).await?;
    let week = provider.weekly_forecast(city).await?;
    let hourly = provider.hourly_forecast(city).await?;
    Ok(CityWeather { current, week, hourly })
}

#[derive(Debug)]
pub struct DashboardController<S> {
    provider: Arc<dyn WeatherProvider>,
    prefs: PreferencesStore<S>,
    view: ViewState,
    fetch_generation: u64,
    suggestion_generation: u64,
    notification_ttl: Duration,
}

impl<S: KeyValueStore> DashboardController<S> {
    pub fn new(provider: Arc<dyn WeatherProvider>, prefs: PreferencesStore<S>) -> Self {
        Self {
            provider,
            prefs,
            view: ViewState::default(),
            fetch_generation: 0,
            suggestion_generation: 0,
            notification_ttl: Duration::from_secs(DEFAULT_NOTIFICATION_SECS),
        }
    }

    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn is_loading(&self) -> bool {
        self.view.phase == Phase::Loading
    }

    pub fn favorites(&self) -> &[String] {
        self.prefs.favorites()
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.prefs.unit()
    }

    pub fn provider(&self) -> &Arc<dyn WeatherProvider> {
        &self.provider
    }

    /// Start a search from the input box. Blank input is ignored.
    /// Clears the input box.
    pub fn begin_search(&mut self, city: &str) -> Option<FetchTicket> {
        let city = city.trim();
        if city.is_empty() {
            return None;
        }
        let ticket = self.begin_fetch(city, FetchOrigin::Search);
        self.view.search_input.clear();
        self.view.suggestions.clear();
        // Outstanding suggestion responses belong to the text just cleared.
        self.suggestion_generation += 1;
        Some(ticket)
    }

    /// Start loading a saved favorite. The input box is left alone.
    pub fn begin_select_favorite(&mut self, city: &str) -> FetchTicket {
        self.begin_fetch(city, FetchOrigin::Favorite)
    }

    fn begin_fetch(&mut self, city: &str, origin: FetchOrigin) -> FetchTicket {
        self.fetch_generation += 1;
        self.view.phase = Phase::Loading;
        self.view.error = None;
        debug!(city, generation = self.fetch_generation, ?origin, "fetch started");
        FetchTicket { generation: self.fetch_generation, city: city.to_string(), origin }
    }

    /// Apply a finished fetch. Returns `false` when a newer fetch was started
    /// in the meantime; the result is then dropped.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<CityWeather, WeatherError>) -> bool {
        if ticket.generation != self.fetch_generation {
            debug!(city = %ticket.city, generation = ticket.generation, "discarding stale weather response");
            return false;
        }

        match result {
            Ok(data) => {
                info!(city = %ticket.city, location = %data.current.location, "weather loaded");
                self.view.weather = Some(data.current);
                self.view.forecast = Some(data.week);
                self.view.hourly = Some(data.hourly);
                self.view.error = None;
                self.view.phase = Phase::Loaded;
            }
            Err(err) => {
                warn!(city = %ticket.city, error = %err, "weather fetch failed");
                // Never show the previous city's data under a failed search.
                self.view.weather = None;
                self.view.forecast = None;
                self.view.hourly = None;
                self.view.error = Some(match ticket.origin {
                    FetchOrigin::Search => format!("Error: {err}"),
                    FetchOrigin::Favorite => format!("Error fetching weather for {}: {err}", ticket.city),
                });
                self.view.phase = Phase::Failed;
            }
        }
        true
    }

    pub async fn search(&mut self, city: &str) {
        if let Some(ticket) = self.begin_search(city) {
            self.run_fetch(ticket).await;
        }
    }

    pub async fn select_favorite(&mut self, city: &str) {
        let ticket = self.begin_select_favorite(city);
        self.run_fetch(ticket).await;
    }

    async fn run_fetch(&mut self, ticket: FetchTicket) {
        let provider = Arc::clone(&self.provider);
        let result = load_city(&*provider, ticket.city()).await;
        self.complete_fetch(ticket, result);
    }

    /// Save the currently displayed city. Returns `false` if it already was a favorite.
    pub fn add_favorite(&mut self) -> Result<bool, DashboardError> {
        let name = match &self.view.weather {
            Some(weather) => weather.location.name.clone(),
            None => return Err(DashboardError::NoWeatherLoaded),
        };

        let added = self.prefs.add_favorite(&name)?;
        if added {
            info!(city = %name, "favorite added");
            self.raise_notification(format!("{name} added to favorites!"), name);
        }
        Ok(added)
    }

    pub fn remove_favorite(&mut self, city: &str) -> Result<bool, DashboardError> {
        let removed = self.prefs.remove_favorite(city)?;
        if removed {
            info!(city, "favorite removed");
        }
        self.raise_notification(format!("{city} removed from favorites!"), city.to_string());
        Ok(removed)
    }

    /// Flip Celsius/Fahrenheit. Display-only, nothing is refetched.
    pub fn toggle_unit(&mut self) -> Result<TemperatureUnit, DashboardError> {
        let unit = self.prefs.unit().toggled();
        self.prefs.set_unit(unit)?;
        debug!(%unit, "unit toggled");
        Ok(unit)
    }

    /// Record new search-box text. Returns a ticket when a suggestion
    /// query should be issued; blank text clears the suggestions instead.
    pub fn begin_suggestions(&mut self, text: &str) -> Option<SuggestionTicket> {
        self.view.search_input = text.to_string();
        self.suggestion_generation += 1;

        let prefix = text.trim();
        if prefix.is_empty() {
            self.view.suggestions.clear();
            return None;
        }
        Some(SuggestionTicket { generation: self.suggestion_generation, prefix: prefix.to_string() })
    }

    /// Apply suggestions unless a newer query superseded them. Failures only
    /// empty the list; they never surface as the dashboard error.
    pub fn complete_suggestions(
        &mut self,
        ticket: SuggestionTicket,
        result: Result<Vec<CitySuggestion>, WeatherError>,
    ) -> bool {
        if ticket.generation != self.suggestion_generation {
            debug!(prefix = %ticket.prefix, "discarding stale suggestions");
            return false;
        }

        self.view.suggestions = result.unwrap_or_else(|err| {
            warn!(prefix = %ticket.prefix, error = %err, "city search failed");
            Vec::new()
        });
        true
    }

    pub async fn query_suggestions(&mut self, text: &str) {
        if let Some(ticket) = self.begin_suggestions(text) {
            let provider = Arc::clone(&self.provider);
            let result = provider.search_cities(ticket.prefix()).await;
            self.complete_suggestions(ticket, result);
        }
    }

    /// The notification, if it is still within its display interval.
    pub fn notification(&self, now: Instant) -> Option<&Notification> {
        self.view
            .notification
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.raised_at) < self.notification_ttl)
    }

    /// Drop the notification once its interval has passed. Returns whether it was dropped.
    pub fn expire_notification(&mut self, now: Instant) -> bool {
        if self.view.notification.is_some() && self.notification(now).is_none() {
            self.view.notification = None;
            return true;
        }
        false
    }

    pub fn dismiss_notification(&mut self) {
        self.view.notification = None;
    }

    fn raise_notification(&mut self, message: String, city: String) {
        self.view.notification = Some(Notification { message, city, raised_at: Instant::now() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{Condition, DaySummary, Location},
        preferences::{FAVORITES_KEY, UNIT_KEY},
        store::MemoryStore,
    };
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex;

    /// Provider that answers from memory and records every call.
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        calls: Mutex<Vec<String>>,
        /// Operation name ("current", "weekly", "hourly", "search") that fails.
        failing: Option<&'static str>,
    }

    impl ScriptedProvider {
        fn failing(op: &'static str) -> Self {
            Self { failing: Some(op), ..Self::default() }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }

        fn record(&self, op: &'static str, arg: &str) -> Result<(), WeatherError> {
            self.calls.lock().expect("calls lock").push(format!("{op}:{arg}"));
            if self.failing == Some(op) {
                return Err(WeatherError::Provider {
                    code: Some(1006),
                    message: "No matching location found.".into(),
                });
            }
            Ok(())
        }
    }

    fn condition() -> Condition {
        Condition { text: "Sunny".into(), icon: "//cdn.weatherapi.com/113.png".into() }
    }

    fn snapshot(city: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            location: Location { name: city.into(), region: String::new(), country: "Nowhere".into() },
            observed_at: Utc::now(),
            condition: condition(),
            temperature_c: 21.0,
            feels_like_c: 20.0,
            humidity_pct: 40,
            wind_kph: 10.0,
            wind_dir: "NW".into(),
            pressure_mb: 1012.0,
            cloud_pct: 25,
        }
    }

    fn hour(h: u32) -> HourlyPoint {
        let local_time = NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .expect("valid time");
        HourlyPoint { local_time, time: local_time.and_utc(), temperature_c: 15.0, condition: condition() }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn current(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
            self.record("current", city)?;
            Ok(snapshot(city))
        }

        async fn weekly_forecast(&self, city: &str) -> Result<Vec<ForecastDay>, WeatherError> {
            self.record("weekly", city)?;
            let start = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");
            Ok(start
                .iter_days()
                .take(7)
                .map(|date| ForecastDay {
                    date,
                    summary: DaySummary { min_c: 10.0, max_c: 20.0, avg_c: 15.0, condition: condition() },
                    hours: (0..24).map(hour).collect(),
                })
                .collect())
        }

        async fn hourly_forecast(&self, city: &str) -> Result<Vec<HourlyPoint>, WeatherError> {
            self.record("hourly", city)?;
            Ok((8..20).map(hour).collect())
        }

        async fn historical(&self, city: &str, _date: NaiveDate) -> Result<WeatherSnapshot, WeatherError> {
            self.record("history", city)?;
            Ok(snapshot(city))
        }

        async fn search_cities(&self, prefix: &str) -> Result<Vec<CitySuggestion>, WeatherError> {
            if prefix.trim().is_empty() {
                return Ok(Vec::new());
            }
            self.record("search", prefix)?;
            Ok(vec![CitySuggestion { name: format!("{prefix}ville"), region: String::new(), country: String::new() }])
        }
    }

    fn controller(provider: &Arc<ScriptedProvider>) -> DashboardController<MemoryStore> {
        controller_with(provider, MemoryStore::new())
    }

    fn controller_with(provider: &Arc<ScriptedProvider>, store: MemoryStore) -> DashboardController<MemoryStore> {
        DashboardController::new(provider.clone(), PreferencesStore::load(store))
    }

    #[tokio::test]
    async fn search_loads_current_week_and_hours_in_order() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);
        let _ = dash.begin_suggestions("Par");

        dash.search("  Paris ").await;

        let view = dash.view();
        assert_eq!(view.phase, Phase::Loaded);
        assert_eq!(view.weather.as_ref().map(|w| w.location.name.as_str()), Some("Paris"));
        assert_eq!(view.forecast.as_ref().map(Vec::len), Some(7));
        assert_eq!(view.hourly.as_ref().map(Vec::len), Some(12));
        assert!(view.error.is_none());
        assert!(view.search_input.is_empty());
        assert_eq!(provider.calls(), ["current:Paris", "weekly:Paris", "hourly:Paris"]);
    }

    #[tokio::test]
    async fn blank_search_is_ignored() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);

        dash.search("   ").await;

        assert_eq!(dash.view().phase, Phase::Idle);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_weekly_forecast_skips_hourly() {
        let provider = Arc::new(ScriptedProvider::failing("weekly"));
        let mut dash = controller(&provider);

        dash.search("Paris").await;

        assert_eq!(provider.calls(), ["current:Paris", "weekly:Paris"]);
        let view = dash.view();
        assert_eq!(view.phase, Phase::Failed);
        assert_eq!(view.error.as_deref(), Some("Error: No matching location found."));
        assert!(view.weather.is_none());
        assert!(view.forecast.is_none());
        assert!(view.hourly.is_none());
    }

    #[tokio::test]
    async fn failed_current_stops_the_pipeline() {
        let provider = Arc::new(ScriptedProvider::failing("current"));
        let mut dash = controller(&provider);

        dash.search("Atlantis").await;

        assert_eq!(provider.calls(), ["current:Atlantis"]);
        assert_eq!(dash.view().phase, Phase::Failed);
    }

    #[tokio::test]
    async fn failure_clears_previously_loaded_city() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);
        dash.search("Paris").await;
        assert!(dash.view().weather.is_some());

        let ticket = dash.begin_search("Atlantis").expect("ticket");
        assert!(dash.is_loading());
        let err = WeatherError::Provider { code: None, message: "No matching location found.".into() };
        assert!(dash.complete_fetch(ticket, Err(err)));

        assert!(dash.view().weather.is_none());
        assert_eq!(dash.view().phase, Phase::Failed);
    }

    #[tokio::test]
    async fn favorite_failure_names_the_city_and_keeps_input() {
        let provider = Arc::new(ScriptedProvider::failing("hourly"));
        let mut dash = controller(&provider);
        let _ = dash.begin_suggestions("Lon");

        dash.select_favorite("Oslo").await;

        assert_eq!(
            dash.view().error.as_deref(),
            Some("Error fetching weather for Oslo: No matching location found.")
        );
        assert_eq!(dash.view().search_input, "Lon");
    }

    #[tokio::test]
    async fn stale_search_response_is_discarded() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);

        let paris = dash.begin_search("Paris").expect("ticket");
        let tokyo = dash.begin_search("Tokyo").expect("ticket");

        let tokyo_data = load_city(&*provider, tokyo.city()).await;
        let paris_data = load_city(&*provider, paris.city()).await;

        assert!(dash.complete_fetch(tokyo, tokyo_data));
        assert!(!dash.complete_fetch(paris, paris_data));

        assert_eq!(dash.view().phase, Phase::Loaded);
        assert_eq!(dash.view().weather.as_ref().map(|w| w.location.name.as_str()), Some("Tokyo"));
    }

    #[tokio::test]
    async fn stale_response_does_not_end_loading() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);

        let paris = dash.begin_search("Paris").expect("ticket");
        let _tokyo = dash.begin_search("Tokyo").expect("ticket");

        let paris_data = load_city(&*provider, paris.city()).await;
        assert!(!dash.complete_fetch(paris, paris_data));
        assert!(dash.is_loading());
        assert!(dash.view().weather.is_none());
    }

    #[test]
    fn add_favorite_requires_loaded_weather() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);

        assert!(matches!(dash.add_favorite(), Err(DashboardError::NoWeatherLoaded)));
        assert!(dash.favorites().is_empty());
        assert!(dash.view().notification.is_none());
    }

    #[tokio::test]
    async fn add_favorite_uses_resolved_name_and_notifies_once() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);
        dash.search("Paris").await;

        assert!(dash.add_favorite().expect("add"));
        let note = dash.notification(Instant::now()).expect("notification");
        assert_eq!(note.message, "Paris added to favorites!");
        assert_eq!(note.city, "Paris");

        dash.dismiss_notification();
        assert!(!dash.add_favorite().expect("add again"));
        assert_eq!(dash.favorites(), ["Paris"]);
        assert!(dash.notification(Instant::now()).is_none());
    }

    #[test]
    fn remove_favorite_notifies_and_tolerates_absent_names() {
        let provider = Arc::new(ScriptedProvider::default());
        let store = MemoryStore::new().with_entry(FAVORITES_KEY, r#"["Oslo","Lima"]"#);
        let mut dash = controller_with(&provider, store);

        assert!(dash.remove_favorite("Oslo").expect("remove"));
        assert_eq!(dash.favorites(), ["Lima"]);
        assert_eq!(
            dash.notification(Instant::now()).map(|n| n.message.as_str()),
            Some("Oslo removed from favorites!")
        );

        assert!(!dash.remove_favorite("Paris").expect("remove absent"));
        assert_eq!(dash.favorites(), ["Lima"]);
    }

    #[tokio::test]
    async fn selecting_a_favorite_loads_it() {
        let provider = Arc::new(ScriptedProvider::default());
        let store = MemoryStore::new().with_entry(FAVORITES_KEY, r#"["Oslo"]"#);
        let mut dash = controller_with(&provider, store);

        dash.select_favorite("Oslo").await;

        assert_eq!(dash.view().phase, Phase::Loaded);
        assert_eq!(provider.calls(), ["current:Oslo", "weekly:Oslo", "hourly:Oslo"]);
    }

    #[tokio::test]
    async fn toggling_unit_twice_restores_unit_and_storage() {
        let provider = Arc::new(ScriptedProvider::default());
        let store = MemoryStore::new().with_entry(UNIT_KEY, "C");
        let mut dash = controller_with(&provider, store);
        dash.search("Paris").await;
        let calls_before = provider.calls().len();

        assert_eq!(dash.toggle_unit().expect("toggle"), TemperatureUnit::Fahrenheit);
        assert_eq!(dash.prefs.backend().get(UNIT_KEY).as_deref(), Some("F"));
        assert_eq!(dash.toggle_unit().expect("toggle"), TemperatureUnit::Celsius);
        assert_eq!(dash.prefs.backend().get(UNIT_KEY).as_deref(), Some("C"));

        assert_eq!(provider.calls().len(), calls_before);
        assert!(dash.view().weather.is_some());
    }

    #[tokio::test]
    async fn empty_prefix_clears_suggestions_without_a_call() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);

        dash.query_suggestions("Par").await;
        assert_eq!(dash.view().suggestions.len(), 1);

        dash.query_suggestions("  ").await;
        assert!(dash.view().suggestions.is_empty());
        assert_eq!(provider.calls(), ["search:Par"]);
    }

    #[tokio::test]
    async fn out_of_order_suggestions_keep_latest_query() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut dash = controller(&provider);

        let first = dash.begin_suggestions("Pa").expect("ticket");
        let second = dash.begin_suggestions("Par").expect("ticket");

        let second_result = provider.search_cities(second.prefix()).await;
        let first_result = provider.search_cities(first.prefix()).await;

        assert!(dash.complete_suggestions(second, second_result));
        assert!(!dash.complete_suggestions(first, first_result));
        assert_eq!(dash.view().suggestions[0].name, "Parville");
    }

    #[tokio::test]
    async fn failed_suggestions_do_not_set_error() {
        let provider = Arc::new(ScriptedProvider::failing("search"));
        let mut dash = controller(&provider);

        dash.query_suggestions("Par").await;

        assert!(dash.view().suggestions.is_empty());
        assert!(dash.view().error.is_none());
    }

    #[test]
    fn notification_expires_after_interval() {
        let provider = Arc::new(ScriptedProvider::default());
        let store = MemoryStore::new().with_entry(FAVORITES_KEY, r#"["Oslo"]"#);
        let ttl = Duration::from_millis(500);
        let mut dash = controller_with(&provider, store).with_notification_ttl(ttl);

        dash.remove_favorite("Oslo").expect("remove");
        let now = Instant::now();
        assert!(dash.notification(now).is_some());
        assert!(!dash.expire_notification(now));

        let later = now + ttl + Duration::from_millis(1);
        assert!(dash.notification(later).is_none());
        assert!(dash.expire_notification(later));
        assert!(dash.view().notification.is_none());
    }
}
