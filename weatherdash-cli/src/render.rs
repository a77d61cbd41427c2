//! Plain-text rendering of the dashboard view.

use std::fmt::Write;

use weatherdash_core::{
    CitySuggestion, ForecastDay, HourlyPoint, Phase, TemperatureUnit, ViewState, WeatherSnapshot,
};

pub fn snapshot(w: &WeatherSnapshot, unit: TemperatureUnit) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", w.location);
    let _ = writeln!(out, "  {}", w.condition.text);
    let _ = writeln!(out, "  Temperature: {} (feels like {})", unit.format(w.temperature_c), unit.format(w.feels_like_c));
    let _ = writeln!(out, "  Humidity:    {}%", w.humidity_pct);
    let _ = writeln!(out, "  Wind:        {} kph {}", w.wind_kph, w.wind_dir);
    let _ = writeln!(out, "  Pressure:    {} mb", w.pressure_mb);
    let _ = writeln!(out, "  Cloud Cover: {}%", w.cloud_pct);
    let _ = writeln!(out, "  Observed:    {}", w.observed_at.format("%Y-%m-%d %H:%M UTC"));
    out
}

pub fn hourly(points: &[HourlyPoint], unit: TemperatureUnit) -> String {
    let mut out = String::from("Next hours\n");
    for p in points {
        let _ = writeln!(out, "  {}  {:>9}  {}", p.local_time.format("%H:%M"), unit.format(p.temperature_c), p.condition.text);
    }
    out
}

pub fn week(days: &[ForecastDay], unit: TemperatureUnit) -> String {
    let mut out = String::from("This week\n");
    for d in days {
        let _ = writeln!(
            out,
            "  {}  {:>9} / {:>9}  {}",
            d.date.format("%a %d %b"),
            unit.format(d.summary.min_c),
            unit.format(d.summary.max_c),
            d.summary.condition.text
        );
    }
    out
}

pub fn favorites(names: &[String]) -> String {
    if names.is_empty() {
        return "No favorite cities added.\n".to_string();
    }
    let mut out = String::from("Favorite Cities\n");
    for name in names {
        let _ = writeln!(out, "  - {name}");
    }
    out
}

pub fn suggestions(hits: &[CitySuggestion]) -> String {
    if hits.is_empty() {
        return "No matching cities.\n".to_string();
    }
    hits.iter().map(|h| format!("  {h}\n")).collect()
}

/// Whole dashboard: status line, then whatever data is loaded.
pub fn view(view: &ViewState, unit: TemperatureUnit) -> String {
    let mut out = String::new();

    if view.phase == Phase::Loading {
        out.push_str("Loading weather data...\n");
    }
    if let Some(err) = &view.error {
        let _ = writeln!(out, "{err}");
    }
    if let Some(w) = &view.weather {
        out.push_str(&snapshot(w, unit));
    }
    if let Some(points) = &view.hourly {
        out.push('\n');
        out.push_str(&hourly(points, unit));
    }
    if let Some(days) = &view.forecast {
        out.push('\n');
        out.push_str(&week(days, unit));
    }
    out
}
