//! Typed errors for the provider client, the preferences store and the controller.

use thiserror::Error;

/// Failure of a single provider call.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The request never produced a readable response.
    #[error("failed to reach WeatherAPI ({endpoint}): {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("WeatherAPI {endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    /// Well-formed answer in which the provider reports a failure, e.g. unknown city.
    #[error("{message}")]
    Provider { code: Option<i64>, message: String },

    #[error("failed to parse WeatherAPI {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("WeatherAPI {endpoint} response contained no forecast data")]
    MissingData { endpoint: &'static str },
}

impl WeatherError {
    pub fn is_transport(&self) -> bool {
        matches!(self, WeatherError::Network { .. } | WeatherError::Status { .. })
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, WeatherError::Provider { .. })
    }
}

/// Failure of the key-value persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode stored value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("stored value under '{key}' is corrupt: {reason}")]
    Decode { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("no weather loaded; search for a city first")]
    NoWeatherLoaded,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_provider_message() {
        let err = WeatherError::Provider { code: Some(1006), message: "No matching location found.".into() };
        assert_eq!(err.to_string(), "No matching location found.");
        assert!(err.is_provider());
        assert!(!err.is_transport());
    }

    #[test]
    fn status_error_is_transport() {
        let err = WeatherError::Status { endpoint: "current", status: 503, body: "busy".into() };
        assert!(err.is_transport());
        assert!(err.to_string().contains("503"));
    }
}
