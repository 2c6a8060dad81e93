//! OpenWeather Client
//!
//! Thin HTTP client for the upstream "current weather" endpoint. The payload is
//! passed through as opaque JSON.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;

// == Weather Error ==
/// Failure to obtain data from the upstream API.
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Transport failure or undecodable body
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

// == OpenWeather Client ==
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, WeatherError> {
        Self::new(config.weather_api_url.clone(), config.weather_api_key.clone())
            .with_timeout(config.upstream_timeout())
    }

    /// Bounds every upstream request, connect through body, by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, WeatherError> {
        self.http = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    // == Current Weather ==
    /// Fetches current conditions for `city` in the given `units`.
    pub async fn current(&self, city: &str, units: &str) -> Result<Value, WeatherError> {
        let mut params = vec![("q", city), ("units", units)];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("appid", key));
        }

        debug!(city, units, "requesting upstream weather");
        let response = self.http.get(&self.base_url).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::Status { status, body });
        }

        Ok(response.json::<Value>().await?)
    }
}
