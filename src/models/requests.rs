//! Request DTOs for the weather API
//!
//! Defines the structure of incoming query strings.

use serde::Deserialize;

/// Query string of `GET /weather`
///
/// Both fields fall back to the configured defaults when missing or blank.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherQuery {
    /// City name as understood by the upstream API
    #[serde(default)]
    pub city: Option<String>,
    /// `metric`, `imperial` or `standard`
    #[serde(default)]
    pub units: Option<String>,
}

impl WeatherQuery {
    pub fn new(city: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            city: Some(city.into()),
            units: Some(units.into()),
        }
    }
}
