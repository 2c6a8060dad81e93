//! Weather Service
//!
//! Builds cache keys for weather lookups and serves them through the
//! cache-aside accessor, optionally coalescing concurrent fetches.

use serde_json::Value;
use tracing::debug;

use crate::cache::{CacheAside, CacheStats, SingleFlight};
use crate::config::Config;
use crate::error::Result;
use crate::models::WeatherQuery;
use crate::weather::{OpenWeatherClient, WeatherError};

/// Cache key for a current-weather lookup.
///
/// Resource name plus every parameter that changes the upstream answer.
/// Components are percent-encoded, so distinct (city, units) pairs never
/// share a key.
pub fn weather_cache_key(city: &str, units: &str) -> String {
    format!(
        "weather?q={}&units={}",
        urlencoding::encode(city),
        urlencoding::encode(units)
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// == Weather Service ==
pub struct WeatherService {
    cache: CacheAside,
    client: OpenWeatherClient,
    flights: Option<SingleFlight<Value>>,
    default_city: String,
    default_units: String,
}

impl WeatherService {
    pub fn new(cache: CacheAside, client: OpenWeatherClient) -> Self {
        let defaults = Config::default();
        Self {
            cache,
            client,
            flights: None,
            default_city: defaults.default_city,
            default_units: defaults.default_units,
        }
    }

    pub fn from_config(
        cache: CacheAside,
        config: &Config,
    ) -> std::result::Result<Self, WeatherError> {
        Ok(Self::new(cache, OpenWeatherClient::from_config(config)?)
            .with_defaults(config.default_city.clone(), config.default_units.clone())
            .with_single_flight(config.single_flight))
    }

    pub fn with_defaults(mut self, city: impl Into<String>, units: impl Into<String>) -> Self {
        self.default_city = city.into();
        self.default_units = units.into();
        self
    }

    /// Enables or disables coalescing of concurrent fetches for the same key.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.flights = enabled.then(SingleFlight::new);
        self
    }

    // == Current ==
    /// Current weather for the query, from cache when possible.
    pub async fn current(&self, query: &WeatherQuery) -> Result<Value> {
        let city = non_blank(query.city.as_deref()).unwrap_or(&self.default_city).to_string();
        let units = non_blank(query.units.as_deref()).unwrap_or(&self.default_units).to_string();
        let key = weather_cache_key(&city, &units);

        match &self.flights {
            Some(flights) => {
                let cache = self.cache.clone();
                let client = self.client.clone();
                let flight_key = key.clone();
                flights
                    .run(&key, move || async move {
                        cache
                            .get_or_set_cache(&flight_key, || async move {
                                client.current(&city, &units).await
                            })
                            .await
                    })
                    .await
            }
            None => {
                debug!(key = %key, "weather lookup");
                self.cache
                    .get_or_set_cache(&key, || self.client.current(&city, &units))
                    .await
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Calls that joined an in-flight fetch; zero when coalescing is off.
    pub fn coalesced(&self) -> u64 {
        self.flights.as_ref().map_or(0, SingleFlight::coalesced)
    }

    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_cache_key() {
        assert_eq!(
            weather_cache_key("Giza", "metric"),
            "weather?q=Giza&units=metric"
        );
    }

    #[test]
    fn test_key_components_are_escaped() {
        assert_eq!(
            weather_cache_key("New York", "metric"),
            "weather?q=New%20York&units=metric"
        );
        assert_ne!(
            weather_cache_key("X&units=imperial", "metric"),
            weather_cache_key("X", "imperial&units=metric")
        );
    }

    #[test]
    fn test_units_distinguish_keys() {
        assert_ne!(
            weather_cache_key("Cairo", "metric"),
            weather_cache_key("Cairo", "imperial")
        );
    }
}
