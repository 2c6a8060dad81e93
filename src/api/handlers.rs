//! API Handlers
//!
//! HTTP request handlers for each endpoint.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use serde_json::Value;
use tracing::error;

use crate::error::Result;
use crate::models::{HealthResponse, StatsResponse, WeatherQuery};
use crate::weather::WeatherService;

/// Application state shared across all handlers.
///
/// The service owns the process-wide cache handle; cloning the state only
/// bumps a reference count.
#[derive(Clone)]
pub struct AppState {
    pub weather: Arc<WeatherService>,
}

impl AppState {
    /// Creates a new AppState around the given service.
    pub fn new(weather: WeatherService) -> Self {
        Self {
            weather: Arc::new(weather),
        }
    }
}

/// Handler for GET /
pub async fn index_handler() -> Redirect {
    Redirect::to("/weather")
}

/// Handler for GET /weather
///
/// Returns the upstream payload for `city` and `units`, from cache when present.
pub async fn weather_handler(
    State(state): State<AppState>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<Value>> {
    let data = state.weather.current(&query).await.map_err(|err| {
        error!(error = %err, "error fetching weather data");
        err
    })?;

    Ok(Json(data))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let weather = &state.weather;
    Json(StatsResponse::new(
        weather.cache().store_name(),
        weather.stats(),
        weather.coalesced(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheAside, CacheOptions, CacheStore, MemoryStore};
    use crate::error::CacheError;
    use crate::weather::{weather_cache_key, OpenWeatherClient};
    use axum::response::IntoResponse;
    use serde_json::json;
    use std::time::Duration;

    /// State whose upstream is unreachable, so only cached data can be served.
    fn offline_state() -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(100));
        let cache = CacheAside::new(store.clone(), CacheOptions::default());
        let client = OpenWeatherClient::new("http://127.0.0.1:9/weather", None);
        (AppState::new(WeatherService::new(cache, client)), store)
    }

    #[tokio::test]
    async fn test_weather_handler_serves_cached_value() {
        let (state, store) = offline_state();
        store
            .write_with_ttl(
                &weather_cache_key("Giza", "metric"),
                br#"{"temp":20}"#.to_vec(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let Json(data) = weather_handler(State(state.clone()), Query(WeatherQuery::default()))
            .await
            .unwrap();

        assert_eq!(data, json!({"temp": 20}));
        assert_eq!(state.weather.stats().fetches, 0);
    }

    #[tokio::test]
    async fn test_weather_handler_upstream_failure() {
        let (state, _) = offline_state();

        let result =
            weather_handler(State(state), Query(WeatherQuery::new("Cairo", "metric"))).await;

        assert!(matches!(result, Err(CacheError::Producer(_))));
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let (state, _) = offline_state();

        let response = stats_handler(State(state)).await;
        assert_eq!(response.store, "memory");
        assert_eq!(response.stats.hits, 0);
        assert_eq!(response.coalesced, 0);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_index_redirects() {
        let response = index_handler().await.into_response();
        assert!(response.status().is_redirection());
        assert_eq!(response.headers()["location"], "/weather");
    }
}
