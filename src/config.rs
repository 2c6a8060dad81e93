//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default TTL applied to every cache write, in seconds.
pub const DEFAULT_EXPIRATION: u64 = 3600;

/// Default OpenWeather "current weather" endpoint.
pub const DEFAULT_WEATHER_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

// == Store Backend ==
/// Which cache store the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Networked Redis store
    Redis,
    /// In-process store, for local runs without Redis
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

// == Corrupt Entry Policy ==
/// What the accessor does when a cached value cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorruptEntryPolicy {
    /// Fail the call with a deserialization error
    #[default]
    Fail,
    /// Treat the entry as a miss and fetch fresh data
    Refetch,
}

impl FromStr for CorruptEntryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(CorruptEntryPolicy::Fail),
            "refetch" => Ok(CorruptEntryPolicy::Refetch),
            other => Err(format!("unknown corrupt entry policy '{}'", other)),
        }
    }
}

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// TTL in seconds for every cache write
    pub default_ttl: u64,
    /// Cache store implementation
    pub store_backend: StoreBackend,
    /// Redis connection URL
    pub redis_url: String,
    /// Upper bound for a single store operation, in milliseconds
    pub store_timeout_ms: u64,
    /// Capacity of the in-memory store
    pub max_entries: usize,
    /// Memory store cleanup interval in seconds
    pub cleanup_interval: u64,
    /// Handling of undecodable cache entries
    pub corrupt_entry_policy: CorruptEntryPolicy,
    /// Coalesce concurrent fetches for the same key
    pub single_flight: bool,
    /// HTTP server port
    pub server_port: u16,
    /// Upstream weather endpoint
    pub weather_api_url: String,
    /// Upstream API key
    pub weather_api_key: Option<String>,
    /// Upper bound for a whole upstream request, in milliseconds
    pub upstream_timeout_ms: u64,
    /// Units used when the request does not name any
    pub default_units: String,
    /// City used when the request does not name any
    pub default_city: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_EXPIRATION` - Cache TTL in seconds, must be positive (default: 3600)
    /// - `STORE_BACKEND` - `redis` or `memory` (default: redis)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379)
    /// - `STORE_TIMEOUT_MS` - Store operation timeout (default: 2000)
    /// - `MAX_ENTRIES` - Memory store capacity (default: 1000)
    /// - `CLEANUP_INTERVAL` - Memory store cleanup frequency in seconds (default: 1)
    /// - `CORRUPT_ENTRY_POLICY` - `fail` or `refetch` (default: fail)
    /// - `SINGLE_FLIGHT` - `true` to coalesce concurrent fetches (default: false)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `WEATHER_API_URL` - Upstream endpoint (default: OpenWeather 2.5)
    /// - `OPEN_WEATHER_SECRET` - Upstream API key (default: unset)
    /// - `UPSTREAM_TIMEOUT_MS` - Upstream request timeout (default: 10000)
    /// - `C_TEMP` - Default units (default: metric)
    /// - `DEFAULT_CITY` - Default city (default: Giza)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_ttl: parse_var("DEFAULT_EXPIRATION")
                .filter(|ttl: &u64| *ttl > 0)
                .unwrap_or(defaults.default_ttl),
            store_backend: parse_var("STORE_BACKEND").unwrap_or(defaults.store_backend),
            redis_url: string_var("REDIS_URL").unwrap_or(defaults.redis_url),
            store_timeout_ms: parse_var("STORE_TIMEOUT_MS")
                .filter(|ms: &u64| *ms > 0)
                .unwrap_or(defaults.store_timeout_ms),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            corrupt_entry_policy: parse_var("CORRUPT_ENTRY_POLICY")
                .unwrap_or(defaults.corrupt_entry_policy),
            single_flight: parse_var("SINGLE_FLIGHT").unwrap_or(defaults.single_flight),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            weather_api_url: string_var("WEATHER_API_URL").unwrap_or(defaults.weather_api_url),
            weather_api_key: string_var("OPEN_WEATHER_SECRET"),
            upstream_timeout_ms: parse_var("UPSTREAM_TIMEOUT_MS")
                .filter(|ms: &u64| *ms > 0)
                .unwrap_or(defaults.upstream_timeout_ms),
            default_units: string_var("C_TEMP").unwrap_or(defaults.default_units),
            default_city: string_var("DEFAULT_CITY").unwrap_or(defaults.default_city),
        }
    }

    /// Store operation timeout as a Duration.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Upstream request timeout as a Duration.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Cache TTL as a Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_EXPIRATION,
            store_backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            store_timeout_ms: 2000,
            max_entries: 1000,
            cleanup_interval: 1,
            corrupt_entry_policy: CorruptEntryPolicy::Fail,
            single_flight: false,
            server_port: 3000,
            weather_api_url: DEFAULT_WEATHER_API_URL.to_string(),
            weather_api_key: None,
            upstream_timeout_ms: 10_000,
            default_units: "metric".to_string(),
            default_city: "Giza".to_string(),
        }
    }
}

fn string_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
