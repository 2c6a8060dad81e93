//! Weather Cache - a cache-aside layer in front of the OpenWeather API
//!
//! Serves current-weather lookups from Redis when possible and from the
//! upstream API otherwise, repopulating the cache on every miss.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;
pub mod weather;

pub use api::AppState;
pub use cache::{CacheAside, CacheOptions, CacheStore};
pub use config::Config;
pub use error::{CacheError, Result, StoreError};
pub use tasks::spawn_cleanup_task;
