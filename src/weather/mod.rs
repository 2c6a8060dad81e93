//! Weather Module
//!
//! The upstream producer and the service that puts the cache in front of it.

mod client;
mod service;

pub use client::{OpenWeatherClient, WeatherError};
pub use service::{weather_cache_key, WeatherService};
