//! API Module
//!
//! HTTP handlers and routing for the weather service.
//!
//! # Endpoints
//! - `GET /` - Redirect to `/weather`
//! - `GET /weather` - Current weather, served through the cache
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
