//! Cache Module
//!
//! Cache-aside coordination over an expiring key-value store.
//!
//! # Components
//! - [`CacheAside`]: get-or-compute-and-cache accessor
//! - [`CacheStore`]: store seam, implemented by [`RedisStore`] and [`MemoryStore`]
//! - [`SingleFlight`]: optional coalescing of concurrent calls per key

mod accessor;
mod entry;
mod memory;
mod redis_store;
mod single_flight;
mod stats;
mod store;


// Re-export public types
pub use accessor::{CacheAside, CacheOptions};
pub use entry::CacheEntry;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use single_flight::SingleFlight;
pub use stats::CacheStats;
pub use store::CacheStore;
