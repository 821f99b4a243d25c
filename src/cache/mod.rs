//! Cachet query cache.
//!
//! - **Decorator**: [`CachedQueryEngine`] serves cache-enabled queries from a
//!   key-value store and falls through to the wrapped engine on a miss.
//! - **Invalidation**: [`InvalidationCoordinator`] clears an actor's cache
//!   group once a mutating request handler has finished.
//!
//! Entries live in per-group hashes (`HGET`/`HSET group compound_key`) with a
//! short TTL; a group is deleted in one `DEL`.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 10
//! ```

mod config;
mod decorator;
mod entry;
mod invalidation;
mod keys;
mod memory;
mod store;

pub use config::CacheConfig;
pub use decorator::CachedQueryEngine;
pub use invalidation::{CacheInvalidator, InvalidationCoordinator, Phase};
pub use keys::{CacheOptions, CompoundKey, DEFAULT_GROUP, GroupKey};
pub use memory::MemoryKvStore;
pub use store::{KvStore, StoreError};

pub(crate) use config::DEFAULT_TTL_SECS;

pub const METRIC_QUERY_CACHE_HIT: &str = "cachet_query_cache_hit_total";
pub const METRIC_QUERY_CACHE_MISS: &str = "cachet_query_cache_miss_total";
pub const METRIC_QUERY_CACHE_BYPASS: &str = "cachet_query_cache_bypass_total";
pub const METRIC_QUERY_CACHE_CORRUPT: &str = "cachet_query_cache_corrupt_total";
pub const METRIC_KV_ERROR: &str = "cachet_kv_error_total";
pub const METRIC_INVALIDATION: &str = "cachet_invalidation_total";
pub const METRIC_INVALIDATION_ERROR: &str = "cachet_invalidation_error_total";

fn record_store_error(op: &'static str) {
    metrics::counter!(METRIC_KV_ERROR, "op" => op).increment(1);
}
