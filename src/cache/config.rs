//! Cache configuration.
//!
//! Controls the query cache via the `[cache]` section of `cachet.toml`.

use std::time::Duration;

pub(crate) const DEFAULT_TTL_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every query goes straight to the engine.
    pub enabled: bool,
    /// Lifetime of each cached entry.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: settings.ttl,
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
