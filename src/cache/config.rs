//! Artifact store configuration.
//!
//! Controls the in-memory store capacity via `ogcache.toml`. The artifact lifetime lives in
//! `StoreSettings::ttl` and is handed to the generate pipeline directly.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_MEMORY_LIMIT: usize = 512;
pub(crate) const DEFAULT_ARTIFACT_TTL_SECS: u64 = 60 * 60 * 24 * 365;

/// Artifact store configuration from `ogcache.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum artifacts held by the in-memory store.
    pub memory_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }
}

impl From<&crate::config::StoreSettings> for CacheConfig {
    fn from(settings: &crate::config::StoreSettings) -> Self {
        Self {
            memory_limit: settings.memory_limit.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the memory limit as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
