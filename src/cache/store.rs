//! Artifact store contract and the in-memory implementation.

use std::{
    sync::RwLock,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use thiserror::Error;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";
const MAX_MEMORY_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

/// Failures raised by an artifact store backend.
///
/// Callers treat these as transient: a failed lookup is a miss and a failed write is
/// dropped after logging.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("artifact entry `{key}` is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("artifact store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn corrupt(key: &CacheKey, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Key-value capability holding rendered artifacts with an expiry.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch the artifact stored under `key`, or `None` when absent or expired.
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Bytes>, StoreError>;

    /// Store `bytes` under `key` for `ttl`. Concurrent writers race; the last write wins.
    async fn store(&self, key: &CacheKey, bytes: Bytes, ttl: Duration) -> Result<(), StoreError>;
}

#[derive(Clone)]
struct MemoryEntry {
    bytes: Bytes,
    expires_at: Instant,
}

/// Process-local artifact store with LRU eviction and per-entry expiry.
pub struct MemoryArtifactStore {
    entries: RwLock<LruCache<CacheKey, MemoryEntry>>,
}

impl MemoryArtifactStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.memory_limit_non_zero())),
        }
    }

    fn get_fresh(&self, key: &CacheKey, now: Instant) -> Option<Bytes> {
        let mut entries = rw_write(&self.entries, SOURCE, "lookup");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.bytes.clone()),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: CacheKey, bytes: Bytes, ttl: Duration, now: Instant) -> Option<CacheKey> {
        let expires_at = now + ttl.min(MAX_MEMORY_TTL);
        rw_write(&self.entries, SOURCE, "store")
            .push(key.clone(), MemoryEntry { bytes, expires_at })
            .filter(|(evicted, _)| *evicted != key)
            .map(|(evicted, _)| evicted)
    }

    /// Number of entries currently held, including expired ones not yet observed.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Bytes>, StoreError> {
        Ok(self.get_fresh(key, Instant::now()))
    }

    async fn store(&self, key: &CacheKey, bytes: Bytes, ttl: Duration) -> Result<(), StoreError> {
        if let Some(evicted) = self.put(key.clone(), bytes, ttl, Instant::now()) {
            tracing::debug!(
                target = SOURCE,
                evicted = %evicted,
                "evicted least recently used artifact"
            );
        }
        Ok(())
    }
}
