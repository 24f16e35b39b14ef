//! Artifact cache: key derivation and storage.
//!
//! - **Keys**: `{identifier}:{fingerprint}` where the fingerprint covers the page metadata
//! - **Store**: the `ArtifactStore` capability plus an in-memory LRU implementation
//!
//! ## Configuration
//!
//! Store behavior is controlled via `ogcache.toml`:
//!
//! ```toml
//! [store]
//! backend = "filesystem"
//! directory = "og-cache"
//! ttl_seconds = 31536000
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub(crate) use config::DEFAULT_ARTIFACT_TTL_SECS;
pub use keys::{CacheKey, fingerprint, hash_bytes};
pub use store::{ArtifactStore, MemoryArtifactStore, StoreError};
