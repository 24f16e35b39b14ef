//! Filesystem-backed artifact store.
//!
//! Each entry is a pair of files named by the SHA-256 of the cache key: `<digest>.bin` holds
//! the image bytes and `<digest>.json` records the key, byte length and expiry.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{ArtifactStore, CacheConfig, CacheKey, MemoryArtifactStore, StoreError};
use crate::config::{StoreBackend, StoreSettings};

use super::error::InfraError;

const SOURCE: &str = "infra::artifacts";
const MAX_TTL_SECS: u64 = 60 * 60 * 24 * 365 * 100;

/// Open the artifact store selected by the settings.
pub fn open_artifact_store(settings: &StoreSettings) -> Result<Arc<dyn ArtifactStore>, InfraError> {
    match settings.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryArtifactStore::new(&CacheConfig::from(
            settings,
        )))),
        StoreBackend::Filesystem => {
            let store = FilesystemArtifactStore::new(settings.directory.clone()).map_err(|err| {
                InfraError::configuration(format!(
                    "failed to prepare artifact directory `{}`: {err}",
                    settings.directory.display()
                ))
            })?;
            Ok(Arc::new(store))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    key: String,
    size: u64,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
}

/// Artifact store persisting entries under a directory.
#[derive(Debug)]
pub struct FilesystemArtifactStore {
    root: PathBuf,
}

impl FilesystemArtifactStore {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn paths(&self, key: &CacheKey) -> (PathBuf, PathBuf) {
        let digest = hex::encode(Sha256::digest(key.as_str().as_bytes()));
        (
            self.root.join(format!("{digest}.bin")),
            self.root.join(format!("{digest}.json")),
        )
    }

    async fn remove_entry(&self, data_path: &Path, sidecar_path: &Path) {
        for path in [sidecar_path, data_path] {
            match fs::remove_file(path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => debug!(
                    target = SOURCE,
                    path = %path.display(),
                    error = %err,
                    "Failed to remove expired artifact file"
                ),
            }
        }
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("artifact");
        let temp_path = self
            .root
            .join(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));

        if let Err(err) = fs::write(&temp_path, contents).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err.into());
        }
        Ok(())
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl ArtifactStore for FilesystemArtifactStore {
    async fn lookup(&self, key: &CacheKey) -> Result<Option<Bytes>, StoreError> {
        let (data_path, sidecar_path) = self.paths(key);

        let Some(raw_sidecar) = read_optional(&sidecar_path).await? else {
            return Ok(None);
        };
        let sidecar: Sidecar = serde_json::from_slice(&raw_sidecar)
            .map_err(|err| StoreError::corrupt(key, format!("unreadable sidecar: {err}")))?;

        if sidecar.key != key.as_str() {
            // Digest collision or a foreign file; never serve another key's bytes.
            return Ok(None);
        }

        if sidecar.expires_at <= OffsetDateTime::now_utc() {
            self.remove_entry(&data_path, &sidecar_path).await;
            debug!(target = SOURCE, cache_key = %key, "Artifact expired");
            return Ok(None);
        }

        let Some(data) = read_optional(&data_path).await? else {
            return Ok(None);
        };
        if data.len() as u64 != sidecar.size {
            return Err(StoreError::corrupt(
                key,
                format!("expected {} bytes, found {}", sidecar.size, data.len()),
            ));
        }

        Ok(Some(Bytes::from(data)))
    }

    async fn store(&self, key: &CacheKey, bytes: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let (data_path, sidecar_path) = self.paths(key);
        let ttl_secs = ttl.as_secs().min(MAX_TTL_SECS) as i64;
        let sidecar = Sidecar {
            key: key.as_str().to_string(),
            size: bytes.len() as u64,
            expires_at: OffsetDateTime::now_utc() + time::Duration::seconds(ttl_secs),
        };
        let encoded = serde_json::to_vec(&sidecar)
            .map_err(|err| StoreError::corrupt(key, format!("failed to encode sidecar: {err}")))?;

        self.write_atomic(&data_path, &bytes).await?;
        self.write_atomic(&sidecar_path, &encoded).await?;

        debug!(
            target = SOURCE,
            cache_key = %key,
            bytes = bytes.len(),
            ttl_secs,
            "Artifact stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(value: &str) -> CacheKey {
        CacheKey::new(value, "146ec551")
    }

    #[tokio::test]
    async fn stores_and_reads_back() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemArtifactStore::new(dir.path().join("og")).expect("store");

        store
            .store(&key("/blog/foo"), Bytes::from_static(b"png"), Duration::from_secs(60))
            .await
            .expect("stored");

        let bytes = store.lookup(&key("/blog/foo")).await.expect("lookup");
        assert_eq!(bytes, Some(Bytes::from_static(b"png")));
        assert_eq!(store.lookup(&key("/blog/bar")).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn entry_files_use_key_digest() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemArtifactStore::new(dir.path().to_path_buf()).expect("store");
        let key = key("/blog/foo");

        store
            .store(&key, Bytes::from_static(b"png"), Duration::from_secs(60))
            .await
            .expect("stored");

        let (data_path, sidecar_path) = store.paths(&key);
        assert!(data_path.exists());
        assert!(sidecar_path.exists());
        let stem = data_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .expect("stem");
        assert_eq!(stem.len(), 64);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_removed() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemArtifactStore::new(dir.path().to_path_buf()).expect("store");
        let key = key("/blog/foo");

        store
            .store(&key, Bytes::from_static(b"png"), Duration::ZERO)
            .await
            .expect("stored");

        assert_eq!(store.lookup(&key).await.expect("lookup"), None);
        let (data_path, sidecar_path) = store.paths(&key);
        assert!(!data_path.exists());
        assert!(!sidecar_path.exists());
    }

    #[tokio::test]
    async fn rewrites_replace_previous_bytes() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemArtifactStore::new(dir.path().to_path_buf()).expect("store");
        let key = key("/blog/foo");

        store
            .store(&key, Bytes::from_static(b"first"), Duration::from_secs(60))
            .await
            .expect("first");
        store
            .store(&key, Bytes::from_static(b"second!"), Duration::from_secs(60))
            .await
            .expect("second");

        assert_eq!(
            store.lookup(&key).await.expect("lookup"),
            Some(Bytes::from_static(b"second!"))
        );
    }

    #[tokio::test]
    async fn foreign_sidecar_is_treated_as_absent() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemArtifactStore::new(dir.path().to_path_buf()).expect("store");
        let key = key("/blog/foo");
        let (data_path, sidecar_path) = store.paths(&key);

        std::fs::write(&data_path, b"png").expect("data");
        std::fs::write(
            &sidecar_path,
            r#"{"key":"/other:00000000","size":3,"expires_at":"2999-01-01T00:00:00Z"}"#,
        )
        .expect("sidecar");

        assert_eq!(store.lookup(&key).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn corrupt_sidecar_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemArtifactStore::new(dir.path().to_path_buf()).expect("store");
        let key = key("/blog/foo");
        let (_, sidecar_path) = store.paths(&key);

        std::fs::write(&sidecar_path, b"not json").expect("sidecar");

        let err = store.lookup(&key).await.expect_err("corrupt");
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn opens_backend_from_settings() {
        let dir = TempDir::new().expect("temp dir");
        let directory = dir.path().join("nested").join("og");
        let settings = StoreSettings {
            backend: StoreBackend::Filesystem,
            directory: directory.clone(),
            memory_limit: std::num::NonZeroUsize::MIN,
            ttl: Duration::from_secs(60),
        };

        let store = open_artifact_store(&settings).expect("store");
        store
            .store(&key("/a"), Bytes::from_static(b"png"), settings.ttl)
            .await
            .expect("stored");

        assert!(directory.is_dir());
        assert_eq!(
            std::fs::read_dir(&directory).expect("read dir").count(),
            2
        );
    }

    #[tokio::test]
    async fn truncated_data_is_an_error() {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemArtifactStore::new(dir.path().to_path_buf()).expect("store");
        let key = key("/blog/foo");

        store
            .store(&key, Bytes::from_static(b"complete"), Duration::from_secs(60))
            .await
            .expect("stored");
        let (data_path, _) = store.paths(&key);
        std::fs::write(&data_path, b"part").expect("truncate");

        let err = store.lookup(&key).await.expect_err("truncated");
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
