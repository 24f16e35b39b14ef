#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ogcache::application::metadata::MetadataTable;
use ogcache::application::og_image::{OgContext, OgImageService};
use ogcache::application::render::{RenderError, RenderRequest, Renderer};
use ogcache::cache::{ArtifactStore, CacheConfig, CacheKey, MemoryArtifactStore, StoreError};
use ogcache::domain::metadata::MetadataRecord;

pub const BRAND: &str = "Example | Notes";

/// Renderer that encodes its inputs into the returned bytes.
#[derive(Default)]
pub struct EchoRenderer {
    calls: AtomicUsize,
    fail: bool,
}

impl EchoRenderer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for EchoRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Bytes, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(RenderError::Failed {
                exit_code: Some(3),
                stderr: "font missing".to_string(),
            });
        }
        Ok(Bytes::from(format!(
            "{}|{}|{}",
            request.site_title, request.title, request.description
        )))
    }
}

/// Store whose every operation fails.
pub struct BrokenStore;

#[async_trait]
impl ArtifactStore for BrokenStore {
    async fn lookup(&self, _key: &CacheKey) -> Result<Option<Bytes>, StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }

    async fn store(&self, _key: &CacheKey, _bytes: Bytes, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::unavailable("connection refused"))
    }
}

pub fn table() -> MetadataTable {
    let entries: HashMap<String, MetadataRecord> = [
        ("/blog/foo", "Foo", "Bar   baz\n"),
        ("/about", "About", "Who writes here"),
        ("default", "Example", "Notes and essays"),
    ]
    .into_iter()
    .map(|(id, title, description)| (id.to_string(), MetadataRecord::new(title, description)))
    .collect();
    MetadataTable::from_entries(entries, "default").expect("valid table")
}

pub fn memory_store() -> Arc<MemoryArtifactStore> {
    Arc::new(MemoryArtifactStore::new(&CacheConfig::default()))
}

pub fn service(store: Arc<dyn ArtifactStore>, renderer: Arc<dyn Renderer>) -> Arc<OgImageService> {
    Arc::new(OgImageService::new(
        Arc::new(OgContext::new(table(), BRAND)),
        store,
        renderer,
    ))
}
