//! Generate-or-serve orchestration for Open Graph cards.

use std::{sync::Arc, time::Duration, time::Instant};

use bytes::Bytes;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::metadata::MetadataTable;
use crate::application::render::{RenderError, RenderRequest, Renderer};
use crate::cache::{ArtifactStore, CacheKey, DEFAULT_ARTIFACT_TTL_SECS};

const SOURCE: &str = "application::og_image";

pub(crate) const METRIC_CACHE_HIT: &str = "ogcache_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "ogcache_cache_miss_total";
pub(crate) const METRIC_STORE_ERROR: &str = "ogcache_store_error_total";
pub(crate) const METRIC_RENDER_ERROR: &str = "ogcache_render_error_total";
pub(crate) const METRIC_RENDER_MS: &str = "ogcache_render_ms";

/// Immutable per-process state shared by every request.
#[derive(Debug)]
pub struct OgContext {
    pub table: MetadataTable,
    /// Site title rendered on every card.
    pub brand: String,
}

impl OgContext {
    pub fn new(table: MetadataTable, brand: impl Into<String>) -> Self {
        Self {
            table,
            brand: brand.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("missing content identifier")]
    MissingIdentifier,
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Where the returned bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactSource {
    Cache,
    Rendered,
}

impl ArtifactSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactSource::Cache => "hit",
            ArtifactSource::Rendered => "miss",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OgImage {
    pub key: CacheKey,
    pub bytes: Bytes,
    pub source: ArtifactSource,
}

/// Resolves metadata, consults the artifact store and renders on a miss.
///
/// There is no request coalescing: concurrent misses on one key each render and write.
pub struct OgImageService {
    context: Arc<OgContext>,
    store: Arc<dyn ArtifactStore>,
    renderer: Arc<dyn Renderer>,
    ttl: Duration,
}

impl OgImageService {
    pub fn new(
        context: Arc<OgContext>,
        store: Arc<dyn ArtifactStore>,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self {
            context,
            store,
            renderer,
            ttl: Duration::from_secs(DEFAULT_ARTIFACT_TTL_SECS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn context(&self) -> &OgContext {
        &self.context
    }

    /// Cache key the given identifier maps to under the current table.
    pub fn cache_key(&self, identifier: &str) -> CacheKey {
        let resolved = self.context.table.resolve(identifier);
        CacheKey::for_record(resolved.identifier, resolved.record)
    }

    pub async fn generate(&self, identifier: &str) -> Result<OgImage, GenerateError> {
        if identifier.trim().is_empty() {
            return Err(GenerateError::MissingIdentifier);
        }

        let resolved = self.context.table.resolve(identifier);
        let key = CacheKey::for_record(resolved.identifier, resolved.record);

        match self.store.lookup(&key).await {
            Ok(Some(bytes)) => {
                counter!(METRIC_CACHE_HIT).increment(1);
                info!(
                    target = SOURCE,
                    op = "generate",
                    result = "cache_hit",
                    identifier,
                    cache_key = %key,
                    bytes = bytes.len(),
                    "Serving cached OG image"
                );
                return Ok(OgImage {
                    key,
                    bytes,
                    source: ArtifactSource::Cache,
                });
            }
            Ok(None) => {}
            Err(err) => {
                counter!(METRIC_STORE_ERROR, "op" => "lookup").increment(1);
                warn!(
                    target = SOURCE,
                    op = "generate",
                    result = "lookup_error",
                    cache_key = %key,
                    error = %err,
                    "Artifact lookup failed; rendering instead"
                );
            }
        }
        counter!(METRIC_CACHE_MISS).increment(1);

        let request = RenderRequest::new(
            self.context.brand.clone(),
            resolved.record.title.clone(),
            resolved.record.description.clone(),
        );

        let started_at = Instant::now();
        let bytes = match self.renderer.render(&request).await {
            Ok(bytes) => bytes,
            Err(err) => {
                counter!(METRIC_RENDER_ERROR).increment(1);
                warn!(
                    target = SOURCE,
                    op = "generate",
                    result = "render_error",
                    cache_key = %key,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "OG image render failed"
                );
                return Err(err.into());
            }
        };
        let elapsed = started_at.elapsed();
        histogram!(METRIC_RENDER_MS).record(elapsed.as_secs_f64() * 1000.0);

        info!(
            target = SOURCE,
            op = "generate",
            result = "rendered",
            identifier,
            fallback = resolved.is_fallback(&self.context.table),
            cache_key = %key,
            elapsed_ms = elapsed.as_millis() as u64,
            bytes = bytes.len(),
            "Rendered OG image"
        );

        if let Err(err) = self.store.store(&key, bytes.clone(), self.ttl).await {
            counter!(METRIC_STORE_ERROR, "op" => "store").increment(1);
            warn!(
                target = SOURCE,
                op = "generate",
                result = "store_error",
                cache_key = %key,
                error = %err,
                "Failed to cache rendered OG image"
            );
        }

        Ok(OgImage {
            key,
            bytes,
            source: ArtifactSource::Rendered,
        })
    }
}
