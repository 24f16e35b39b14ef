//! Static metadata table resolved once at startup.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::domain::metadata::MetadataRecord;

/// Identifier whose record stands in for every unknown page.
pub const DEFAULT_FALLBACK_MARKER: &str = "default";

/// Errors raised while building the metadata table. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("metadata file `{path}` is not a valid identifier map: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("metadata table has no fallback record under `{marker}`")]
    MissingFallback { marker: String },
}

/// Result of resolving a requested identifier against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMetadata<'a> {
    /// The requested identifier when known, otherwise the fallback marker.
    pub identifier: &'a str,
    pub record: &'a MetadataRecord,
}

impl ResolvedMetadata<'_> {
    pub fn is_fallback(&self, table: &MetadataTable) -> bool {
        self.identifier == table.fallback_marker
    }
}

/// Read-only mapping from content identifier to card metadata.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    entries: HashMap<String, MetadataRecord>,
    fallback_marker: String,
}

impl MetadataTable {
    /// Build a table, normalizing every record and checking the fallback exists.
    pub fn from_entries(
        entries: HashMap<String, MetadataRecord>,
        fallback_marker: impl Into<String>,
    ) -> Result<Self, MetadataError> {
        let fallback_marker = fallback_marker.into();
        let entries: HashMap<String, MetadataRecord> = entries
            .into_iter()
            .map(|(identifier, record)| (identifier, record.normalized()))
            .collect();

        if !entries.contains_key(&fallback_marker) {
            return Err(MetadataError::MissingFallback {
                marker: fallback_marker,
            });
        }

        Ok(Self {
            entries,
            fallback_marker,
        })
    }

    /// Parse a JSON object of `identifier -> {title, description}`.
    pub fn from_json(
        source: &str,
        origin: &Path,
        fallback_marker: impl Into<String>,
    ) -> Result<Self, MetadataError> {
        let entries: HashMap<String, MetadataRecord> =
            serde_json::from_str(source).map_err(|source| MetadataError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        Self::from_entries(entries, fallback_marker)
    }

    /// Load the build-time metadata artifact from disk.
    pub fn load(path: &Path, fallback_marker: impl Into<String>) -> Result<Self, MetadataError> {
        let source = std::fs::read_to_string(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&source, path, fallback_marker)
    }

    /// Resolve `identifier`, falling back to the designated default record.
    pub fn resolve<'a>(&'a self, identifier: &'a str) -> ResolvedMetadata<'a> {
        match self.entries.get(identifier) {
            Some(record) => ResolvedMetadata { identifier, record },
            None => ResolvedMetadata {
                identifier: self.fallback_marker.as_str(),
                record: &self.entries[&self.fallback_marker],
            },
        }
    }

    pub fn fallback_marker(&self) -> &str {
        &self.fallback_marker
    }

    /// All identifiers in the table, fallback included, in sorted order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }
}
