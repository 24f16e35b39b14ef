//! Page metadata shown on Open Graph cards.

use serde::{Deserialize, Serialize};

/// Title and description for a single page.
///
/// Descriptions are stored whitespace-normalized so that incidental formatting in the
/// source metadata never leaks into cache keys or rendered cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub title: String,
    pub description: String,
}

impl MetadataRecord {
    pub fn new(title: impl Into<String>, description: impl AsRef<str>) -> Self {
        Self {
            title: title.into(),
            description: normalize_whitespace(description.as_ref()),
        }
    }

    /// Re-apply description normalization, e.g. after deserializing raw input.
    pub fn normalized(self) -> Self {
        Self::new(self.title, self.description)
    }

    /// Canonical serialization used for fingerprinting.
    ///
    /// Compact JSON with `title` first and `description` second. The field order is part
    /// of the cache key contract and must not change.
    pub fn canonical_json(&self) -> String {
        let title = serde_json::Value::String(self.title.clone());
        let description = serde_json::Value::String(normalize_whitespace(&self.description));
        format!("{{\"title\":{title},\"description\":{description}}}")
    }
}

/// Collapse every run of whitespace into a single space and trim both ends.
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
