//! Cache key derivation.
//!
//! A key binds a resolved identifier to a fingerprint of the metadata that produced the
//! artifact, so editing a page's metadata yields a fresh key without explicit invalidation.

use std::fmt;

use crate::domain::metadata::MetadataRecord;

const FINGERPRINT_SEED: u32 = 0x811c_9dc5;
const FINGERPRINT_PRIME: u32 = 0x0100_0193;

/// Opaque `{identifier}:{fingerprint}` key addressing an artifact in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Join a resolved identifier and a fingerprint. No escaping is applied.
    pub fn new(resolved_identifier: &str, fingerprint: &str) -> Self {
        Self(format!("{resolved_identifier}:{fingerprint}"))
    }

    /// Build the key for a resolved identifier and its record.
    pub fn for_record(resolved_identifier: &str, record: &MetadataRecord) -> Self {
        Self::new(resolved_identifier, &fingerprint(record))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 32-bit FNV-1a over raw bytes.
///
/// The multiply is the same as `h + (h<<1) + (h<<4) + (h<<7) + (h<<8) + (h<<24)`.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FINGERPRINT_SEED, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FINGERPRINT_PRIME)
    })
}

/// Eight lowercase hex digits identifying the record's canonical content.
pub fn fingerprint(record: &MetadataRecord) -> String {
    format!("{:08x}", hash_bytes(record.canonical_json().as_bytes()))
}
