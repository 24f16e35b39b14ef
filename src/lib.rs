//! Request-time Open Graph image cache.
//!
//! Metadata for a page path is resolved from a static table, fingerprinted into a cache key
//! and looked up in an artifact store; misses are rendered by an external program and stored.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
