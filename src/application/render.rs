//! Renderer boundary.
//!
//! Rendering is opaque to this crate: a renderer receives the brand line, the page title
//! and the normalized description and returns encoded image bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Inputs handed to the renderer for one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub site_title: String,
    pub title: String,
    pub description: String,
}

impl RenderRequest {
    pub fn new(
        site_title: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            site_title: site_title.into(),
            title: title.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer unavailable: {0}")]
    Unavailable(String),
    #[error("renderer failed (exit {exit_code:?}): {stderr}")]
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("renderer timed out after {0:?}")]
    TimedOut(Duration),
    #[error("renderer produced no output")]
    EmptyOutput,
}

/// Produces image bytes for a card. Assumed deterministic for identical inputs.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<Bytes, RenderError>;
}
