//! Application services: metadata resolution, the renderer boundary and the generate pipeline.

pub mod error;
pub mod metadata;
pub mod og_image;
pub mod render;
