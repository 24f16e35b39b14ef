mod middleware;
mod public;

pub use public::{HttpState, build_router};

/// Response header carrying the artifact outcome (`hit` or `miss`).
pub(crate) const OG_CACHE_HEADER: &str = "x-og-cache";
