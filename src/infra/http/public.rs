use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{Query, State},
    http::{
        HeaderName, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use crate::application::{
    error::HttpError,
    og_image::{OgImage, OgImageService},
};

use super::{
    OG_CACHE_HEADER,
    middleware::{log_responses, set_request_context},
};

const IMAGE_CONTENT_TYPE: &str = "image/png";

#[derive(Clone)]
pub struct HttpState {
    pub og_images: Arc<OgImageService>,
    /// Client cache lifetime advertised through `Cache-Control`.
    pub max_age_seconds: u64,
}

pub fn build_router(state: HttpState, route: &str) -> Router {
    Router::new()
        .route(route, get(og_image))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OgImageQuery {
    p: Option<String>,
}

async fn og_image(
    State(state): State<HttpState>,
    Query(query): Query<OgImageQuery>,
) -> Result<Response, HttpError> {
    let identifier = query.p.unwrap_or_default();
    let image = state.og_images.generate(&identifier).await?;
    Ok(build_image_response(image, state.max_age_seconds))
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn build_image_response(image: OgImage, max_age_seconds: u64) -> Response {
    let length = image.bytes.len();
    let mut response = Response::new(Body::from(image.bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(IMAGE_CONTENT_TYPE));
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    if let Ok(value) =
        HeaderValue::from_str(&format!("public, max-age={max_age_seconds}, immutable"))
    {
        headers.insert(CACHE_CONTROL, value);
    }
    headers.insert(
        HeaderName::from_static(OG_CACHE_HEADER),
        HeaderValue::from_static(image.source.as_str()),
    );

    response
}
