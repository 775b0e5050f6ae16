//! Axum middleware layers applied to the router.
//!
//! Includes request tracing, timeout enforcement, response compression,
//! single-origin CORS, and the shared rate limit on the login endpoints.

use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    BoxError,
};
use common::ServiceError;
use tower::load_shed::error::Overloaded;
use tower_http::cors::CorsLayer;
use tracing::warn;

use super::error::ApiError;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests allowed to wait for the next rate-limit window before further
/// ones are shed with 429.
pub const AUTH_QUEUE_DEPTH: usize = 8;

/// Rate limit shared by every `/api/auth/*` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthThrottle {
    pub requests: u64,
    pub per: Duration,
    pub queue: usize,
}

impl AuthThrottle {
    pub fn per_minute(requests: u64) -> Self {
        Self {
            requests,
            per: Duration::from_secs(60),
            queue: AUTH_QUEUE_DEPTH,
        }
    }
}

/// Map errors from the throttled auth stack onto responses.
///
/// A shed request becomes 429; anything else from the buffer is a 500.
pub async fn handle_overload(err: BoxError) -> ApiError {
    if err.is::<Overloaded>() {
        warn!("auth rate limit reached; shedding request");
        ApiError(ServiceError::TooManyRequests(
            "too many requests; try again later".into(),
        ))
    } else {
        warn!(error = %err, "auth middleware failed");
        ApiError(ServiceError::Internal("request failed".into()))
    }
}

/// CORS layer admitting only `origin`, with credentials.
///
/// An origin that is not a valid header value admits nothing. `Config`
/// validation rejects such origins before this point.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value).allow_credentials(true),
        Err(_) => {
            warn!("frontend origin is not a valid header value; CORS admits no origin");
            layer
        }
    }
}
