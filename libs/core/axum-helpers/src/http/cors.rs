use axum::http::{HeaderName, HeaderValue, Method, header};
use std::io;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::extractors::TRUSTED_USER_HEADER;

/// Comma-separated allowed origins; `*` (the default) allows any origin.
pub const CORS_ALLOWED_ORIGIN: &str = "CORS_ALLOWED_ORIGIN";

/// CORS for an explicit origin list.
///
/// Allows the conditional-request and identity headers and exposes `ETag`
/// and `Location` so browser clients can drive optimistic concurrency.
pub fn create_cors_layer(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::IF_MATCH,
            HeaderName::from_static("prefer"),
            HeaderName::from_static(TRUSTED_USER_HEADER),
        ])
        .expose_headers([header::ETAG, header::LOCATION])
        .max_age(Duration::from_secs(3600))
}

/// Allows any origin, method and header.
pub fn create_permissive_cors_layer() -> CorsLayer {
    CorsLayer::permissive()
}

/// Read [`CORS_ALLOWED_ORIGIN`] and build the matching layer.
pub fn cors_layer_from_env() -> io::Result<CorsLayer> {
    let origins = std::env::var(CORS_ALLOWED_ORIGIN).unwrap_or_else(|_| "*".to_string());
    cors_layer_for(&origins)
}

fn cors_layer_for(origins: &str) -> io::Result<CorsLayer> {
    if origins.trim() == "*" {
        info!("CORS configured to allow any origin");
        return Ok(create_permissive_cors_layer());
    }

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<HeaderValue>())
        .collect::<Result<_, _>>()
        .map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid {} value: {}", CORS_ALLOWED_ORIGIN, e),
            )
        })?;

    if allowed.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} cannot be empty", CORS_ALLOWED_ORIGIN),
        ));
    }

    info!("CORS configured with allowed origins: {}", origins);
    Ok(create_cors_layer(allowed))
}
