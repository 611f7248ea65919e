//! `If-Match` request header.

use crate::errors::AppError;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
    response::{IntoResponse, Response},
};

/// Strip an optional weak prefix and the surrounding quotes from an entity tag.
///
/// The `*` wildcard passes through unchanged; callers treat it as matching
/// any current representation.
///
/// ```rust
/// use axum_helpers::extractors::normalize_etag;
///
/// assert_eq!(normalize_etag("W/\"abc\""), "abc");
/// assert_eq!(normalize_etag("\"abc\""), "abc");
/// assert_eq!(normalize_etag("abc"), "abc");
/// assert_eq!(normalize_etag("*"), "*");
/// ```
pub fn normalize_etag(raw: &str) -> String {
    let tag = raw.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"').to_string()
}

/// Normalized `If-Match` value, `None` when the header is absent.
///
/// Whether a missing header is an error is up to the handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfMatch(pub Option<String>);

impl<S> FromRequestParts<S> for IfMatch
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(header::IF_MATCH) else {
            return Ok(IfMatch(None));
        };

        let raw = value.to_str().map_err(|_| {
            AppError::BadRequest("If-Match header is not valid ASCII".to_string()).into_response()
        })?;

        let tag = normalize_etag(raw);
        Ok(IfMatch((!tag.is_empty()).then_some(tag)))
    }
}
