//! Identity asserted by the upstream gateway.

use crate::errors::AppError;
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Response},
};

/// Header the gateway sets after authenticating the caller.
pub const TRUSTED_USER_HEADER: &str = "x-firebase-uid";

/// Caller id taken from [`TRUSTED_USER_HEADER`].
///
/// The value is trusted as-is. A missing, blank or non-UTF-8 header rejects
/// with 401. List it first in a handler's arguments so the 401 wins over any
/// other extractor rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedUser(pub String);

impl<S> FromRequestParts<S> for TrustedUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(TRUSTED_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| TrustedUser(v.to_string()))
            .ok_or_else(|| {
                AppError::Unauthorized(format!("Missing {} header", TRUSTED_USER_HEADER))
                    .into_response()
            })
    }
}
