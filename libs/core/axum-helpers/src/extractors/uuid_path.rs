//! UUID path parameter extractors.

use crate::errors::AppError;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

/// Single UUID path parameter.
///
/// ```ignore
/// async fn get_event(UuidPath(id): UuidPath) -> String {
///     format!("Event ID: {}", id)
/// }
///
/// let app = Router::new().route("/events/{id}", get(get_event));
/// ```
pub struct UuidPath(pub Uuid);

/// Two UUID path parameters, in route order (e.g. `/events/{id}/interests/{interest_id}`).
pub struct UuidPathPair(pub Uuid, pub Uuid);

fn parse_uuid(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw).map_err(|e| AppError::UuidError(e).into_response())
}

impl<S> FromRequestParts<S> for UuidPath
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()).into_response())?;

        parse_uuid(&id).map(UuidPath)
    }
}

impl<S> FromRequestParts<S> for UuidPathPair
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((first, second)) = Path::<(String, String)>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()).into_response())?;

        Ok(UuidPathPair(parse_uuid(&first)?, parse_uuid(&second)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn one(UuidPath(id): UuidPath) -> String {
        id.to_string()
    }

    async fn two(UuidPathPair(a, b): UuidPathPair) -> String {
        format!("{a}/{b}")
    }

    fn app() -> Router {
        Router::new()
            .route("/items/{id}", get(one))
            .route("/items/{id}/tags/{tag}", get(two))
    }

    #[tokio::test]
    async fn test_valid_uuid() {
        let id = Uuid::now_v7();
        let response = app()
            .oneshot(Request::get(format!("/items/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_uuid_is_bad_request() {
        let response = app()
            .oneshot(Request::get("/items/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "INVALID_UUID");
    }

    #[tokio::test]
    async fn test_pair_rejects_second_segment() {
        let id = Uuid::now_v7();
        let response = app()
            .oneshot(
                Request::get(format!("/items/{id}/tags/nope"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
