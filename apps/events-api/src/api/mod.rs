use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

pub mod events;
pub mod health;

/// API routes, mounted at the root by `create_router`.
pub fn routes(state: &crate::state::AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .nest("/events", events::router(state))
}

/// Router with the `/ready` probe, checking PostgreSQL and the Dapr sidecar.
pub fn ready_router(state: crate::state::AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}

async fn banner() -> Json<Value> {
    Json(json!({ "status": "Event Service running" }))
}
