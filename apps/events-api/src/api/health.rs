//! Readiness probe with real dependency checks.

use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use axum_helpers::server::{HealthCheckFuture, run_health_checks};

pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let mut checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![(
        "database",
        Box::pin(async {
            database::postgres::check_health(&state.db)
                .await
                .map_err(|e| format!("Database ping failed: {}", e))
        }),
    )];

    if let Some(dapr) = &state.dapr {
        checks.push((
            "dapr",
            Box::pin(async move {
                match dapr.health().await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err("Dapr sidecar reported unhealthy".to_string()),
                    Err(e) => Err(format!("Dapr health check failed: {}", e)),
                }
            }),
        ));
    }

    match run_health_checks(checks).await {
        Ok((status, json)) => (status, json).into_response(),
        Err((status, json)) => (status, json).into_response(),
    }
}
