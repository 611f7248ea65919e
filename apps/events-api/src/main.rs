use axum_helpers::server::{
    CleanupCoordinator, close_postgres, create_production_app, health_router,
};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_events::DaprClient;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Before any fallible operation, so startup errors are colored
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    info!("Connecting to PostgreSQL");

    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    let dapr = config
        .dapr
        .enabled
        .then(|| DaprClient::from_config(&config.dapr));

    let state = AppState { config, db, dapr };

    let api_routes = api::routes(&state);

    // create_router adds docs and middleware to the composed routes
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    // - /health: liveness with app name/version
    // - /ready: PostgreSQL and Dapr checks
    let app = router
        .merge(health_router(state.config.app.clone()))
        .merge(api::ready_router(state.clone()));

    info!("Starting Event Service with production-ready shutdown (30s timeout)");

    create_production_app(
        app,
        &state.config.server,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: closing database connections");
            let mut cleanup = CleanupCoordinator::new();
            cleanup.add_task("postgres", async move {
                close_postgres(state.db, "events").await;
            });
            cleanup.run().await;
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Event Service shutdown complete");
    Ok(())
}
