//! Events API routes
//!
//! Wires the events domain to PostgreSQL and, when enabled, Dapr pub/sub.

use crate::state::AppState;
use axum::Router;
use domain_events::{
    DaprEventPublisher, EventService, LinkBuilder, PgEventRepository, PgTaskRepository,
};
use std::sync::Arc;
use tracing::info;

pub fn router(state: &AppState) -> Router {
    let mut service = EventService::new(
        PgEventRepository::new(state.db.clone()),
        PgTaskRepository::new(state.db.clone()),
    );

    if let Some(dapr) = &state.dapr {
        info!(
            sidecar = %dapr.base_url(),
            pubsub = %state.config.dapr.pubsub_name,
            topic = %state.config.dapr.topic,
            "Dapr pub/sub enabled for events"
        );
        let publisher = DaprEventPublisher::from_config(&state.config.dapr);
        service = service.with_publisher(Arc::new(publisher));
    } else {
        info!("Dapr pub/sub disabled; event-created notifications are skipped");
    }

    domain_events::handlers::router(service, LinkBuilder::new(&state.config.public_base_url))
}
