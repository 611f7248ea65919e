//! Shared application state.

use database::postgres::DatabaseConnection;
use domain_events::DaprClient;

/// Cloned per handler; the connection pool and HTTP client are Arc-backed.
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    /// PostgreSQL connection pool
    pub db: DatabaseConnection,
    /// Sidecar client, `None` when publishing is disabled
    pub dapr: Option<DaprClient>,
}
