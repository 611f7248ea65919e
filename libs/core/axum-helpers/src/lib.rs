//! # Axum Helpers
//!
//! Shared building blocks for the HTTP services in this workspace.
//!
//! - **[`server`]**: router assembly with OpenAPI UIs, health, graceful shutdown
//! - **[`http`]**: CORS and security-header middleware
//! - **[`errors`]**: [`AppError`] and the [`ErrorResponse`] body with [`ErrorCode`]s
//! - **[`extractors`]**: identity header, `If-Match`, UUID path, validated JSON and query
//! - **[`audit`]**: structured audit records
//!
//! ```ignore
//! use axum_helpers::server::{create_production_app, create_router, health_router};
//!
//! let router = create_router::<ApiDoc>(api_routes).await?;
//! let app = router.merge(health_router(core_config::app_info!()));
//! create_production_app(app, &config.server, Duration::from_secs(30), async {}).await?;
//! ```

pub mod audit;
pub mod errors;
pub mod extractors;
pub mod http;
pub mod server;

pub use server::{
    CleanupCoordinator, HealthCheckFuture, HealthResponse, ShutdownCoordinator, close_postgres,
    create_production_app, create_router, health_router, run_health_checks,
    shutdown_signal,
};

pub use http::{
    cors_layer_from_env, create_cors_layer, create_permissive_cors_layer, security_headers,
};

pub use errors::{AppError, ErrorCode, ErrorResponse};

pub use extractors::{
    IfMatch, TRUSTED_USER_HEADER, TrustedUser, UuidPath, UuidPathPair, ValidatedJson,
    ValidatedQuery, normalize_etag,
};

pub use audit::{AuditEvent, AuditOutcome, extract_ip_from_headers, extract_user_agent};
