//! PostgreSQL connectivity for the event service.
//!
//! # Features
//!
//! - `postgres` (default) - SeaORM connection pool, connect-with-retry, health check
//! - `config` - `core_config::FromEnv` support for [`postgres::PostgresConfig`]
//!
//! # Example
//!
//! ```ignore
//! use core_config::FromEnv;
//! use database::postgres::{self, PostgresConfig};
//!
//! let config = PostgresConfig::from_env()?;
//! let db = postgres::connect_from_config_with_retry(config, None).await?;
//! postgres::check_health(&db).await?;
//! ```
//!
//! The [`common::retry`] helpers are backend-agnostic and are also used for
//! outbound HTTP calls such as notification publishing.

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};
