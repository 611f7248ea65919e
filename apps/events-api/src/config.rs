use core_config::{AppInfo, FromEnv, app_info, env_or_default, server::ServerConfig};

use database::postgres::PostgresConfig;
use domain_events::DaprConfig;

pub use core_config::Environment;

/// Application configuration, composed from the shared config components
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    pub dapr: DaprConfig,
    /// Prefix for `Location` headers and hypermedia links; empty means relative
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // Required: DATABASE_URL
        let server = ServerConfig::from_env()?;
        let dapr = DaprConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            database,
            server,
            environment,
            dapr,
            public_base_url: env_or_default("PUBLIC_BASE_URL", ""),
        })
    }
}
