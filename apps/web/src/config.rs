use core_config::{app_info, server::ServerConfig, AppInfo, ConfigError, FromEnv};
use database::common::RetryConfig;
use database::postgres::PostgresConfig;
use database::redis::RedisConfig;

pub use core_config::Environment;

/// Everything the startup sequence reads from the environment
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub environment: Environment,
    pub database: PostgresConfig,
    /// Retry for the initial database connection. On by default.
    pub db_retry: RetryConfig,
    pub redis: RedisConfig,
    /// Eager PING of the session store. Off by default.
    pub session_retry: RetryConfig,
    pub server: ServerConfig,
    /// Retry for the listener bind. Off by default.
    pub bind_retry: RetryConfig,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> eyre::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::load()?)
    }

    fn load() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // Required - DSN
        let redis = RedisConfig::from_env()?; // Required - REDIS
        let server = ServerConfig::from_env()?; // Defaults: HOST=0.0.0.0, PORT=8000

        Ok(Self {
            app: app_info!(),
            environment,
            database,
            db_retry: RetryConfig::from_env_with_prefix("DB", RetryConfig::new())?,
            redis,
            session_retry: RetryConfig::from_env_with_prefix("SESSION", RetryConfig::disabled())?,
            server,
            bind_retry: RetryConfig::from_env_with_prefix("BIND", RetryConfig::disabled())?,
        })
    }
}
