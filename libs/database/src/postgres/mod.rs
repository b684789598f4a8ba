//! PostgreSQL connector and utilities
//!
//! Provides verified connection establishment (open + ping under a retry
//! policy) and health checks.

mod config;
mod connector;
mod health;

pub use config::PostgresConfig;
pub use connector::{connect_with_retry, open_and_ping, PostgresConnector};
pub use health::check_health;

// Re-export SeaORM types for convenience
pub use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
