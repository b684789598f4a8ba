//! Database library providing connectors and utilities for PostgreSQL and Redis
//!
//! The centrepiece is [`common::ConnectionEstablisher`]: it opens a connection
//! through a [`common::Connect`] implementation, verifies it, and retries at a
//! fixed interval when the dependency is not up yet (typical of containers
//! started in arbitrary order).
//!
//! # Features
//!
//! - `postgres` (default) - PostgreSQL support with SeaORM
//! - `redis` (default) - Redis connection pool (r2d2)
//! - `config` - Configuration support with `core_config::FromEnv`
//!
//! # Examples
//!
//! ## PostgreSQL
//!
//! ```ignore
//! use database::common::RetryConfig;
//! use database::postgres::{connect_with_retry, PostgresConfig};
//!
//! let db = connect_with_retry(&PostgresConfig::new(dsn), RetryConfig::new()).await?;
//! ```
//!
//! ## Redis
//!
//! ```ignore
//! use database::redis::{create_pool, RedisConfig};
//!
//! let pool = create_pool(&RedisConfig::new("127.0.0.1:6379"))?;
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

// Re-exports for convenience
pub use common::{DatabaseError, DatabaseResult};
