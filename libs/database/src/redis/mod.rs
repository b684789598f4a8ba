//! Redis connection pool and utilities
//!
//! Provides a lazily dialled connection pool for the session store plus
//! health checks.

mod config;
mod health;
mod pool;

pub use config::{RedisConfig, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_IDLE};
pub use health::check_health;
pub use pool::{create_pool, verify_with_retry, RedisPool};

// Re-export redis types for convenience
pub use redis::{Client, Connection, RedisError, RedisResult};
