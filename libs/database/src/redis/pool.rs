use redis::Client;
use tracing::info;

use super::check_health;
use super::RedisConfig;
use crate::common::{retry_fixed, DatabaseError, DatabaseResult, RetryConfig, Sleeper};

/// Blocking Redis connection pool
pub type RedisPool = r2d2::Pool<Client>;

/// Build a lazy connection pool for the given dial target
///
/// No connection is opened here: `min_idle` is zero and the pool is built
/// unchecked, so an unreachable cache only surfaces when a connection is
/// first requested. Only a malformed address fails at this point.
///
/// # Example
/// ```ignore
/// use database::redis::{create_pool, RedisConfig};
///
/// let pool = create_pool(&RedisConfig::new("127.0.0.1:6379"))?;
/// ```
pub fn create_pool(config: &RedisConfig) -> DatabaseResult<RedisPool> {
    let client = Client::open(config.url())?;

    let pool = r2d2::Pool::builder()
        .max_size(config.pool_size())
        .min_idle(Some(0))
        .connection_timeout(config.connection_timeout)
        .build_unchecked(client);

    info!(
        address = %config.address,
        max_idle = config.max_idle,
        max_connections = config.pool_size(),
        "Redis pool configured"
    );
    Ok(pool)
}

/// PING the cache through the pool until it answers or the budget is spent
///
/// Used when eager verification of the session store is switched on.
pub async fn verify_with_retry<S>(
    pool: &RedisPool,
    retry: &RetryConfig,
    sleeper: &S,
) -> DatabaseResult<()>
where
    S: Sleeper + ?Sized,
{
    retry_fixed("Redis", retry, sleeper, || check_health(pool))
        .await
        .map_err(|exhausted| DatabaseError::RetriesExhausted {
            attempts: exhausted.attempts,
            last_error: exhausted.last_error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_create_pool_is_lazy() {
        // Nothing listens on port 1; building must still succeed.
        let config = RedisConfig::new("127.0.0.1:1");
        let pool = create_pool(&config).unwrap();

        assert_eq!(pool.max_size(), 64);
        assert_eq!(pool.state().connections, 0);
    }

    #[test]
    fn test_pool_size_follows_max_connections() {
        let config = RedisConfig::new("127.0.0.1:1").with_max_connections(32);
        assert_eq!(create_pool(&config).unwrap().max_size(), 32);
    }

    #[test]
    fn test_create_pool_rejects_malformed_address() {
        let config = RedisConfig::new("ftp://cache:6379");
        assert!(matches!(create_pool(&config), Err(DatabaseError::Redis(_))));
    }

    #[tokio::test]
    async fn test_verify_with_retry_reports_exhaustion() {
        let config = RedisConfig {
            connection_timeout: Duration::from_millis(200),
            ..RedisConfig::new("127.0.0.1:1")
        };
        let pool = create_pool(&config).unwrap();
        let retry = RetryConfig::new()
            .with_max_attempts(2)
            .with_interval(Duration::from_millis(10));

        let err = verify_with_retry(&pool, &retry, &crate::common::TokioSleeper)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DatabaseError::RetriesExhausted { attempts: 2, .. }
        ));
    }
}
