use tracing::debug;

use super::RedisPool;
use crate::common::DatabaseError;

/// Check Redis health
///
/// Borrows a pooled connection and sends `PING`. The pool is blocking, so the
/// round-trip runs on the blocking thread pool.
pub async fn check_health(pool: &RedisPool) -> Result<(), DatabaseError> {
    debug!("Running Redis health check");

    let pool = pool.clone();
    let response = tokio::task::spawn_blocking(move || -> Result<String, DatabaseError> {
        let mut conn = pool
            .get()
            .map_err(|e| DatabaseError::HealthCheckFailed(format!("Redis unavailable: {}", e)))?;
        redis::cmd("PING").query::<String>(&mut *conn).map_err(|e| {
            DatabaseError::HealthCheckFailed(format!("Redis health check failed: {}", e))
        })
    })
    .await
    .map_err(|e| DatabaseError::HealthCheckFailed(format!("Redis health check aborted: {}", e)))??;

    if response != "PONG" {
        return Err(DatabaseError::HealthCheckFailed(format!(
            "Redis PING returned unexpected response: {}",
            response
        )));
    }

    debug!("Redis health check passed");
    Ok(())
}
