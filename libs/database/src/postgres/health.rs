use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::common::DatabaseError;

/// Check PostgreSQL database health
///
/// Pings the pool to verify the database is still accepting queries.
/// Used by the readiness endpoint.
pub async fn check_health(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    debug!("Running PostgreSQL health check");

    db.ping().await.map_err(|e| {
        DatabaseError::HealthCheckFailed(format!("PostgreSQL health check failed: {}", e))
    })?;

    debug!("PostgreSQL health check passed");
    Ok(())
}
