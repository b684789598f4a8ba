use async_trait::async_trait;
use std::fmt;
use tracing::error;

use super::error::{DatabaseError, DatabaseResult};
use super::retry::{retry_fixed, RetryConfig, Sleeper, TokioSleeper};

/// Something that can open a verified connection in one attempt.
///
/// An implementation must both open the handle and run a liveness check, so a
/// successful return always means the connection is usable, not merely open.
#[async_trait]
pub trait Connect: Send + Sync {
    type Connection: Send;
    type Error: fmt::Display + Send;

    /// Human-readable name used in log lines ("Postgres", "Redis", ...)
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<Self::Connection, Self::Error>;
}

/// Opens a connection through a [`Connect`] implementation, retrying at a
/// fixed interval until it succeeds or the attempt budget is spent.
///
/// Exhaustion is reported as [`DatabaseError::RetriesExhausted`]; callers at
/// startup treat it as fatal.
///
/// # Example
/// ```ignore
/// use database::common::{ConnectionEstablisher, RetryConfig};
/// use database::postgres::{PostgresConfig, PostgresConnector};
///
/// let connector = PostgresConnector::new(PostgresConfig::from_env()?);
/// let db = ConnectionEstablisher::new(connector, RetryConfig::new())
///     .establish()
///     .await?;
/// ```
pub struct ConnectionEstablisher<C, S = TokioSleeper> {
    connector: C,
    retry: RetryConfig,
    sleeper: S,
}

impl<C: Connect> ConnectionEstablisher<C, TokioSleeper> {
    pub fn new(connector: C, retry: RetryConfig) -> Self {
        Self {
            connector,
            retry,
            sleeper: TokioSleeper,
        }
    }
}

impl<C: Connect, S: Sleeper> ConnectionEstablisher<C, S> {
    /// Swap the sleeper, e.g. for a recording one in tests
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> ConnectionEstablisher<C, S2> {
        ConnectionEstablisher {
            connector: self.connector,
            retry: self.retry,
            sleeper,
        }
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    pub async fn establish(&self) -> DatabaseResult<C::Connection> {
        let name = self.connector.name();

        retry_fixed(name, &self.retry, &self.sleeper, || self.connector.connect())
            .await
            .map_err(|exhausted| {
                error!(
                    attempts = exhausted.attempts,
                    "Can't connect to {}: {}", name, exhausted.last_error
                );
                DatabaseError::RetriesExhausted {
                    attempts: exhausted.attempts,
                    last_error: exhausted.last_error.to_string(),
                }
            })
    }
}
