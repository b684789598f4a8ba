use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[cfg(feature = "config")]
use core_config::{env_parse, ConfigError};

/// Attempt ceiling used for startup connections (indices 0 through 10)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 11;

/// Fixed pause between two consecutive attempts
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-interval retry configuration
///
/// There is no exponential growth and no jitter: every pause between two
/// failed attempts has the same length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// When false, exactly one attempt is made
    pub enabled: bool,

    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Pause between consecutive attempts
    pub interval: Duration,
}

impl RetryConfig {
    /// Create a retry configuration with defaults
    ///
    /// Defaults:
    /// - enabled: true
    /// - max_attempts: 11
    /// - interval: 1s
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that makes a single attempt
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of attempts the loop will actually make (never zero)
    pub fn effective_attempts(&self) -> u32 {
        if self.enabled {
            self.max_attempts.max(1)
        } else {
            1
        }
    }

    /// Load a retry configuration from `{PREFIX}_RETRY_*` variables.
    ///
    /// Environment variables (each falls back to the matching field of `defaults`):
    /// - `{PREFIX}_RETRY_ENABLED`
    /// - `{PREFIX}_RETRY_MAX_ATTEMPTS`
    /// - `{PREFIX}_RETRY_INTERVAL_MS`
    ///
    /// # Example
    /// ```ignore
    /// let db_retry = RetryConfig::from_env_with_prefix("DB", RetryConfig::new())?;
    /// let bind_retry = RetryConfig::from_env_with_prefix("BIND", RetryConfig::disabled())?;
    /// ```
    #[cfg(feature = "config")]
    pub fn from_env_with_prefix(prefix: &str, defaults: RetryConfig) -> Result<Self, ConfigError> {
        let enabled = env_parse(&format!("{prefix}_RETRY_ENABLED"), defaults.enabled)?;
        let max_attempts =
            env_parse(&format!("{prefix}_RETRY_MAX_ATTEMPTS"), defaults.max_attempts)?;
        let interval_ms = env_parse(
            &format!("{prefix}_RETRY_INTERVAL_MS"),
            defaults.interval.as_millis() as u64,
        )?;

        Ok(Self {
            enabled,
            max_attempts,
            interval: Duration::from_millis(interval_ms),
        })
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// Waits between attempts. Injectable so tests never sleep for real.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Outcome of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    TransientFailure,
    Exhausted,
}

/// One iteration of the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionAttempt {
    /// Zero-based attempt index
    pub index: u32,
    pub outcome: AttemptOutcome,
}

impl ConnectionAttempt {
    fn log(&self, what: &str, config: &RetryConfig, error: Option<&dyn fmt::Display>) {
        let attempt = self.index + 1;
        let max = config.effective_attempts();
        match (self.outcome, error) {
            (AttemptOutcome::Success, _) => {
                info!(attempt, max, "{} ready", what);
            }
            (AttemptOutcome::TransientFailure, Some(e)) => {
                info!(
                    attempt,
                    max,
                    error = %e,
                    "{} not ready yet, retrying in {:?}",
                    what,
                    config.interval
                );
            }
            (AttemptOutcome::Exhausted, Some(e)) => {
                warn!(attempts = attempt, error = %e, "Giving up on {}", what);
            }
            (_, None) => {}
        }
    }
}

/// Returned when every attempt failed; carries the last error seen.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gave up after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

/// Retry an async operation at a fixed interval
///
/// The operation runs at most `config.effective_attempts()` times. The first
/// success is returned immediately. After a failure the loop sleeps for
/// `config.interval` unless that failure was the last permitted attempt.
///
/// # Example
/// ```ignore
/// use database::common::retry::{retry_fixed, RetryConfig, TokioSleeper};
///
/// let conn = retry_fixed("Postgres", &RetryConfig::new(), &TokioSleeper, || {
///     database::postgres::open_and_ping(&options)
/// })
/// .await?;
/// ```
pub async fn retry_fixed<F, Fut, T, E, S>(
    what: &str,
    config: &RetryConfig,
    sleeper: &S,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    S: Sleeper + ?Sized,
{
    let max_attempts = config.effective_attempts();
    let mut index = 0;

    loop {
        match operation().await {
            Ok(value) => {
                ConnectionAttempt {
                    index,
                    outcome: AttemptOutcome::Success,
                }
                .log(what, config, None);
                return Ok(value);
            }
            Err(e) if index + 1 >= max_attempts => {
                ConnectionAttempt {
                    index,
                    outcome: AttemptOutcome::Exhausted,
                }
                .log(what, config, Some(&e as &dyn fmt::Display));
                return Err(RetryExhausted {
                    attempts: index + 1,
                    last_error: e,
                });
            }
            Err(e) => {
                ConnectionAttempt {
                    index,
                    outcome: AttemptOutcome::TransientFailure,
                }
                .log(what, config, Some(&e as &dyn fmt::Display));
                sleeper.sleep(config.interval).await;
                index += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingSleeper(Arc<Mutex<Vec<Duration>>>);

    impl RecordingSleeper {
        fn pauses(&self) -> Vec<Duration> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    /// Fails until `succeed_on` calls have been made (1-based), then succeeds.
    fn flaky(counter: Arc<AtomicU32>, succeed_on: u32) -> impl FnMut() -> std::future::Ready<Result<u32, String>> {
        move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if call >= succeed_on {
                Ok(call)
            } else {
                Err(format!("attempt {call} refused"))
            })
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt_does_not_sleep() {
        let counter = Arc::new(AtomicU32::new(0));
        let sleeper = RecordingSleeper::default();

        let result = retry_fixed("test", &RetryConfig::new(), &sleeper, flaky(counter.clone(), 1)).await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(sleeper.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_success_on_kth_attempt_makes_exactly_k_attempts() {
        for k in 1..=11 {
            let counter = Arc::new(AtomicU32::new(0));
            let sleeper = RecordingSleeper::default();

            let result = retry_fixed("test", &RetryConfig::new(), &sleeper, flaky(counter.clone(), k)).await;

            assert_eq!(result.unwrap(), k);
            assert_eq!(counter.load(Ordering::SeqCst), k);
            assert_eq!(sleeper.pauses().len() as u32, k - 1);
        }
    }

    #[tokio::test]
    async fn test_never_succeeds_exhausts_after_max_attempts() {
        let counter = Arc::new(AtomicU32::new(0));
        let sleeper = RecordingSleeper::default();

        let result = retry_fixed("test", &RetryConfig::new(), &sleeper, flaky(counter.clone(), u32::MAX)).await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 11);
        assert_eq!(err.last_error, "attempt 11 refused");
        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert_eq!(sleeper.pauses().len(), 10);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_never_exceeded() {
        for budget in 1..=6 {
            let counter = Arc::new(AtomicU32::new(0));
            let sleeper = RecordingSleeper::default();
            let config = RetryConfig::new().with_max_attempts(budget);

            let err = retry_fixed("test", &config, &sleeper, flaky(counter.clone(), u32::MAX))
                .await
                .unwrap_err();

            assert_eq!(err.attempts, budget);
            assert_eq!(counter.load(Ordering::SeqCst), budget);
        }
    }

    #[tokio::test]
    async fn test_interval_is_constant() {
        let sleeper = RecordingSleeper::default();
        let config = RetryConfig::new().with_interval(Duration::from_millis(250));

        let _ = retry_fixed("test", &config, &sleeper, flaky(Arc::new(AtomicU32::new(0)), u32::MAX)).await;

        let pauses = sleeper.pauses();
        assert_eq!(pauses.len(), 10);
        assert!(pauses.iter().all(|p| *p == Duration::from_millis(250)));
    }

    #[tokio::test]
    async fn test_disabled_makes_single_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let sleeper = RecordingSleeper::default();

        let err = retry_fixed("test", &RetryConfig::disabled(), &sleeper, flaky(counter.clone(), 2))
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(sleeper.pauses().is_empty());
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(RetryConfig::new().with_max_attempts(0).effective_attempts(), 1);
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 11);
        assert_eq!(config.interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_tokio_sleeper_waits() {
        let start = std::time::Instant::now();
        TokioSleeper.sleep(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_env_with_prefix_defaults() {
        temp_env::with_vars(
            [
                ("DB_RETRY_ENABLED", None::<&str>),
                ("DB_RETRY_MAX_ATTEMPTS", None::<&str>),
                ("DB_RETRY_INTERVAL_MS", None::<&str>),
            ],
            || {
                let config = RetryConfig::from_env_with_prefix("DB", RetryConfig::new()).unwrap();
                assert_eq!(config, RetryConfig::new());
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_env_with_prefix_overrides() {
        temp_env::with_vars(
            [
                ("BIND_RETRY_ENABLED", Some("true")),
                ("BIND_RETRY_MAX_ATTEMPTS", Some("3")),
                ("BIND_RETRY_INTERVAL_MS", Some("50")),
            ],
            || {
                let config =
                    RetryConfig::from_env_with_prefix("BIND", RetryConfig::disabled()).unwrap();
                assert!(config.enabled);
                assert_eq!(config.max_attempts, 3);
                assert_eq!(config.interval, Duration::from_millis(50));
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_from_env_with_prefix_invalid_value() {
        temp_env::with_var("SESSION_RETRY_MAX_ATTEMPTS", Some("lots"), || {
            let err = RetryConfig::from_env_with_prefix("SESSION", RetryConfig::disabled())
                .unwrap_err();
            assert!(err.to_string().contains("SESSION_RETRY_MAX_ATTEMPTS"));
        });
    }
}
