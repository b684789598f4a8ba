//! Common utilities shared across all database implementations

pub mod error;
pub mod establish;
pub mod retry;

pub use error::{DatabaseError, DatabaseResult};
pub use establish::{Connect, ConnectionEstablisher};
pub use retry::{
    retry_fixed, AttemptOutcome, ConnectionAttempt, RetryConfig, RetryExhausted, Sleeper,
    TokioSleeper,
};
