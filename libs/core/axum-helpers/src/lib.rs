//! # Axum Helpers
//!
//! Building blocks for an Axum service's startup and serving phase.
//!
//! ## Modules
//!
//! - **[`server`]**: Listener binding, serving with graceful shutdown, health checks
//! - **[`session`]**: Redis-backed cookie sessions with a fixed cookie policy
//! - **[`background`]**: Wait-group for background tasks drained at shutdown
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum::Router;
//! use axum_helpers::server::{bind_listener, health_router, serve, shutdown_signal};
//! use axum_helpers::session::{SessionManager, SessionPolicy};
//! use core_config::{app_info, server::ServerConfig};
//! use database::common::{RetryConfig, TokioSleeper};
//!
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     let sessions = SessionManager::new(SessionPolicy::new(redis_config))?;
//!     let app = Router::new()
//!         .merge(health_router(app_info!()))
//!         .layer(sessions.layer());
//!
//!     let listener =
//!         bind_listener(&ServerConfig::default(), &RetryConfig::disabled(), &TokioSleeper).await?;
//!     serve(listener, app, shutdown_signal()).await?;
//!     Ok(())
//! }
//! ```

pub mod background;
pub mod server;
pub mod session;

pub use background::BackgroundTasks;

pub use server::{
    HealthCheckFuture, HealthResponse, bind_listener, health_router, run_health_checks, serve,
    shutdown_signal,
};

pub use session::{
    RedisSessionStore, SESSION_COOKIE_NAME, SESSION_LIFETIME, SessionManager, SessionPolicy,
};
