//! Server infrastructure module.
//!
//! This module provides:
//! - Listener binding with optional fixed-interval retry
//! - Serving with graceful shutdown
//! - Health and readiness endpoints
//!
//! # Example
//!
//! ```ignore
//! use axum_helpers::server::{bind_listener, health_router, serve, shutdown_signal};
//! use core_config::{app_info, server::ServerConfig};
//!
//! let app = Router::new().merge(health_router(app_info!()));
//! let listener = bind_listener(&ServerConfig::default(), &retry, &TokioSleeper).await?;
//! serve(listener, app, shutdown_signal()).await?;
//! ```

pub mod app;
pub mod health;
pub mod shutdown;

pub use app::{bind_listener, serve};
pub use health::{HealthCheckFuture, HealthResponse, health_handler, health_router, run_health_checks};
pub use shutdown::shutdown_signal;
