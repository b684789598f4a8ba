//! Application state management.
//!
//! [`AppState`] is assembled once at startup and handed to every request
//! handler through axum's `State`. It is read-only: there are no setters, and
//! every clone points at the same database pool, session manager, log sinks
//! and background-task tracker.

use axum_helpers::{BackgroundTasks, SessionManager};
use core_config::tracing::LogSink;
use database::postgres::DatabaseConnection;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    db: DatabaseConnection,
    session: SessionManager,
    tasks: BackgroundTasks,
    info_log: LogSink,
    error_log: LogSink,
}

impl AppState {
    /// Aggregate the startup products. Cannot fail.
    pub fn assemble(
        db: DatabaseConnection,
        session: SessionManager,
        tasks: BackgroundTasks,
        info_log: LogSink,
        error_log: LogSink,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                session,
                tasks,
                info_log,
                error_log,
            }),
        }
    }

    /// PostgreSQL connection pool
    pub fn db(&self) -> &DatabaseConnection {
        &self.inner.db
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Wait-group for work that must finish before the process exits
    pub fn tasks(&self) -> &BackgroundTasks {
        &self.inner.tasks
    }

    pub fn info_log(&self) -> &LogSink {
        &self.inner.info_log
    }

    pub fn error_log(&self) -> &LogSink {
        &self.inner.error_log
    }
}
