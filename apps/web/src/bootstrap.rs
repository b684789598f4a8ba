//! Startup sequence: database, session store, assembly, listener.
//!
//! Each stage completes before the next begins. A failing stage moves the
//! sequence to [`StartupPhase::Failed`] and returns a [`StartupError`];
//! deciding the exit code is left to `main`.

use crate::config::Config;
use crate::routes;
use crate::state::AppState;
use axum::Router;
use axum_helpers::server::{bind_listener, serve, shutdown_signal};
use axum_helpers::{BackgroundTasks, SessionManager, SessionPolicy};
use core_config::tracing::LogSink;
use database::common::{Connect, ConnectionEstablisher, Sleeper, TokioSleeper};
use database::postgres::{DatabaseConnection, PostgresConnector};
use database::DatabaseError;
use std::fmt;
use std::future::Future;
use std::io;
use thiserror::Error;
use tracing::{error, info, warn};

/// Where the startup sequence currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    Init,
    DbAcquired,
    SessionReady,
    ConfigAssembled,
    Serving,
    Failed,
}

impl StartupPhase {
    /// Whether `next` directly follows `self`.
    pub fn can_advance_to(self, next: StartupPhase) -> bool {
        use StartupPhase::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Init, DbAcquired)
                | (DbAcquired, SessionReady)
                | (SessionReady, ConfigAssembled)
                | (ConfigAssembled, Serving)
                | (Init, Failed)
                | (DbAcquired, Failed)
                | (ConfigAssembled, Failed)
        )
    }

    /// No transition leaves a terminal phase
    pub fn is_terminal(self) -> bool {
        matches!(self, StartupPhase::Serving | StartupPhase::Failed)
    }
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StartupPhase::Init => "INIT",
            StartupPhase::DbAcquired => "DB_ACQUIRED",
            StartupPhase::SessionReady => "SESSION_READY",
            StartupPhase::ConfigAssembled => "CONFIG_ASSEMBLED",
            StartupPhase::Serving => "SERVING",
            StartupPhase::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Fatal startup failures
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("database unavailable: {0}")]
    Database(#[source] DatabaseError),

    #[error("session store unavailable: {0}")]
    SessionStore(#[source] DatabaseError),

    #[error("failed to bind {addr} after {attempts} attempt(s): {source}")]
    Bind {
        addr: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    #[error("invalid startup transition from {from} to {to}")]
    InvalidTransition {
        from: StartupPhase,
        to: StartupPhase,
    },
}

/// Drives the startup state machine for one process.
///
/// The connector and sleeper are injectable so the sequence can run against
/// a mock database without real pauses.
pub struct Startup<'a, C, S = TokioSleeper> {
    config: &'a Config,
    establisher: ConnectionEstablisher<C, S>,
    info_log: LogSink,
    error_log: LogSink,
    phase: StartupPhase,
}

impl<'a, C> Startup<'a, C>
where
    C: Connect<Connection = DatabaseConnection>,
{
    pub fn new(config: &'a Config, connector: C, info_log: LogSink, error_log: LogSink) -> Self {
        Self {
            config,
            establisher: ConnectionEstablisher::new(connector, config.db_retry.clone()),
            info_log,
            error_log,
            phase: StartupPhase::Init,
        }
    }
}

impl<'a, C, S> Startup<'a, C, S>
where
    C: Connect<Connection = DatabaseConnection>,
    S: Sleeper,
{
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> Startup<'a, C, S2> {
        Startup {
            config: self.config,
            establisher: self.establisher.with_sleeper(sleeper),
            info_log: self.info_log,
            error_log: self.error_log,
            phase: self.phase,
        }
    }

    pub fn phase(&self) -> StartupPhase {
        self.phase
    }

    fn advance(&mut self, next: StartupPhase) -> Result<(), StartupError> {
        if !self.phase.can_advance_to(next) {
            return Err(StartupError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        info!(from = %self.phase, to = %next, "Startup phase changed");
        self.phase = next;
        Ok(())
    }

    fn require(&self, expected: StartupPhase, next: StartupPhase) -> Result<(), StartupError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(StartupError::InvalidTransition {
                from: self.phase,
                to: next,
            })
        }
    }

    /// Record a fatal error on the error sink and enter `Failed`.
    fn fail(&mut self, err: StartupError) -> StartupError {
        self.error_log
            .in_scope(|| error!(phase = %self.phase, "Startup failed: {}", err));
        if let Err(invalid) = self.advance(StartupPhase::Failed) {
            warn!("{}", invalid);
        }
        err
    }

    /// Run `INIT → DB_ACQUIRED → SESSION_READY → CONFIG_ASSEMBLED`.
    pub async fn acquire(&mut self) -> Result<AppState, StartupError> {
        self.require(StartupPhase::Init, StartupPhase::DbAcquired)?;

        let db = match self.establisher.establish().await {
            Ok(db) => db,
            Err(e) => return Err(self.fail(StartupError::Database(e))),
        };
        self.advance(StartupPhase::DbAcquired)?;

        let session = match self.session_manager().await {
            Ok(session) => session,
            Err(e) => return Err(self.fail(StartupError::SessionStore(e))),
        };
        self.advance(StartupPhase::SessionReady)?;

        let state = AppState::assemble(
            db,
            session,
            BackgroundTasks::new(),
            self.info_log.clone(),
            self.error_log.clone(),
        );
        self.advance(StartupPhase::ConfigAssembled)?;

        Ok(state)
    }

    async fn session_manager(&self) -> Result<SessionManager, DatabaseError> {
        let session = SessionManager::new(SessionPolicy::new(self.config.redis.clone()))?;

        let retry = &self.config.session_retry;
        if retry.enabled {
            session.verify(retry, self.establisher.sleeper()).await?;
        }
        Ok(session)
    }

    /// Bind, log "starting" on the info sink, then serve until `shutdown`.
    pub async fn serve<F>(
        &mut self,
        state: &AppState,
        router: Router,
        shutdown: F,
    ) -> Result<(), StartupError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.require(StartupPhase::ConfigAssembled, StartupPhase::Serving)?;

        let config = self.config;
        let server = &config.server;
        let listener =
            match bind_listener(server, &config.bind_retry, self.establisher.sleeper()).await {
                Ok(listener) => listener,
                Err(exhausted) => {
                    return Err(self.fail(StartupError::Bind {
                        addr: server.address(),
                        attempts: exhausted.attempts,
                        source: exhausted.last_error,
                    }));
                }
            };
        self.advance(StartupPhase::Serving)?;

        let addr = listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| server.address());
        state.info_log().in_scope(|| info!(%addr, "starting"));

        serve(listener, router, shutdown).await.map_err(|e| {
            state
                .error_log()
                .in_scope(|| error!("Server stopped with an error: {}", e));
            StartupError::Serve(e)
        })
    }
}

/// Full production sequence against PostgreSQL, stopped by SIGINT/SIGTERM.
pub async fn run(config: Config) -> Result<(), StartupError> {
    let connector = PostgresConnector::new(&config.database);
    let startup = Startup::new(&config, connector, LogSink::info(), LogSink::error());
    run_with(startup, shutdown_signal()).await
}

/// Acquire, serve until `shutdown`, then drain background tasks and close the database.
///
/// Cleanup runs whenever the state was assembled, including after a bind or
/// serve failure; that failure is still what gets returned.
pub async fn run_with<C, S, F>(
    mut startup: Startup<'_, C, S>,
    shutdown: F,
) -> Result<(), StartupError>
where
    C: Connect<Connection = DatabaseConnection>,
    S: Sleeper,
    F: Future<Output = ()> + Send + 'static,
{
    let config = startup.config;
    let state = startup.acquire().await?;
    let router = routes::router(&state, config.app);
    let result = startup.serve(&state, router, shutdown).await;

    let info_log = state.info_log();
    info!(phase = %startup.phase(), "Shutting down: draining background tasks");
    if state.tasks().drain(config.server.shutdown_timeout).await {
        info_log.in_scope(|| info!("Background tasks finished"));
    }

    match state.db().clone().close().await {
        Ok(()) => info_log.in_scope(|| info!("PostgreSQL connection closed successfully")),
        Err(e) => state
            .error_log()
            .in_scope(|| error!("Error closing PostgreSQL: {}", e)),
    }

    result
}
