use crate::Environment;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::{debug, info, Dispatch};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Install color-eyre with a project-standard configuration.
///
/// Call this early in the main() before any fallible operations to ensure
/// colored error output. Safe to call multiple times.
///
/// Configuration:
/// - Shows file:line where errors occur
/// - Hides environment variables (less noise)
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Initialize the global tracing subscriber with environment-aware configuration.
///
/// - **Production** (`APP_ENV=production`): JSON lines, module targets hidden
/// - **Development** (default): pretty-printed, human-readable
///
/// Both include `tracing_error::ErrorLayer` so eyre reports carry span traces.
/// `RUST_LOG` overrides the default filter.
///
/// Safe to call more than once; later calls are ignored (common in tests).
pub fn init_tracing(environment: &Environment) {
    let is_production = environment.is_production();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production {
            EnvFilter::new("info,tower_http=info,sea_orm=warn,sqlx=warn")
        } else {
            EnvFilter::new("debug,sqlx=info")
        }
    });

    let result = if is_production {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .pretty(),
            )
            .with(tracing_error::ErrorLayer::default())
            .with(filter)
            .try_init()
    };

    match result {
        Ok(_) => {
            info!("Tracing initialized. Environment: {:?}", environment);
        }
        Err(_) => {
            debug!("Tracing already initialized, skipping re-initialization");
        }
    }
}

/// Which stream a [`LogSink`] represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    /// Informational lines: level tag and timestamp
    Info,
    /// Error lines: level tag, timestamp and source location
    Error,
}

impl SinkKind {
    fn max_level(self) -> LevelFilter {
        match self {
            SinkKind::Info => LevelFilter::INFO,
            SinkKind::Error => LevelFilter::ERROR,
        }
    }

    fn with_location(self) -> bool {
        matches!(self, SinkKind::Error)
    }
}

/// An independent, append-only log stream handed to request handlers.
///
/// Each sink owns its own `tracing` dispatcher, so events emitted inside
/// [`LogSink::in_scope`] are formatted by that sink alone and never reach the
/// global subscriber. Clones share the same dispatcher.
///
/// ```ignore
/// state.error_log().in_scope(|| tracing::error!(user = %id, "failed to load session"));
/// ```
#[derive(Clone)]
pub struct LogSink {
    kind: SinkKind,
    dispatch: Arc<Dispatch>,
}

impl LogSink {
    /// Info stream on stdout
    pub fn info() -> Self {
        Self::with_writer(SinkKind::Info, std::io::stdout, true)
    }

    /// Error stream on stdout, lines carry file and line number
    pub fn error() -> Self {
        Self::with_writer(SinkKind::Error, std::io::stdout, true)
    }

    /// Build a sink over any writer. Used by tests to capture output.
    pub fn with_writer<W>(kind: SinkKind, writer: W, ansi: bool) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .with_level(true)
            .with_file(kind.with_location())
            .with_line_number(kind.with_location())
            .with_max_level(kind.max_level())
            .finish();

        Self {
            kind,
            dispatch: Arc::new(Dispatch::new(subscriber)),
        }
    }

    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    /// Run `f` with this sink as the active dispatcher.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Attach this sink to a future, so events emitted while it is polled land here.
    pub fn scoped<F: Future>(&self, future: F) -> WithDispatch<F> {
        future.with_subscriber(Dispatch::clone(&self.dispatch))
    }

    /// True when both handles write to the same underlying stream.
    pub fn ptr_eq(&self, other: &LogSink) -> bool {
        Arc::ptr_eq(&self.dispatch, &other.dispatch)
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").field("kind", &self.kind).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(kind: SinkKind) -> (LogSink, SharedBuf) {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        (LogSink::with_writer(kind, move || writer.clone(), false), buf)
    }

    #[test]
    fn test_init_tracing_multiple_calls() {
        let env = Environment::Development;
        init_tracing(&env);
        init_tracing(&env);
    }

    #[test]
    fn test_info_sink_has_level_and_timestamp_without_location() {
        let (sink, buf) = capture(SinkKind::Info);
        sink.in_scope(|| tracing::info!("Starting server..."));

        let out = buf.contents();
        assert!(out.contains("INFO"));
        assert!(out.contains("Starting server..."));
        assert!(out.starts_with(|c: char| c.is_ascii_digit()), "timestamp first: {out}");
        assert!(!out.contains("tracing.rs"));
    }

    #[test]
    fn test_error_sink_includes_source_location() {
        let (sink, buf) = capture(SinkKind::Error);
        sink.in_scope(|| tracing::error!("Server not starting..."));

        let out = buf.contents();
        assert!(out.contains("ERROR"));
        assert!(out.contains("tracing.rs"));
        assert!(out.contains("Server not starting..."));
    }

    #[test]
    fn test_error_sink_drops_info_events() {
        let (sink, buf) = capture(SinkKind::Error);
        sink.in_scope(|| tracing::info!("not for the error stream"));
        assert!(buf.contents().is_empty());
    }

    #[test]
    fn test_sinks_are_independent() {
        let (info, info_buf) = capture(SinkKind::Info);
        let (error, error_buf) = capture(SinkKind::Error);

        info.in_scope(|| tracing::info!("only info"));
        error.in_scope(|| tracing::error!("only error"));

        assert!(info_buf.contents().contains("only info"));
        assert!(!info_buf.contents().contains("only error"));
        assert!(error_buf.contents().contains("only error"));
        assert!(!error_buf.contents().contains("only info"));
    }

    #[tokio::test]
    async fn test_scoped_future_logs_to_sink() {
        let (sink, buf) = capture(SinkKind::Info);

        sink.scoped(async {
            tokio::task::yield_now().await;
            tracing::warn!("after yield");
        })
        .await;
        tracing::info!("outside the sink");

        let out = buf.contents();
        assert!(out.contains("WARN"), "{out}");
        assert!(out.contains("after yield"), "{out}");
        assert!(!out.contains("outside the sink"), "{out}");
    }

    #[test]
    fn test_clones_share_dispatcher() {
        let sink = LogSink::info();
        let clone = sink.clone();
        assert!(sink.ptr_eq(&clone));
        assert!(!sink.ptr_eq(&LogSink::info()));
        assert_eq!(clone.kind(), SinkKind::Info);
    }
}
