use axum::Router;
use core_config::server::ServerConfig;
use database::common::{retry_fixed, RetryConfig, RetryExhausted, Sleeper};
use std::future::Future;
use std::io;
use tokio::net::TcpListener;
use tracing::info;

/// Bind the TCP listener for `server_config`, retrying per `retry`.
///
/// With retry disabled this is a single `bind`. The returned error keeps the
/// last `io::Error` so the caller can report the exact cause (address in use,
/// permission denied, unresolvable host).
pub async fn bind_listener<S>(
    server_config: &ServerConfig,
    retry: &RetryConfig,
    sleeper: &S,
) -> Result<TcpListener, RetryExhausted<io::Error>>
where
    S: Sleeper + ?Sized,
{
    let address = server_config.address();
    let listener = retry_fixed("Listener", retry, sleeper, || {
        TcpListener::bind(address.clone())
    })
    .await?;

    if let Ok(local) = listener.local_addr() {
        info!(%local, "Listener bound");
    }
    Ok(listener)
}

/// Serve `router` on an already bound listener until `shutdown` resolves.
///
/// In-flight requests are allowed to finish once shutdown starts.
///
/// # Example
/// ```ignore
/// use axum_helpers::server::{bind_listener, serve, shutdown_signal};
///
/// let listener = bind_listener(&config, &RetryConfig::disabled(), &TokioSleeper).await?;
/// serve(listener, router, shutdown_signal()).await?;
/// ```
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        })
}
