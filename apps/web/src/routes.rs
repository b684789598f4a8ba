//! Request-dispatch surface attached by the bootstrap.
//!
//! Only liveness and readiness live here; feature routes are merged by
//! their own modules.

use crate::state::AppState;
use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_helpers::server::{HealthCheckFuture, health_router, run_health_checks};
use core_config::AppInfo;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Readiness: database ping and session-store `PING`.
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    let checks: Vec<(&str, HealthCheckFuture<'_>)> = vec![
        (
            "database",
            Box::pin(async {
                database::postgres::check_health(state.db())
                    .await
                    .map_err(|e| e.to_string())
            }),
        ),
        (
            "sessions",
            Box::pin(async {
                database::redis::check_health(state.session().store().pool())
                    .await
                    .map_err(|e| e.to_string())
            }),
        ),
    ];

    match run_health_checks(checks).await {
        Ok((status, json)) => (status, json).into_response(),
        Err((status, json)) => (status, json).into_response(),
    }
}

pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(ready_handler))
        .with_state(state)
}

/// Full router: health endpoints, session layer and request tracing.
pub fn router(state: &AppState, app_info: AppInfo) -> Router {
    Router::new()
        .merge(health_router(app_info))
        .merge(ready_router(state.clone()))
        .layer(state.session().layer())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
