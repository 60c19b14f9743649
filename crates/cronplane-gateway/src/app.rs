use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use cronplane_core::config::{CronplaneConfig, HTTP_DEADLINE_SECS};
use cronplane_lifecycle::LifecycleService;

/// Central shared state, passed as `Arc<AppState>` to all handlers.
pub struct AppState {
    pub config: CronplaneConfig,
    pub lifecycle: LifecycleService,
    /// Outbound client for confirming trigger subscriptions.
    pub http: reqwest::Client,
}

/// Assemble the full router. Every request carries the end-to-end
/// deadline; timed-out requests never reach a handler mid-flight.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(crate::http::status::status_handler))
        .route(
            "/crons",
            get(crate::http::crons::list).post(crate::http::crons::create),
        )
        .route("/crons/trigger", post(crate::http::trigger::trigger_handler))
        .route(
            "/crons/executions/{id}",
            get(crate::http::executions::status),
        )
        .route(
            "/crons/executions/{id}/logs",
            get(crate::http::executions::logs),
        )
        .route(
            "/crons/{name}",
            get(crate::http::crons::status).delete(crate::http::crons::remove),
        )
        .route(
            "/crons/{name}/executions",
            get(crate::http::executions::list_for_cron),
        )
        .layer(TimeoutLayer::new(Duration::from_secs(HTTP_DEADLINE_SECS)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
