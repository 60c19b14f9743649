use axum::http::StatusCode;

/// GET /status — liveness probe. Empty body by contract; load balancers
/// only look at the status line.
pub async fn status_handler() -> StatusCode {
    StatusCode::OK
}
