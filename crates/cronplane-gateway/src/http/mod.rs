pub mod crons;
pub mod executions;
pub mod status;
pub mod trigger;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use cronplane_core::Error;

/// Domain error as an HTTP response. `LockTaken` and `Conflict` are
/// consumed long before this layer; anything not explicitly mapped is a
/// 500 with a redacted message (full detail goes to the log only).
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            Error::InvalidInput(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Error::AlreadyExists(m) => (StatusCode::CONFLICT, m.clone()),
            other => {
                error!(code = other.code(), error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        let body = Json(json!({ "code": self.0.code(), "message": message }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;


#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use cronplane_core::config::CronplaneConfig;
    use cronplane_heartbeat::{DisabledHeartbeat, HeartbeatApi};
    use cronplane_lifecycle::LifecycleService;
    use cronplane_platform::{ContainerPlatform, InMemoryPlatform};
    use cronplane_store::{CronStore, ExecutionStore, MemoryCronStore, MemoryExecutionStore};

    use crate::app::AppState;

    pub struct TestCtx {
        pub state: Arc<AppState>,
        pub platform: Arc<InMemoryPlatform>,
        pub executions: Arc<MemoryExecutionStore>,
        pub crons: Arc<MemoryCronStore>,
    }

    pub fn ctx() -> TestCtx {
        let platform = Arc::new(InMemoryPlatform::new());
        let crons = Arc::new(MemoryCronStore::new());
        let executions = Arc::new(MemoryExecutionStore::new());
        let lifecycle = LifecycleService::new(
            platform.clone() as Arc<dyn ContainerPlatform>,
            crons.clone() as Arc<dyn CronStore>,
            executions.clone() as Arc<dyn ExecutionStore>,
            Arc::new(DisabledHeartbeat) as Arc<dyn HeartbeatApi>,
            "cron--",
            None,
            None,
        );
        let state = Arc::new(AppState {
            config: CronplaneConfig::default(),
            lifecycle,
            http: reqwest::Client::new(),
        });
        TestCtx { state, platform, executions, crons }
    }
}
