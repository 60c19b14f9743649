use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use cronplane_core::{Error, Execution};
use cronplane_platform::{LogLine, LogStreamType};

use crate::app::AppState;
use crate::http::ApiResult;

/// GET /crons/{name}/executions
pub async fn list_for_cron(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<Execution>>> {
    Ok(Json(state.lifecycle.executions(&name).await?))
}

/// GET /crons/executions/{id}
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Execution>> {
    Ok(Json(state.lifecycle.execution_status(&id).await?))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    #[serde(rename = "log-type")]
    pub log_type: String,
}

/// GET /crons/executions/{id}/logs?log-type=stdout|stderr
pub async fn logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Json<Vec<LogLine>>> {
    let stream: LogStreamType = query
        .log_type
        .parse()
        .map_err(Error::InvalidInput)?;
    Ok(Json(state.lifecycle.execution_logs(&id, stream).await?))
}
