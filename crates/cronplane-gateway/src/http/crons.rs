use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use cronplane_core::types::CronDescription;
use cronplane_core::Cron;
use cronplane_lifecycle::CronStatus;

use crate::app::AppState;
use crate::http::ApiResult;

/// GET /crons
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Cron>>> {
    Ok(Json(state.lifecycle.list().await?))
}

/// POST /crons — body is a CronDescription.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(desc): Json<CronDescription>,
) -> ApiResult<Json<Cron>> {
    Ok(Json(state.lifecycle.create(desc).await?))
}

/// GET /crons/{name} — cron record plus its recent executions.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<CronStatus>> {
    Ok(Json(state.lifecycle.status(&name).await?))
}

/// DELETE /crons/{name}
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.lifecycle.delete(&name).await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    use cronplane_core::types::{Capacity, ContainerSpec, Logging};

    use crate::http::testutil::ctx;

    fn desc(name: &str) -> CronDescription {
        CronDescription {
            name: name.into(),
            schedule: "rate(1 day)".into(),
            timeout: None,
            container: ContainerSpec {
                image: "example/report:1".into(),
                arguments: vec![],
                environment: Default::default(),
                capacity: Capacity { cpu: 256, memory: 512 },
                logging: Logging::default(),
            },
            notifications: None,
        }
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let t = ctx();
        let Json(created) = create(State(t.state.clone()), Json(desc("daily-report")))
            .await
            .unwrap();
        assert_eq!(created.name, "daily-report");

        let Json(all) = list(State(t.state.clone())).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].task_family, "cron--daily-report");
    }

    #[tokio::test]
    async fn status_of_unknown_cron_is_404() {
        let t = ctx();
        let err = status(State(t.state.clone()), Path("ghost".into()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0.code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn invalid_description_is_rejected() {
        let t = ctx();
        let err = create(State(t.state.clone()), Json(desc("Bad Name")))
            .await
            .err()
            .unwrap();
        assert_eq!(err.0.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn delete_removes_the_cron() {
        let t = ctx();
        create(State(t.state.clone()), Json(desc("daily-report")))
            .await
            .unwrap();
        remove(State(t.state.clone()), Path("daily-report".into()))
            .await
            .unwrap();
        let Json(all) = list(State(t.state.clone())).await.unwrap();
        assert!(all.is_empty());
        assert!(t.platform.registered_families().is_empty());
    }
}
