use std::sync::Arc;

use tracing::{debug, warn};

use cronplane_core::config::TASK_STATE_CHANGE_DETAIL_TYPE;
use cronplane_core::{Result, Task};
use cronplane_events::{
    Dispatcher, EventContext, CRON_EXECUTION_STARTED, CRON_EXECUTION_STATE_CHANGED,
    CRON_EXECUTION_STOPPED,
};

use crate::envelope::Envelope;

/// Turns one queue message into zero or more fired events.
///
/// `Ok(())` tells the caller to acknowledge: either every fired listener
/// succeeded, or the message was dropped on purpose (foreign detail-type,
/// unparseable payload, task that is not ours). An `Err` means a listener
/// failed and the message must stay on the queue for redelivery.
pub struct MessageHandler {
    dispatcher: Arc<Dispatcher>,
    cron_name_prefix: String,
}

impl MessageHandler {
    pub fn new(dispatcher: Arc<Dispatcher>, cron_name_prefix: impl Into<String>) -> Self {
        Self {
            dispatcher,
            cron_name_prefix: cron_name_prefix.into(),
        }
    }

    pub async fn handle(&self, body: &str) -> Result<()> {
        let envelope: Envelope = match serde_json::from_str(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                // A body that never parses will never parse on redelivery.
                warn!(error = %e, "undecodable queue envelope dropped");
                return Ok(());
            }
        };

        if envelope.detail_type != TASK_STATE_CHANGE_DETAIL_TYPE {
            warn!(detail_type = %envelope.detail_type, "unexpected detail-type dropped");
            return Ok(());
        }

        let task: Task = match serde_json::from_value(envelope.detail) {
            Ok(task) => task,
            Err(e) => {
                warn!(error = %e, "undecodable task detail dropped");
                return Ok(());
            }
        };

        let Some(container) = task.user_container() else {
            debug!(task_id = %task.task_id, "task without user container dropped");
            return Ok(());
        };
        let Some(cron_name) = container.name.strip_prefix(&self.cron_name_prefix) else {
            debug!(task_id = %task.task_id, container = %container.name, "foreign task ignored");
            return Ok(());
        };

        let ctx = EventContext::new(cron_name, task.clone());
        if task.is_first_observation() {
            self.dispatcher.fire(CRON_EXECUTION_STARTED, &ctx).await?;
        } else if task.is_settled() {
            self.dispatcher.fire(CRON_EXECUTION_STOPPED, &ctx).await?;
        }
        self.dispatcher.fire(CRON_EXECUTION_STATE_CHANGED, &ctx).await?;

        debug!(
            cron = %ctx.cron_name,
            task_id = %ctx.task.task_id,
            version = ctx.task.version,
            "task observation processed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use cronplane_core::Error;
    use cronplane_events::Listener;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Listener for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        async fn handle(&self, ctx: &EventContext) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.label, ctx.cron_name));
            if self.fail {
                return Err(Error::TransientBackend("store down".into()));
            }
            Ok(())
        }
    }

    fn handler_with_recorders(
        fail_state_changed: bool,
    ) -> (MessageHandler, Arc<Mutex<Vec<String>>>) {
        let dispatcher = Arc::new(Dispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.register(
            CRON_EXECUTION_STARTED,
            Arc::new(Recorder { label: "started", log: Arc::clone(&log), fail: false }),
        );
        dispatcher.register(
            CRON_EXECUTION_STOPPED,
            Arc::new(Recorder { label: "stopped", log: Arc::clone(&log), fail: false }),
        );
        dispatcher.register(
            CRON_EXECUTION_STATE_CHANGED,
            Arc::new(Recorder {
                label: "changed",
                log: Arc::clone(&log),
                fail: fail_state_changed,
            }),
        );
        (MessageHandler::new(dispatcher, "cron--"), log)
    }

    fn envelope(detail_type: &str, detail: serde_json::Value) -> String {
        json!({"detail-type": detail_type, "detail": detail}).to_string()
    }

    fn task_detail(container: &str, version: i64, status: &str, desired: &str) -> serde_json::Value {
        json!({
            "taskId": "t-1",
            "containers": [{"name": container, "exitCode": null}],
            "lastStatus": status,
            "desiredStatus": desired,
            "version": version,
        })
    }

    #[tokio::test]
    async fn first_observation_fires_started_then_state_changed() {
        let (handler, log) = handler_with_recorders(false);
        handler
            .handle(&envelope(
                "ECS Task State Change",
                task_detail("cron--daily-report", 1, "RUNNING", "RUNNING"),
            ))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["started:daily-report", "changed:daily-report"]
        );
    }

    #[tokio::test]
    async fn settled_task_fires_stopped_then_state_changed() {
        let (handler, log) = handler_with_recorders(false);
        handler
            .handle(&envelope(
                "ECS Task State Change",
                task_detail("cron--daily-report", 4, "STOPPED", "STOPPED"),
            ))
            .await
            .unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["stopped:daily-report", "changed:daily-report"]
        );
    }

    #[tokio::test]
    async fn intermediate_observation_fires_only_state_changed() {
        let (handler, log) = handler_with_recorders(false);
        handler
            .handle(&envelope(
                "ECS Task State Change",
                task_detail("cron--daily-report", 3, "RUNNING", "RUNNING"),
            ))
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), ["changed:daily-report"]);
    }

    #[tokio::test]
    async fn foreign_detail_type_is_dropped_with_ack() {
        let (handler, log) = handler_with_recorders(false);
        handler
            .handle(&envelope("EC2 Instance State Change", json!({})))
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn foreign_container_prefix_is_dropped_with_ack() {
        let (handler, log) = handler_with_recorders(false);
        handler
            .handle(&envelope(
                "ECS Task State Change",
                task_detail("web-frontend", 1, "RUNNING", "RUNNING"),
            ))
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sidecar_only_task_is_dropped_with_ack() {
        let (handler, log) = handler_with_recorders(false);
        handler
            .handle(&envelope(
                "ECS Task State Change",
                task_detail("timeout", 1, "RUNNING", "RUNNING"),
            ))
            .await
            .unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_body_is_dropped_with_ack() {
        let (handler, log) = handler_with_recorders(false);
        handler.handle("not json at all").await.unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn listener_failure_propagates_for_redelivery() {
        let (handler, _log) = handler_with_recorders(true);
        let err = handler
            .handle(&envelope(
                "ECS Task State Change",
                task_detail("cron--daily-report", 2, "RUNNING", "RUNNING"),
            ))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
