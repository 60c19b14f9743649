use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use cronplane_core::{classify, ExecutionStatus, Result};
use cronplane_events::{
    Dispatcher, EventContext, Listener, CRON_EXECUTION_STARTED, CRON_EXECUTION_STOPPED,
};
use cronplane_store::CronStore;

use crate::HeartbeatApi;

/// Resolve the monitor id for a cron. Crons without notification rules
/// have no monitor and are skipped silently.
async fn monitor_id_for(crons: &dyn CronStore, cron_name: &str) -> Result<Option<String>> {
    let Some(cron) = crons.get(cron_name).await? else {
        // The cron record may already be deleted while late task events
        // drain; nothing to report against.
        debug!(cron = %cron_name, "no cron record for heartbeat report");
        return Ok(None);
    };
    Ok(cron.monitor_id)
}

/// `CronExecutionStarted` → run ping.
pub struct RunReporter {
    api: Arc<dyn HeartbeatApi>,
    crons: Arc<dyn CronStore>,
}

impl RunReporter {
    pub fn new(api: Arc<dyn HeartbeatApi>, crons: Arc<dyn CronStore>) -> Self {
        Self { api, crons }
    }
}

#[async_trait]
impl Listener for RunReporter {
    fn name(&self) -> &str {
        "heartbeat-run"
    }

    async fn handle(&self, ctx: &EventContext) -> Result<()> {
        match monitor_id_for(self.crons.as_ref(), &ctx.cron_name).await? {
            Some(monitor_id) => self.api.report_run(&monitor_id).await,
            None => Ok(()),
        }
    }
}

/// `CronExecutionStopped` → success or fail ping, based on the classified
/// outcome (SUCCESS reports success; FAILED, TIMEOUT and UNKNOWN all
/// report failure).
pub struct OutcomeReporter {
    api: Arc<dyn HeartbeatApi>,
    crons: Arc<dyn CronStore>,
}

impl OutcomeReporter {
    pub fn new(api: Arc<dyn HeartbeatApi>, crons: Arc<dyn CronStore>) -> Self {
        Self { api, crons }
    }
}

#[async_trait]
impl Listener for OutcomeReporter {
    fn name(&self) -> &str {
        "heartbeat-outcome"
    }

    async fn handle(&self, ctx: &EventContext) -> Result<()> {
        let Some(monitor_id) = monitor_id_for(self.crons.as_ref(), &ctx.cron_name).await? else {
            return Ok(());
        };
        let task = &ctx.task;
        let status = classify(
            &task.last_status,
            task.user_container().and_then(|c| c.exit_code),
            task.timeout_exit_code(),
        );
        if status == ExecutionStatus::Success {
            self.api.report_success(&monitor_id).await
        } else {
            self.api.report_fail(&monitor_id).await
        }
    }
}

/// Wire both reporters into the dispatcher.
pub fn register_heartbeat_listeners(
    dispatcher: &Dispatcher,
    api: Arc<dyn HeartbeatApi>,
    crons: Arc<dyn CronStore>,
) {
    dispatcher.register(
        CRON_EXECUTION_STARTED,
        Arc::new(RunReporter::new(Arc::clone(&api), Arc::clone(&crons))),
    );
    dispatcher.register(
        CRON_EXECUTION_STOPPED,
        Arc::new(OutcomeReporter::new(api, crons)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use cronplane_core::task::TaskContainer;
    use cronplane_core::types::{Capacity, ContainerSpec, Logging};
    use cronplane_core::{Cron, CronDescription, Task};
    use cronplane_store::MemoryCronStore;

    use crate::MonitorRules;

    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HeartbeatApi for RecordingApi {
        async fn create_monitor(&self, _cron_name: &str, _rules: &MonitorRules) -> Result<String> {
            Ok("mon-test".into())
        }
        async fn delete_monitor(&self, _monitor_id: &str) -> Result<()> {
            Ok(())
        }
        async fn report_run(&self, monitor_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("run:{monitor_id}"));
            Ok(())
        }
        async fn report_success(&self, monitor_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("success:{monitor_id}"));
            Ok(())
        }
        async fn report_fail(&self, monitor_id: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("fail:{monitor_id}"));
            Ok(())
        }
    }

    fn cron(name: &str, monitor_id: Option<&str>) -> Cron {
        Cron {
            name: name.into(),
            description: CronDescription {
                name: name.into(),
                schedule: "rate(1 hour)".into(),
                timeout: None,
                container: ContainerSpec {
                    image: "example/x:1".into(),
                    arguments: vec![],
                    environment: Default::default(),
                    capacity: Capacity { cpu: 256, memory: 512 },
                    logging: Logging::default(),
                },
                notifications: None,
            },
            rule_name: format!("cron--{name}"),
            rule_arn: format!("arn:rule/{name}"),
            task_family: format!("cron--{name}"),
            latest_task_revision: 1,
            monitor_id: monitor_id.map(String::from),
        }
    }

    fn stopped_task(user_exit: Option<i64>, timeout_exit: Option<i64>) -> Task {
        Task {
            task_id: "t-1".into(),
            containers: vec![
                TaskContainer {
                    name: "timeout".into(),
                    exit_code: timeout_exit,
                    last_status: None,
                },
                TaskContainer {
                    name: "cron--report".into(),
                    exit_code: user_exit,
                    last_status: None,
                },
            ],
            last_status: "STOPPED".into(),
            desired_status: "STOPPED".into(),
            started_at: None,
            stopped_at: None,
            stopped_reason: None,
            version: 4,
        }
    }

    async fn seeded(monitor_id: Option<&str>) -> (Arc<RecordingApi>, Arc<MemoryCronStore>) {
        let api = Arc::new(RecordingApi::default());
        let crons = Arc::new(MemoryCronStore::new());
        crons.put(&cron("report", monitor_id)).await.unwrap();
        (api, crons)
    }

    #[tokio::test]
    async fn started_event_reports_run() {
        let (api, crons) = seeded(Some("mon-1")).await;
        let reporter = RunReporter::new(api.clone(), crons);
        let mut task = stopped_task(None, None);
        task.last_status = "RUNNING".into();
        task.version = 1;

        reporter
            .handle(&EventContext::new("report", task))
            .await
            .unwrap();
        assert_eq!(*api.calls.lock().unwrap(), ["run:mon-1"]);
    }

    #[tokio::test]
    async fn success_outcome_reports_success() {
        let (api, crons) = seeded(Some("mon-1")).await;
        let reporter = OutcomeReporter::new(api.clone(), crons);
        reporter
            .handle(&EventContext::new("report", stopped_task(Some(0), Some(0))))
            .await
            .unwrap();
        assert_eq!(*api.calls.lock().unwrap(), ["success:mon-1"]);
    }

    #[tokio::test]
    async fn timeout_outcome_reports_fail() {
        let (api, crons) = seeded(Some("mon-1")).await;
        let reporter = OutcomeReporter::new(api.clone(), crons);
        reporter
            .handle(&EventContext::new("report", stopped_task(Some(0), Some(201))))
            .await
            .unwrap();
        assert_eq!(*api.calls.lock().unwrap(), ["fail:mon-1"]);
    }

    #[tokio::test]
    async fn cron_without_monitor_is_skipped() {
        let (api, crons) = seeded(None).await;
        let reporter = OutcomeReporter::new(api.clone(), crons);
        reporter
            .handle(&EventContext::new("report", stopped_task(Some(1), None)))
            .await
            .unwrap();
        assert!(api.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_cron_is_skipped() {
        let api = Arc::new(RecordingApi::default());
        let crons = Arc::new(MemoryCronStore::new());
        let reporter = RunReporter::new(api.clone(), crons);
        reporter
            .handle(&EventContext::new("ghost", stopped_task(None, None)))
            .await
            .unwrap();
        assert!(api.calls.lock().unwrap().is_empty());
    }
}
