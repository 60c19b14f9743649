use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use cronplane_core::types::CronDescription;
use cronplane_core::{Cron, Error, Execution, Result};
use cronplane_heartbeat::{HeartbeatApi, MonitorRules};
use cronplane_platform::{ContainerPlatform, LogLine, LogStreamType, TaskDefinitionSpec};
use cronplane_store::{CronStore, ExecutionStore};

use crate::validate::validate;

/// Executions embedded in a `status` response.
const STATUS_EXECUTIONS: usize = 10;
/// Page size of the dedicated executions listing.
const EXECUTIONS_PAGE: usize = 100;

/// A cron together with its recent history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronStatus {
    pub cron: Cron,
    pub executions: Vec<Execution>,
}

pub struct LifecycleService {
    platform: Arc<dyn ContainerPlatform>,
    crons: Arc<dyn CronStore>,
    executions: Arc<dyn ExecutionStore>,
    heartbeat: Arc<dyn HeartbeatApi>,
    cron_name_prefix: String,
    datacenter: Option<String>,
    cluster: Option<String>,
}

impl LifecycleService {
    pub fn new(
        platform: Arc<dyn ContainerPlatform>,
        crons: Arc<dyn CronStore>,
        executions: Arc<dyn ExecutionStore>,
        heartbeat: Arc<dyn HeartbeatApi>,
        cron_name_prefix: impl Into<String>,
        datacenter: Option<String>,
        cluster: Option<String>,
    ) -> Self {
        Self {
            platform,
            crons,
            executions,
            heartbeat,
            cron_name_prefix: cron_name_prefix.into(),
            datacenter,
            cluster,
        }
    }

    fn resource_name(&self, cron_name: &str) -> String {
        format!("{}{cron_name}", self.cron_name_prefix)
    }

    /// Provision a cron. Validation runs before any external resource is
    /// touched; the durable record is written last so a stored cron
    /// always has its resources.
    pub async fn create(&self, desc: CronDescription) -> Result<Cron> {
        validate(&desc)?;
        if self.crons.get(&desc.name).await?.is_some() {
            return Err(Error::AlreadyExists(format!("cron {}", desc.name)));
        }

        let family = self.resource_name(&desc.name);
        let registered = self
            .platform
            .register_task_definition(&TaskDefinitionSpec {
                family: family.clone(),
                image: desc.container.image.clone(),
                arguments: desc.container.arguments.clone(),
                environment: desc.container.environment.clone(),
                capacity: desc.container.capacity,
                logging: desc.container.logging.clone(),
                timeout_secs: desc.timeout_secs(),
                datacenter: self.datacenter.clone(),
                cluster: self.cluster.clone(),
            })
            .await?;
        let rule = self
            .platform
            .put_scheduled_rule(&family, &desc.schedule, &registered.family, registered.revision)
            .await?;

        let monitor_id = match &desc.notifications {
            Some(notifications) => Some(
                self.heartbeat
                    .create_monitor(&desc.name, &MonitorRules::from(notifications))
                    .await?,
            ),
            None => None,
        };

        let cron = Cron {
            name: desc.name.clone(),
            rule_name: rule.name,
            rule_arn: rule.arn,
            task_family: registered.family,
            latest_task_revision: registered.revision,
            monitor_id,
            description: desc,
        };
        self.crons.put(&cron).await?;
        info!(
            cron = %cron.name,
            revision = cron.latest_task_revision,
            monitored = cron.monitor_id.is_some(),
            "cron created"
        );
        Ok(cron)
    }

    /// Tear down a cron. Every step is attempted; the first failure is
    /// returned after the rest have run.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let cron = self
            .crons
            .get(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("cron {name}")))?;

        let mut first_error: Option<Error> = None;
        let mut record = |step: &str, outcome: Result<()>| {
            if let Err(e) = outcome {
                warn!(cron = %name, step, error = %e, "teardown step failed");
                first_error.get_or_insert(e);
            }
        };

        record(
            "scheduled-rule",
            self.platform.delete_scheduled_rule(&cron.rule_name).await,
        );
        record(
            "task-family",
            self.platform.deregister_task_family(&cron.task_family).await,
        );
        if let Some(monitor_id) = &cron.monitor_id {
            record("monitor", self.heartbeat.delete_monitor(monitor_id).await);
        }
        record("record", self.crons.delete(name).await);

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(cron = %name, "cron deleted");
                Ok(())
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<Cron>> {
        self.crons.list().await
    }

    pub async fn status(&self, name: &str) -> Result<CronStatus> {
        let cron = self
            .crons
            .get(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("cron {name}")))?;
        let executions = self.executions.last_n(name, STATUS_EXECUTIONS).await?;
        Ok(CronStatus { cron, executions })
    }

    pub async fn executions(&self, name: &str) -> Result<Vec<Execution>> {
        if self.crons.get(name).await?.is_none() {
            return Err(Error::NotFound(format!("cron {name}")));
        }
        self.executions.last_n(name, EXECUTIONS_PAGE).await
    }

    pub async fn execution_status(&self, task_id: &str) -> Result<Execution> {
        self.executions
            .get_by_task_id(task_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("execution {task_id}")))
    }

    pub async fn execution_logs(
        &self,
        task_id: &str,
        stream: LogStreamType,
    ) -> Result<Vec<LogLine>> {
        if self.executions.get_by_task_id(task_id).await?.is_none() {
            return Err(Error::NotFound(format!("execution {task_id}")));
        }
        self.platform.fetch_logs(task_id, stream).await
    }

    /// A scheduled rule fired: resolve the cron it belongs to and start
    /// one task now. Returns the platform task id.
    pub async fn handle_rule_trigger(&self, rule_arn: &str) -> Result<String> {
        let cron = self
            .crons
            .find_by_rule_arn(rule_arn)
            .await?
            .ok_or_else(|| Error::NotFound(format!("no cron for rule {rule_arn}")))?;
        let task_id = self
            .platform
            .run_task(&cron.task_family, cron.latest_task_revision)
            .await?;
        info!(cron = %cron.name, task_id = %task_id, "trigger dispatched");
        Ok(task_id)
    }
}
