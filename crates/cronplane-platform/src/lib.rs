//! `cronplane-platform` — the contract with the external container
//! platform.
//!
//! Cronplane never talks to a concrete runtime directly; the lifecycle
//! service and the trigger endpoint go through [`ContainerPlatform`], and
//! concrete SDK bindings plug in behind it. The crate ships
//! [`memory::InMemoryPlatform`], an in-process binding used by tests and
//! local runs.

pub mod memory;
pub mod types;

use async_trait::async_trait;

use cronplane_core::{Result, Task};

pub use memory::InMemoryPlatform;
pub use types::{LogLine, LogStreamType, RegisteredTaskDefinition, ScheduledRule, TaskDefinitionSpec};

#[async_trait]
pub trait ContainerPlatform: Send + Sync {
    /// Register a new revision under the spec's task family.
    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<RegisteredTaskDefinition>;

    /// Deregister every revision of a family.
    async fn deregister_task_family(&self, family: &str) -> Result<()>;

    /// Create or update the scheduled rule that fires the cron; the
    /// platform evaluates the schedule expression and emits one trigger
    /// per fire.
    async fn put_scheduled_rule(
        &self,
        rule_name: &str,
        schedule: &str,
        family: &str,
        revision: i64,
    ) -> Result<ScheduledRule>;

    async fn delete_scheduled_rule(&self, rule_name: &str) -> Result<()>;

    /// Start one task invocation now. Returns the platform task id.
    async fn run_task(&self, family: &str, revision: i64) -> Result<String>;

    /// Point-in-time snapshot of a task, if the platform still knows it.
    async fn describe_task(&self, task_id: &str) -> Result<Option<Task>>;

    /// Tail the captured log stream of a task's user container.
    async fn fetch_logs(&self, task_id: &str, stream: LogStreamType) -> Result<Vec<LogLine>>;
}
