//! In-process platform binding — no external runtime, used by tests and
//! local development.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use cronplane_core::task::TaskContainer;
use cronplane_core::{Error, Result, Task};

use crate::types::{
    LogLine, LogStreamType, RegisteredTaskDefinition, ScheduledRule, TaskDefinitionSpec,
};
use crate::ContainerPlatform;

#[derive(Default)]
struct PlatformState {
    /// family -> latest revision.
    families: HashMap<String, i64>,
    /// rule name -> rule.
    rules: HashMap<String, ScheduledRule>,
    /// task id -> snapshot.
    tasks: HashMap<String, Task>,
    /// (task id, stream) -> lines.
    logs: HashMap<(String, LogStreamType), Vec<LogLine>>,
}

/// In-memory [`ContainerPlatform`]. Registered state is inspectable so
/// lifecycle tests can assert which external resources exist after a
/// create or a (partial) delete.
#[derive(Default)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered_families(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().unwrap().families.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn rule_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().unwrap().rules.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().tasks.keys().cloned().collect()
    }

    /// Seed a task snapshot so `describe_task` can find it.
    pub fn insert_task(&self, task: Task) {
        self.state
            .lock()
            .unwrap()
            .tasks
            .insert(task.task_id.clone(), task);
    }

    /// Seed captured log lines for a task.
    pub fn insert_logs(&self, task_id: &str, stream: LogStreamType, lines: Vec<LogLine>) {
        self.state
            .lock()
            .unwrap()
            .logs
            .insert((task_id.to_string(), stream), lines);
    }
}

#[async_trait]
impl ContainerPlatform for InMemoryPlatform {
    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<RegisteredTaskDefinition> {
        let mut state = self.state.lock().unwrap();
        let revision = state
            .families
            .entry(spec.family.clone())
            .and_modify(|r| *r += 1)
            .or_insert(1);
        Ok(RegisteredTaskDefinition {
            family: spec.family.clone(),
            revision: *revision,
        })
    }

    async fn deregister_task_family(&self, family: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.families.remove(family).is_none() {
            return Err(Error::NotFound(format!("task family {family}")));
        }
        Ok(())
    }

    async fn put_scheduled_rule(
        &self,
        rule_name: &str,
        _schedule: &str,
        family: &str,
        revision: i64,
    ) -> Result<ScheduledRule> {
        let rule = ScheduledRule {
            name: rule_name.to_string(),
            arn: format!("arn:memory:rule/{rule_name}/{family}:{revision}"),
        };
        self.state
            .lock()
            .unwrap()
            .rules
            .insert(rule_name.to_string(), rule.clone());
        Ok(rule)
    }

    async fn delete_scheduled_rule(&self, rule_name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.rules.remove(rule_name).is_none() {
            return Err(Error::NotFound(format!("rule {rule_name}")));
        }
        Ok(())
    }

    async fn run_task(&self, family: &str, _revision: i64) -> Result<String> {
        let task_id = Uuid::new_v4().to_string();
        let task = Task {
            task_id: task_id.clone(),
            containers: vec![TaskContainer {
                // `family` already carries the resource prefix.
                name: family.to_string(),
                exit_code: None,
                last_status: Some("PENDING".into()),
            }],
            last_status: "PENDING".into(),
            desired_status: "RUNNING".into(),
            started_at: Some(Utc::now()),
            stopped_at: None,
            stopped_reason: None,
            version: 1,
        };
        self.state.lock().unwrap().tasks.insert(task_id.clone(), task);
        Ok(task_id)
    }

    async fn describe_task(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.state.lock().unwrap().tasks.get(task_id).cloned())
    }

    async fn fetch_logs(&self, task_id: &str, stream: LogStreamType) -> Result<Vec<LogLine>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .logs
            .get(&(task_id.to_string(), stream))
            .cloned()
            .unwrap_or_default())
    }
}
