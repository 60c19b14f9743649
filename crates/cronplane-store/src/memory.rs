//! In-memory store bindings — single process only, no persistence.
//! Used by worker tests and local runs without a database file.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use cronplane_core::{Cron, Error, Execution, Result, Task};

use crate::{CronStore, ExecutionStore};

#[derive(Default)]
pub struct MemoryExecutionStore {
    records: Mutex<HashMap<(String, String), Execution>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn update(&self, cron_name: &str, task: &Task) -> Result<()> {
        let mut exec = Execution::from_task(cron_name, task, Utc::now());
        let key = (cron_name.to_string(), task.task_id.clone());
        let mut records = self.records.lock().unwrap();
        if let Some(stored) = records.get(&key) {
            if stored.version >= exec.version {
                // Late or duplicate delivery: silently keep the newer record.
                return Ok(());
            }
            exec.expires_at = stored.expires_at;
        }
        records.insert(key, exec);
        Ok(())
    }

    async fn last_n(&self, cron_name: &str, n: usize) -> Result<Vec<Execution>> {
        let now = Utc::now().timestamp();
        let records = self.records.lock().unwrap();
        let mut matching: Vec<Execution> = records
            .values()
            .filter(|e| e.cron_name == cron_name && e.expires_at > now)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.task_id.cmp(&a.task_id));
        matching.truncate(n);
        Ok(matching)
    }

    async fn get(&self, cron_name: &str, task_id: &str) -> Result<Option<Execution>> {
        let now = Utc::now().timestamp();
        let records = self.records.lock().unwrap();
        Ok(records
            .get(&(cron_name.to_string(), task_id.to_string()))
            .filter(|e| e.expires_at > now)
            .cloned())
    }

    async fn get_by_task_id(&self, task_id: &str) -> Result<Option<Execution>> {
        let now = Utc::now().timestamp();
        let records = self.records.lock().unwrap();
        Ok(records
            .values()
            .find(|e| e.task_id == task_id && e.expires_at > now)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryCronStore {
    crons: Mutex<HashMap<String, Cron>>,
}

impl MemoryCronStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CronStore for MemoryCronStore {
    async fn put(&self, cron: &Cron) -> Result<()> {
        let mut crons = self.crons.lock().unwrap();
        if crons.contains_key(&cron.name) {
            return Err(Error::AlreadyExists(format!("cron {}", cron.name)));
        }
        crons.insert(cron.name.clone(), cron.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Cron>> {
        Ok(self.crons.lock().unwrap().get(name).cloned())
    }

    async fn find_by_rule_arn(&self, rule_arn: &str) -> Result<Option<Cron>> {
        Ok(self
            .crons
            .lock()
            .unwrap()
            .values()
            .find(|c| c.rule_arn == rule_arn)
            .cloned())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        if self.crons.lock().unwrap().remove(name).is_none() {
            return Err(Error::NotFound(format!("cron {name}")));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cron>> {
        let mut all: Vec<Cron> = self.crons.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronplane_core::task::TaskContainer;
    use cronplane_core::ExecutionStatus;

    fn task(task_id: &str, version: i64, raw_status: &str, exit: Option<i64>) -> Task {
        Task {
            task_id: task_id.into(),
            containers: vec![TaskContainer {
                name: "cron--report".into(),
                exit_code: exit,
                last_status: None,
            }],
            last_status: raw_status.into(),
            desired_status: raw_status.into(),
            started_at: None,
            stopped_at: None,
            stopped_reason: None,
            version,
        }
    }

    #[tokio::test]
    async fn memory_store_enforces_the_version_guard() {
        let store = MemoryExecutionStore::new();
        store.update("report", &task("t1", 5, "RUNNING", None)).await.unwrap();
        store.update("report", &task("t1", 3, "STOPPED", Some(0))).await.unwrap();

        let stored = store.get("report", "t1").await.unwrap().unwrap();
        assert_eq!(stored.version, 5);
        assert_eq!(stored.status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn memory_last_n_matches_sqlite_semantics() {
        let store = MemoryExecutionStore::new();
        for i in 1..=4 {
            store
                .update("report", &task(&format!("t{i}"), 1, "RUNNING", None))
                .await
                .unwrap();
        }
        let recent = store.last_n("report", 2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|e| e.task_id.as_str()).collect();
        assert_eq!(ids, ["t4", "t3"]);
    }
}
