//! `cronplane-store` — durable records for crons and their executions.
//!
//! Two capability traits, each with a SQLite binding and an in-memory
//! binding (the latter doubles as the test fake):
//!
//! - [`ExecutionStore`] — the monotonic per-execution history. `update`
//!   is a conditional upsert keyed on the platform-supplied version
//!   counter; a losing write is a silent no-op, not an error. Records
//!   carry a write-once expiry 14 days after first observation and the
//!   backend evicts them past that point.
//! - [`CronStore`] — registered crons, looked up by name or by the
//!   scheduled-rule ARN a trigger notification carries.

pub mod db;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use cronplane_core::{Cron, Execution, Result, Task};

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Derive the execution record for `task` and upsert it iff its
    /// version is newer than what is stored. Late or duplicate delivery
    /// loses the race silently; only backend failures are errors.
    async fn update(&self, cron_name: &str, task: &Task) -> Result<()>;

    /// The `n` most recent executions for a cron, sort key descending,
    /// truncated to exactly `n`. Expired records are never returned.
    async fn last_n(&self, cron_name: &str, n: usize) -> Result<Vec<Execution>>;

    /// Single execution by its composite key.
    async fn get(&self, cron_name: &str, task_id: &str) -> Result<Option<Execution>>;

    /// Single execution by task id alone (the HTTP surface exposes
    /// executions without a cron-name qualifier).
    async fn get_by_task_id(&self, task_id: &str) -> Result<Option<Execution>>;
}

#[async_trait]
pub trait CronStore: Send + Sync {
    /// Record a newly created cron. `AlreadyExists` when the name is taken.
    async fn put(&self, cron: &Cron) -> Result<()>;

    async fn get(&self, name: &str) -> Result<Option<Cron>>;

    /// Resolve a cron from the scheduled-rule ARN carried by a trigger
    /// notification.
    async fn find_by_rule_arn(&self, rule_arn: &str) -> Result<Option<Cron>>;

    async fn delete(&self, name: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<Cron>>;
}

pub use memory::{MemoryCronStore, MemoryExecutionStore};
pub use sqlite::{SqliteCronStore, SqliteExecutionStore};
