//! `cronplane-core` — shared domain types, configuration and error kinds.
//!
//! Everything the other cronplane crates agree on lives here: the
//! [`CronDescription`](types::CronDescription) users submit, the task
//! snapshot shape the container platform reports, the pure execution
//! classifier, the unified error kinds, and the figment-backed config
//! loader.

pub mod config;
pub mod creds;
pub mod error;
pub mod execution;
pub mod task;
pub mod types;

pub use config::CronplaneConfig;
pub use error::{Error, Result};
pub use execution::{classify, is_running, Execution, ExecutionStatus};
pub use task::{Task, TaskContainer};
pub use types::{Cron, CronDescription};
