//! `cronplane-lifecycle` — registering and disposing crons.
//!
//! `create` provisions external resources in a fixed order (task
//! definition, scheduled rule, monitor) and records the cron durably
//! only once everything exists. `delete` is the mirror image, run
//! best-effort: every teardown step is attempted, failures are logged,
//! and the first failure is returned. The read operations behind the
//! HTTP surface (status, executions, logs) live here too.

pub mod service;
pub mod validate;

pub use service::{CronStatus, LifecycleService};
pub use validate::validate;
