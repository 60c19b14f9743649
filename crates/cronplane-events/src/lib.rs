//! `cronplane-events` — the in-process named-event dispatcher.
//!
//! The worker turns queue messages into named events; listeners (the
//! execution persister, the heartbeat notifier, anything registered in
//! the future) subscribe by name. Dispatch is fail-fast: the first
//! listener error aborts the chain so the worker can leave the message
//! unacknowledged for redelivery.

pub mod context;
pub mod dispatcher;

/// First observation of a task (platform version counter == 1).
pub const CRON_EXECUTION_STARTED: &str = "CronExecutionStarted";
/// Task reached STOPPED with desired status STOPPED — no more changes.
pub const CRON_EXECUTION_STOPPED: &str = "CronExecutionStopped";
/// Fired for every observation, regardless of the derivation above.
pub const CRON_EXECUTION_STATE_CHANGED: &str = "CronExecutionStateChanged";

pub use context::EventContext;
pub use dispatcher::{Dispatcher, Listener};
