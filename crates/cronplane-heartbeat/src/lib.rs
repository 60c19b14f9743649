//! `cronplane-heartbeat` — run/success/fail reporting to the external
//! alerting service.
//!
//! The alerting service (a Cronitor-style monitor API) learns about every
//! run through pings: `run` when an execution starts, `complete` or
//! `fail` when it settles. Missed-run and ran-too-long rules are
//! configured on the monitor at cron create time. All outbound calls go
//! through a per-action circuit breaker with a 6 s per-call timeout so a
//! slow alerting backend cannot stall the event worker.

pub mod breaker;
pub mod client;
pub mod listener;

use async_trait::async_trait;

use cronplane_core::types::Notifications;
use cronplane_core::Result;

pub use breaker::CircuitBreaker;
pub use client::CronitorClient;
pub use listener::{register_heartbeat_listeners, OutcomeReporter, RunReporter};

/// Alerting rules derived from a validated [`Notifications`] block.
#[derive(Debug, Clone)]
pub struct MonitorRules {
    /// Seconds without a run ping before alerting (`run-ping-not-received`).
    pub no_run_threshold: Option<u64>,
    /// Seconds a run may take before alerting (`ran-longer-than`).
    pub ran_longer_than_threshold: Option<u64>,
    pub pagerduty_key: Option<String>,
    pub slack_channel: Option<String>,
}

impl From<&Notifications> for MonitorRules {
    fn from(n: &Notifications) -> Self {
        Self {
            no_run_threshold: n.no_run_threshold,
            ran_longer_than_threshold: n.ran_longer_than_threshold,
            pagerduty_key: n.pagerduty_key.clone(),
            slack_channel: n.slack_channel.clone(),
        }
    }
}

/// The alerting service, as far as cronplane is concerned.
#[async_trait]
pub trait HeartbeatApi: Send + Sync {
    /// Create a monitor for a cron; returns the monitor id recorded on
    /// the cron.
    async fn create_monitor(&self, cron_name: &str, rules: &MonitorRules) -> Result<String>;

    async fn delete_monitor(&self, monitor_id: &str) -> Result<()>;

    /// An execution started.
    async fn report_run(&self, monitor_id: &str) -> Result<()>;

    /// An execution settled successfully.
    async fn report_success(&self, monitor_id: &str) -> Result<()>;

    /// An execution settled with anything other than SUCCESS.
    async fn report_fail(&self, monitor_id: &str) -> Result<()>;
}

/// Stand-in used when no heartbeat credentials are configured. Pings are
/// silently dropped; creating a cron that asks for notifications fails
/// up front instead of registering a monitor nobody will ever ping.
pub struct DisabledHeartbeat;

#[async_trait]
impl HeartbeatApi for DisabledHeartbeat {
    async fn create_monitor(&self, _cron_name: &str, _rules: &MonitorRules) -> Result<String> {
        Err(cronplane_core::Error::InvalidInput(
            "notifications requested but no heartbeat credentials are configured".into(),
        ))
    }

    async fn delete_monitor(&self, _monitor_id: &str) -> Result<()> {
        Ok(())
    }

    async fn report_run(&self, _monitor_id: &str) -> Result<()> {
        Ok(())
    }

    async fn report_success(&self, _monitor_id: &str) -> Result<()> {
        Ok(())
    }

    async fn report_fail(&self, _monitor_id: &str) -> Result<()> {
        Ok(())
    }
}
