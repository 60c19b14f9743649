use serde::{Deserialize, Serialize};

/// A user-submitted job description — immutable per revision.
///
/// `schedule` is an opaque scheduler-expression string; cronplane never
/// evaluates it, the external platform does and emits one trigger event per
/// fire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronDescription {
    /// Lowercase-alphanumeric-and-dash identifier, at most 64 characters.
    pub name: String,
    /// Scheduler expression, validated by the platform.
    pub schedule: String,
    /// Hard run-time cap in seconds. Defaults to 24 hours when unset.
    #[serde(default)]
    pub timeout: Option<u64>,
    pub container: ContainerSpec,
    #[serde(default)]
    pub notifications: Option<Notifications>,
}

impl CronDescription {
    /// Effective timeout, applying the 24 h default.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout
            .unwrap_or(crate::config::DEFAULT_TIMEOUT_SECS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub environment: std::collections::BTreeMap<String, String>,
    pub capacity: Capacity,
    #[serde(default)]
    pub logging: Logging,
}

/// Requested resource class, bounded by the platform's capacity classes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    /// CPU units (1024 = one vCPU).
    pub cpu: u32,
    /// Memory in MiB.
    pub memory: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Logging {
    /// Log streams to capture, e.g. `["stdout", "stderr"]`.
    #[serde(default)]
    pub types: Vec<String>,
}

/// Alerting rules for a cron. When present, at least one channel
/// (pagerduty or slack) must be set and thresholds must be >= 60 s.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Notifications {
    /// Alert when no run ping arrives within this many seconds.
    #[serde(default)]
    pub no_run_threshold: Option<u64>,
    /// Alert when a run exceeds this many seconds.
    #[serde(default)]
    pub ran_longer_than_threshold: Option<u64>,
    #[serde(default)]
    pub pagerduty_key: Option<String>,
    #[serde(default)]
    pub slack_channel: Option<String>,
}

impl Notifications {
    pub fn has_channel(&self) -> bool {
        self.pagerduty_key.is_some() || self.slack_channel.is_some()
    }
}

/// A registered job and the external resources provisioned for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cron {
    /// Primary key; equal to `description.name`.
    pub name: String,
    pub description: CronDescription,
    /// Name of the platform scheduled rule that fires this cron.
    pub rule_name: String,
    /// ARN of the scheduled rule — resolvable from trigger notifications.
    pub rule_arn: String,
    /// Task-definition family registered for this cron.
    pub task_family: String,
    /// Latest registered task-definition revision.
    pub latest_task_revision: i64,
    /// External monitor id, present only when notifications are configured.
    #[serde(default)]
    pub monitor_id: Option<String>,
}
