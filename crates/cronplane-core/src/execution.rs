use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{EXECUTION_RETENTION_DAYS, TIMEOUT_SIDECAR_EXIT_CODE};
use crate::task::{Task, RAW_STATUS_PENDING, RAW_STATUS_RUNNING, RAW_STATUS_STOPPED};

/// Final or in-flight outcome of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Success,
    Failed,
    Timeout,
    Unknown,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Timeout => "TIMEOUT",
            ExecutionStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ExecutionStatus::Pending),
            "RUNNING" => Ok(ExecutionStatus::Running),
            "SUCCESS" => Ok(ExecutionStatus::Success),
            "FAILED" => Ok(ExecutionStatus::Failed),
            "TIMEOUT" => Ok(ExecutionStatus::Timeout),
            "UNKNOWN" => Ok(ExecutionStatus::Unknown),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// Classify a task snapshot into an execution outcome.
///
/// This is the single place where outcome is decided; it is pure and
/// total. Order matters on the STOPPED branch: the timeout-sidecar check
/// precedes any user-exit-code check, so a task whose sidecar reports
/// exit 201 is TIMEOUT even when the user container itself exited 0.
pub fn classify(
    raw_status: &str,
    user_exit_code: Option<i64>,
    timeout_exit_code: Option<i64>,
) -> ExecutionStatus {
    if raw_status != RAW_STATUS_STOPPED {
        return match raw_status {
            RAW_STATUS_PENDING => ExecutionStatus::Pending,
            RAW_STATUS_RUNNING => ExecutionStatus::Running,
            _ => ExecutionStatus::Unknown,
        };
    }
    if timeout_exit_code == Some(TIMEOUT_SIDECAR_EXIT_CODE) {
        return ExecutionStatus::Timeout;
    }
    match user_exit_code {
        None => ExecutionStatus::Unknown,
        Some(0) => ExecutionStatus::Success,
        Some(_) => ExecutionStatus::Failed,
    }
}

/// A status counts as running until a terminal outcome is reached.
pub fn is_running(status: ExecutionStatus) -> bool {
    !matches!(
        status,
        ExecutionStatus::Success | ExecutionStatus::Failed | ExecutionStatus::Timeout
    )
}

/// One observed run of a cron, keyed `(cron_name, task_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Partition key.
    pub cron_name: String,
    /// Sort key — the platform task id.
    pub task_id: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_exit_code: Option<i64>,
    #[serde(default)]
    pub timeout_exit_code: Option<i64>,
    /// Platform-reported lifecycle state, verbatim.
    pub raw_status: String,
    #[serde(default)]
    pub reason: Option<String>,
    /// Monotonic observation counter supplied by the platform.
    pub version: i64,
    /// Epoch seconds after which the record is eligible for eviction.
    /// Write-once: the store keeps the value of the first observation.
    pub expires_at: i64,
    pub status: ExecutionStatus,
}

impl Execution {
    /// Derive the execution record for a task snapshot.
    ///
    /// `created_at` is the observation time of the *first* write; the
    /// store's conditional upsert preserves the original `expires_at` on
    /// later versions.
    pub fn from_task(cron_name: &str, task: &Task, created_at: DateTime<Utc>) -> Self {
        let user_exit_code = task.user_container().and_then(|c| c.exit_code);
        let timeout_exit_code = task.timeout_exit_code();
        let status = classify(&task.last_status, user_exit_code, timeout_exit_code);
        Self {
            cron_name: cron_name.to_string(),
            task_id: task.task_id.clone(),
            start_time: task.started_at,
            end_time: task.stopped_at,
            user_exit_code,
            timeout_exit_code,
            raw_status: task.last_status.clone(),
            reason: task.stopped_reason.clone(),
            version: task.version,
            expires_at: (created_at + Duration::days(EXECUTION_RETENTION_DAYS)).timestamp(),
            status,
        }
    }
}
