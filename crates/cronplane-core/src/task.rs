use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TIMEOUT_SIDECAR_CONTAINER;

/// Raw task lifecycle states the platform reports. Anything outside this
/// set is carried through verbatim and classified as UNKNOWN.
pub const RAW_STATUS_PENDING: &str = "PENDING";
pub const RAW_STATUS_RUNNING: &str = "RUNNING";
pub const RAW_STATUS_STOPPED: &str = "STOPPED";

/// One container within a task snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskContainer {
    pub name: String,
    #[serde(default)]
    pub exit_code: Option<i64>,
    #[serde(default)]
    pub last_status: Option<String>,
}

/// A point-in-time snapshot of one platform task invocation, as carried in
/// the `detail` field of a task-state-change event.
///
/// `version` is supplied by the platform and increases with every state
/// observation of the same task; it is the key the execution store's
/// monotonic guard runs on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Platform task identifier (the execution sort key).
    pub task_id: String,
    #[serde(default)]
    pub containers: Vec<TaskContainer>,
    pub last_status: String,
    pub desired_status: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stopped_reason: Option<String>,
    pub version: i64,
}

impl Task {
    /// The user container: the one that is not the reserved timeout
    /// sidecar. Returns `None` when the payload carries no such container
    /// (callers drop the event silently in that case).
    pub fn user_container(&self) -> Option<&TaskContainer> {
        self.containers
            .iter()
            .find(|c| c.name != TIMEOUT_SIDECAR_CONTAINER)
    }

    /// Exit code reported by the timeout sidecar, if it ran and exited.
    pub fn timeout_exit_code(&self) -> Option<i64> {
        self.containers
            .iter()
            .find(|c| c.name == TIMEOUT_SIDECAR_CONTAINER)
            .and_then(|c| c.exit_code)
    }

    /// Cron name for this task: the user-container name with the resource
    /// prefix stripped. `None` when the container is absent or carries a
    /// foreign name — the task then belongs to some other tenant of the
    /// cluster and is not ours to track.
    pub fn cron_name<'a>(&'a self, prefix: &str) -> Option<&'a str> {
        self.user_container()?.name.strip_prefix(prefix)
    }

    /// First observation of a task is always version 1.
    pub fn is_first_observation(&self) -> bool {
        self.version == 1
    }

    /// Both the actual and the desired state are STOPPED: the task is done
    /// and no further state changes will follow.
    pub fn is_settled(&self) -> bool {
        self.last_status == RAW_STATUS_STOPPED && self.desired_status == RAW_STATUS_STOPPED
    }
}
