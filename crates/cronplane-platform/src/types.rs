use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cronplane_core::types::{Capacity, Logging};

/// Everything the platform needs to register one task-definition revision.
/// Built by the lifecycle service from a validated [`CronDescription`]
/// plus the datacenter/cluster targeting from config.
///
/// [`CronDescription`]: cronplane_core::CronDescription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionSpec {
    pub family: String,
    pub image: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub environment: std::collections::BTreeMap<String, String>,
    pub capacity: Capacity,
    #[serde(default)]
    pub logging: Logging,
    /// Run-time cap enforced by the timeout sidecar, seconds.
    pub timeout_secs: u64,
    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredTaskDefinition {
    pub family: String,
    pub revision: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledRule {
    pub name: String,
    pub arn: String,
}

/// Which captured stream of the user container to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStreamType {
    Stdout,
    Stderr,
}

impl std::str::FromStr for LogStreamType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(LogStreamType::Stdout),
            "stderr" => Ok(LogStreamType::Stderr),
            other => Err(format!("unknown log type: {other} (expected stdout|stderr)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}
