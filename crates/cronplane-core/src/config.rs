use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Wire constants shared by the worker and the trigger endpoint.
pub const DEFAULT_ADDR: &str = ":8000";
pub const DEFAULT_CRON_NAME_PREFIX: &str = "cron--";
/// Queue messages with any other detail-type are acked and dropped.
pub const TASK_STATE_CHANGE_DETAIL_TYPE: &str = "ECS Task State Change";
/// Reserved name of the sidecar container that enforces the cron timeout.
pub const TIMEOUT_SIDECAR_CONTAINER: &str = "timeout";
/// Exit code the timeout sidecar reports when it killed the user container.
pub const TIMEOUT_SIDECAR_EXIT_CODE: i64 = 201;
/// Default cron timeout when the description leaves it unset (24 h).
pub const DEFAULT_TIMEOUT_SECS: u64 = 86_400;
/// Executions are retained for this long after first observation.
pub const EXECUTION_RETENTION_DAYS: i64 = 14;
/// HTTP request deadline, end to end.
pub const HTTP_DEADLINE_SECS: u64 = 10;

/// Top-level config (cronplane.toml + CRONPLANE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CronplaneConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub cronitor: CronitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HTTP listen address, `[host]:port`.
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Graceful-shutdown window in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Leader-lease refresh cadence. The lease TTL is always twice this,
    /// so one missed refresh does not drop the lease.
    #[serde(default = "default_lock_refresh")]
    pub lock_refresh_interval_secs: u64,
    /// Pause between empty queue polls.
    #[serde(default = "default_queue_poll")]
    pub queue_poll_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            lock_refresh_interval_secs: default_lock_refresh(),
            queue_poll_interval_secs: default_queue_poll(),
        }
    }
}

/// Targeting information for the external container platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Prefix stamped on every external resource name so the worker can
    /// tell cronplane containers apart from unrelated tasks on the cluster.
    #[serde(default = "default_cron_name_prefix")]
    pub cron_name_prefix: String,
    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default)]
    pub cluster: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            cron_name_prefix: default_cron_name_prefix(),
            datacenter: None,
            cluster: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Credential-manager inputs. Internals of the secrets backend are out of
/// scope; these two fields are handed to whichever `TokenSource` is wired in.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VaultConfig {
    pub address: Option<String>,
    pub role_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AwsConfig {
    /// Role assumed for issued STS credentials.
    pub iam_role: Option<String>,
}

/// Heartbeat (Cronitor) credentials. Both must be set for the heartbeat
/// listener to be registered; otherwise alerting is disabled.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CronitorConfig {
    pub api_key: Option<String>,
    pub auth_key: Option<String>,
}

fn default_addr() -> String {
    DEFAULT_ADDR.to_string()
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_lock_refresh() -> u64 {
    60
}
fn default_queue_poll() -> u64 {
    1
}
fn default_cron_name_prefix() -> String {
    DEFAULT_CRON_NAME_PREFIX.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cronplane/cronplane.db", home)
}

impl CronplaneConfig {
    /// Load config from a TOML file with CRONPLANE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. CRONPLANE_CONFIG env var
    ///   3. ~/.cronplane/cronplane.toml
    ///
    /// Env overrides use `__` as the section separator, e.g.
    /// `CRONPLANE_WORKER__LOCK_REFRESH_INTERVAL_SECS=30`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("CRONPLANE_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: CronplaneConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CRONPLANE_").split("__"))
            .extract()
            .map_err(|e| crate::error::Error::InvalidInput(format!("config: {e}")))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cronplane/cronplane.toml", home)
}
