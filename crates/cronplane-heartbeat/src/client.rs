use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use cronplane_core::{Error, Result};

use crate::breaker::CircuitBreaker;
use crate::{HeartbeatApi, MonitorRules};

const DEFAULT_API_BASE: &str = "https://cronitor.io";
const DEFAULT_PING_BASE: &str = "https://cronitor.link";

/// Cronitor-style heartbeat client.
///
/// `api_key` authenticates monitor CRUD; `auth_key` authenticates pings.
/// Both base URLs are overridable so tests and on-prem deployments can
/// point elsewhere.
pub struct CronitorClient {
    http: reqwest::Client,
    breaker: CircuitBreaker,
    api_base: String,
    ping_base: String,
    api_key: String,
    auth_key: String,
}

impl CronitorClient {
    pub fn new(api_key: String, auth_key: String) -> Self {
        Self::with_bases(api_key, auth_key, DEFAULT_API_BASE, DEFAULT_PING_BASE)
    }

    pub fn with_bases(
        api_key: String,
        auth_key: String,
        api_base: impl Into<String>,
        ping_base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            breaker: CircuitBreaker::default(),
            api_base: api_base.into(),
            ping_base: ping_base.into(),
            api_key,
            auth_key,
        }
    }

    fn ping_url(&self, monitor_id: &str, state: &str) -> String {
        format!(
            "{}/ping/{}/{}?state={}",
            self.ping_base, self.auth_key, monitor_id, state
        )
    }

    async fn ping(&self, action: &str, monitor_id: &str, state: &str) -> Result<()> {
        let url = self.ping_url(monitor_id, state);
        self.breaker
            .call(action, async {
                let resp = self.http.get(&url).send().await.map_err(request_err)?;
                check_status(resp.status())
            })
            .await
    }
}

fn request_err(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::UpstreamTimeout(e.to_string())
    } else {
        Error::TransientBackend(e.to_string())
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else if status.is_server_error() {
        Err(Error::TransientBackend(format!("heartbeat API: {status}")))
    } else {
        Err(Error::PermanentBackend(format!("heartbeat API: {status}")))
    }
}

#[async_trait]
impl HeartbeatApi for CronitorClient {
    async fn create_monitor(&self, cron_name: &str, rules: &MonitorRules) -> Result<String> {
        let mut rule_list = Vec::new();
        if let Some(secs) = rules.no_run_threshold {
            rule_list.push(json!({
                "rule_type": "run_ping_not_received",
                "value": secs,
                "time_unit": "seconds",
            }));
        }
        if let Some(secs) = rules.ran_longer_than_threshold {
            rule_list.push(json!({
                "rule_type": "ran_longer_than",
                "value": secs,
                "time_unit": "seconds",
            }));
        }
        let mut notify = Vec::new();
        if let Some(ref key) = rules.pagerduty_key {
            notify.push(json!({"pagerduty": key}));
        }
        if let Some(ref channel) = rules.slack_channel {
            notify.push(json!({"slack": channel}));
        }
        let body = json!({
            "type": "heartbeat",
            "name": cron_name,
            "rules": rule_list,
            "notifications": notify,
        });

        let monitor: Value = self
            .breaker
            .call("create-monitor", async {
                let resp = self
                    .http
                    .post(format!("{}/api/monitors", self.api_base))
                    .basic_auth(&self.api_key, Option::<&str>::None)
                    .json(&body)
                    .send()
                    .await
                    .map_err(request_err)?;
                check_status(resp.status())?;
                resp.json().await.map_err(request_err)
            })
            .await?;

        let monitor_id = monitor
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Internal("monitor response missing key".into()))?
            .to_string();
        info!(cron = %cron_name, monitor_id = %monitor_id, "monitor created");
        Ok(monitor_id)
    }

    async fn delete_monitor(&self, monitor_id: &str) -> Result<()> {
        self.breaker
            .call("delete-monitor", async {
                let resp = self
                    .http
                    .delete(format!("{}/api/monitors/{}", self.api_base, monitor_id))
                    .basic_auth(&self.api_key, Option::<&str>::None)
                    .send()
                    .await
                    .map_err(request_err)?;
                check_status(resp.status())
            })
            .await
    }

    async fn report_run(&self, monitor_id: &str) -> Result<()> {
        self.ping("report-run", monitor_id, "run").await
    }

    async fn report_success(&self, monitor_id: &str) -> Result<()> {
        self.ping("report-success", monitor_id, "complete").await
    }

    async fn report_fail(&self, monitor_id: &str) -> Result<()> {
        self.ping("report-fail", monitor_id, "fail").await
    }
}
