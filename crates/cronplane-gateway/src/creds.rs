//! AppRole token source backing the shared credential cache.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;

use cronplane_core::creds::{Credentials, TokenSource};
use cronplane_core::{Error, Result};

const DEFAULT_LEASE_SECS: i64 = 3600;

/// Exchanges a role id for a leased client token. The backend's own
/// renewal machinery is not used; the cache re-issues before expiry.
pub struct VaultTokenSource {
    http: reqwest::Client,
    address: String,
    role_id: String,
}

impl VaultTokenSource {
    pub fn new(address: String, role_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            address,
            role_id,
        }
    }
}

#[async_trait]
impl TokenSource for VaultTokenSource {
    async fn issue(&self) -> Result<Credentials> {
        let url = format!("{}/v1/auth/approle/login", self.address);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "role_id": self.role_id }))
            .send()
            .await
            .map_err(|e| Error::UpstreamTimeout(format!("vault login: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::PermanentBackend(format!(
                "vault login returned {}",
                resp.status()
            )));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::PermanentBackend(format!("vault login body: {e}")))?;
        let token = body["auth"]["client_token"]
            .as_str()
            .ok_or_else(|| Error::PermanentBackend("vault login: no client_token".into()))?
            .to_string();
        let lease_secs = body["auth"]["lease_duration"]
            .as_i64()
            .unwrap_or(DEFAULT_LEASE_SECS);
        Ok(Credentials {
            token,
            expires_at: Utc::now() + Duration::seconds(lease_secs),
        })
    }
}
