//! Read-mostly credential cache with background refresh.
//!
//! External calls (platform SDK, heartbeat API) need short-lived
//! credentials issued by a secrets backend. The backend itself is out of
//! scope; it plugs in behind [`TokenSource`]. The cache refreshes on a
//! dedicated task `max(30 s, lease/10)` before expiry so readers never
//! block on issuance in steady state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use crate::error::Result;

/// A leased credential and its hard expiry.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credentials {
    /// Instant at which the refresh task should renew: `max(30 s,
    /// lease/10)` before expiry.
    pub fn refresh_at(&self, issued_at: DateTime<Utc>) -> DateTime<Utc> {
        let lease = self.expires_at - issued_at;
        let lead = std::cmp::max(Duration::seconds(30), lease / 10);
        self.expires_at - lead
    }
}

/// Issues credentials. Implementations wrap Vault, STS, or a test stub.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn issue(&self) -> Result<Credentials>;
}

/// Shared cache; cheap to clone handles via `Arc`.
pub struct CredentialCache {
    source: Arc<dyn TokenSource>,
    current: RwLock<Option<Credentials>>,
}

impl CredentialCache {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source,
            current: RwLock::new(None),
        }
    }

    /// Current credentials, issuing synchronously on first use or after
    /// expiry (the background task normally renews before that happens).
    pub async fn current(&self) -> Result<Credentials> {
        if let Some(creds) = self.current.read().await.as_ref() {
            if creds.expires_at > Utc::now() {
                return Ok(creds.clone());
            }
        }
        let fresh = self.source.issue().await?;
        *self.current.write().await = Some(fresh.clone());
        Ok(fresh)
    }

    /// Background refresh loop. Exits when `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("credential refresh task started");
        loop {
            let sleep_for = match self.current().await {
                Ok(creds) => {
                    let now = Utc::now();
                    let wake = creds.refresh_at(now);
                    (wake - now).to_std().unwrap_or_default()
                }
                Err(e) => {
                    warn!(error = %e, "credential issuance failed; retrying in 30s");
                    std::time::Duration::from_secs(30)
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {
                    // Force re-issue regardless of remaining lease.
                    match self.source.issue().await {
                        Ok(fresh) => *self.current.write().await = Some(fresh),
                        Err(e) => warn!(error = %e, "credential refresh failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("credential refresh task shutting down");
                        break;
                    }
                }
            }
        }
    }
}
