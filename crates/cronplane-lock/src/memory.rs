//! In-memory lease — single process only, used by worker tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cronplane_core::{Error, Result};

use crate::LockManager;

#[derive(Default)]
pub struct MemoryLockManager {
    leases: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }
}

fn expiry_in(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(60))
}

#[async_trait]
impl LockManager for MemoryLockManager {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<()> {
        let mut leases = self.leases.lock().unwrap();
        if let Some(expires_at) = leases.get(name) {
            if *expires_at > Utc::now() {
                return Err(Error::LockTaken);
            }
        }
        leases.insert(name.to_string(), expiry_in(ttl));
        Ok(())
    }

    async fn refresh(&self, name: &str, ttl: Duration) -> Result<()> {
        let mut leases = self.leases.lock().unwrap();
        if !leases.contains_key(name) {
            return Err(Error::NotFound(format!("lock {name}")));
        }
        leases.insert(name.to_string(), expiry_in(ttl));
        Ok(())
    }

    async fn release(&self, name: &str) -> Result<()> {
        self.leases.lock().unwrap().remove(name);
        Ok(())
    }
}
