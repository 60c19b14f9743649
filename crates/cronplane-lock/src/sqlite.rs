use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;

use cronplane_core::{Error, Result};

use crate::LockManager;

/// SQLite-backed lease. All three operations run inside one connection
/// lock, so the delete-then-insert takeover of an expired lease is atomic
/// with respect to other local acquirers; across processes the primary-key
/// constraint keeps the insert conditional on absence.
pub struct SqliteLockManager {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLockManager {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

fn expiry_in(ttl: Duration) -> String {
    (Utc::now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(60)))
        .to_rfc3339()
}

fn db_err(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if matches!(
                f.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            Error::TransientBackend(e.to_string())
        }
        _ => Error::PermanentBackend(e.to_string()),
    }
}

#[async_trait]
impl LockManager for SqliteLockManager {
    async fn acquire(&self, name: &str, ttl: Duration) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let expires_at = expiry_in(ttl);
        let conn = self.conn.lock().unwrap();

        // Clear an expired lease first; the insert below is still
        // conditional on absence via the primary key.
        conn.execute(
            "DELETE FROM locks WHERE name = ?1 AND expires_at <= ?2",
            rusqlite::params![name, now],
        )
        .map_err(db_err)?;

        match conn.execute(
            "INSERT INTO locks (name, expires_at) VALUES (?1, ?2)",
            rusqlite::params![name, expires_at],
        ) {
            Ok(_) => {
                debug!(lock = %name, until = %expires_at, "lease acquired");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(f, _))
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::LockTaken)
            }
            Err(e) => Err(db_err(e)),
        }
    }

    async fn refresh(&self, name: &str, ttl: Duration) -> Result<()> {
        let expires_at = expiry_in(ttl);
        let conn = self.conn.lock().unwrap();
        let n = conn
            .execute(
                "UPDATE locks SET expires_at = ?2 WHERE name = ?1",
                rusqlite::params![name, expires_at],
            )
            .map_err(db_err)?;
        if n == 0 {
            return Err(Error::NotFound(format!("lock {name}")));
        }
        Ok(())
    }

    async fn release(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM locks WHERE name = ?1", [name])
            .map_err(db_err)?;
        debug!(lock = %name, "lease released");
        Ok(())
    }
}
