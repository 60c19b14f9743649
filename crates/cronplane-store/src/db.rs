use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::watch;
use tracing::{error, info, warn};

use cronplane_core::{Error, Result};

/// Initialise the cron and execution schema in `conn`.
///
/// The layouts mirror the key-value design: `crons` is keyed by name with
/// a secondary index on the rule ARN; `executions` is keyed by
/// `(cron_name, task_id)` with `expires_at` (epoch seconds) driving TTL
/// eviction.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS crons (
            name                 TEXT    NOT NULL PRIMARY KEY,
            description          TEXT    NOT NULL,   -- JSON CronDescription
            rule_name            TEXT    NOT NULL,
            rule_arn             TEXT    NOT NULL,
            task_family          TEXT    NOT NULL,
            latest_task_revision INTEGER NOT NULL,
            monitor_id           TEXT
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_crons_rule_arn ON crons (rule_arn);

        CREATE TABLE IF NOT EXISTS executions (
            cron_name         TEXT    NOT NULL,
            task_id           TEXT    NOT NULL,
            start_time        TEXT,               -- ISO-8601 or NULL
            end_time          TEXT,               -- ISO-8601 or NULL
            user_exit_code    INTEGER,
            timeout_exit_code INTEGER,
            raw_status        TEXT    NOT NULL,
            reason            TEXT,
            version           INTEGER NOT NULL,
            expires_at        INTEGER NOT NULL,   -- epoch seconds
            status            TEXT    NOT NULL,
            PRIMARY KEY (cron_name, task_id)
        ) STRICT;

        -- Efficient eviction: DELETE ... WHERE expires_at <= ?
        CREATE INDEX IF NOT EXISTS idx_executions_expires ON executions (expires_at);
        -- Lookup by task id alone (HTTP execution-status route).
        CREATE INDEX IF NOT EXISTS idx_executions_task ON executions (task_id);
        ",
    )
    .map_err(db_err)?;
    Ok(())
}

/// Map a rusqlite failure onto the shared error kinds. Busy/locked are
/// retryable; everything else is treated as permanent.
pub(crate) fn db_err(e: rusqlite::Error) -> Error {
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

/// Backend TTL facility: periodically evict executions past their expiry.
///
/// This is the only place expired rows are deleted; the store API itself
/// never issues deletes for expiry (reads just filter). Runs until
/// `shutdown` flips to true.
pub async fn run_ttl_sweeper(
    conn: Arc<Mutex<Connection>>,
    every: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("execution TTL sweeper started");
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = chrono::Utc::now().timestamp();
                let swept = {
                    let conn = conn.lock().unwrap();
                    conn.execute("DELETE FROM executions WHERE expires_at <= ?1", [now])
                };
                match swept {
                    Ok(n) if n > 0 => warn!(count = n, "evicted expired executions"),
                    Err(e) => error!("TTL sweep failed: {e}"),
                    _ => {}
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("execution TTL sweeper shutting down");
                    break;
                }
            }
        }
    }
}
