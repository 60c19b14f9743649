use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use cronplane_core::{Cron, CronDescription, Error, Execution, Result, Task};

use crate::db::db_err;
use crate::{CronStore, ExecutionStore};

/// SQLite-backed execution history.
///
/// The monotonic guard is a single conditional upsert: the `DO UPDATE`
/// clause only fires when the incoming version is strictly newer, and
/// `expires_at` is absent from the SET list so the first observation's
/// expiry sticks. Zero changed rows means a late or duplicate delivery
/// lost the race — success, not an error.
pub struct SqliteExecutionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExecutionStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

const EXECUTION_COLUMNS: &str = "cron_name, task_id, start_time, end_time, user_exit_code, \
     timeout_exit_code, raw_status, reason, version, expires_at, status";

fn row_to_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<Execution> {
    let start_time: Option<String> = row.get(2)?;
    let end_time: Option<String> = row.get(3)?;
    let status: String = row.get(10)?;
    Ok(Execution {
        cron_name: row.get(0)?,
        task_id: row.get(1)?,
        start_time: start_time.and_then(parse_rfc3339),
        end_time: end_time.and_then(parse_rfc3339),
        user_exit_code: row.get(4)?,
        timeout_exit_code: row.get(5)?,
        raw_status: row.get(6)?,
        reason: row.get(7)?,
        version: row.get(8)?,
        expires_at: row.get(9)?,
        status: status.parse().unwrap_or(cronplane_core::ExecutionStatus::Unknown),
    })
}

fn parse_rfc3339(s: String) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl ExecutionStore for SqliteExecutionStore {
    async fn update(&self, cron_name: &str, task: &Task) -> Result<()> {
        let exec = Execution::from_task(cron_name, task, Utc::now());
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "INSERT INTO executions (cron_name, task_id, start_time, end_time,
                     user_exit_code, timeout_exit_code, raw_status, reason,
                     version, expires_at, status)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
                 ON CONFLICT (cron_name, task_id) DO UPDATE SET
                     start_time        = excluded.start_time,
                     end_time          = excluded.end_time,
                     user_exit_code    = excluded.user_exit_code,
                     timeout_exit_code = excluded.timeout_exit_code,
                     raw_status        = excluded.raw_status,
                     reason            = excluded.reason,
                     version           = excluded.version,
                     status            = excluded.status
                 WHERE excluded.version > executions.version",
                rusqlite::params![
                    exec.cron_name,
                    exec.task_id,
                    exec.start_time.map(|t| t.to_rfc3339()),
                    exec.end_time.map(|t| t.to_rfc3339()),
                    exec.user_exit_code,
                    exec.timeout_exit_code,
                    exec.raw_status,
                    exec.reason,
                    exec.version,
                    exec.expires_at,
                    exec.status.to_string(),
                ],
            )
            .map_err(db_err)?;
        if changed == 0 {
            debug!(
                cron = %cron_name,
                task_id = %exec.task_id,
                version = exec.version,
                "stale execution version discarded"
            );
        }
        Ok(())
    }

    async fn last_n(&self, cron_name: &str, n: usize) -> Result<Vec<Execution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM executions
                 WHERE cron_name = ?1 AND expires_at > ?2
                 ORDER BY task_id DESC LIMIT ?3"
            ))
            .map_err(db_err)?;
        let mut rows = stmt
            .query_map(
                rusqlite::params![cron_name, Utc::now().timestamp(), n as i64],
                row_to_execution,
            )
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        rows.truncate(n);
        Ok(rows)
    }

    async fn get(&self, cron_name: &str, task_id: &str) -> Result<Option<Execution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM executions
                 WHERE cron_name = ?1 AND task_id = ?2 AND expires_at > ?3"
            ))
            .map_err(db_err)?;
        stmt.query_row(
            rusqlite::params![cron_name, task_id, Utc::now().timestamp()],
            row_to_execution,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(db_err(other)),
        })
    }

    async fn get_by_task_id(&self, task_id: &str) -> Result<Option<Execution>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM executions
                 WHERE task_id = ?1 AND expires_at > ?2"
            ))
            .map_err(db_err)?;
        stmt.query_row(
            rusqlite::params![task_id, Utc::now().timestamp()],
            row_to_execution,
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(db_err(other)),
        })
    }
}

/// SQLite-backed cron records.
pub struct SqliteCronStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCronStore {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }
}

const CRON_COLUMNS: &str =
    "name, description, rule_name, rule_arn, task_family, latest_task_revision, monitor_id";

fn cron_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Cron> {
    let description_json: String = row.get(1)?;
    let description: CronDescription = serde_json::from_str(&description_json).map_err(|e| {
        rusqlite::Error::InvalidColumnType(
            1,
            format!("description JSON: {e}"),
            rusqlite::types::Type::Text,
        )
    })?;
    Ok(Cron {
        name: row.get(0)?,
        description,
        rule_name: row.get(2)?,
        rule_arn: row.get(3)?,
        task_family: row.get(4)?,
        latest_task_revision: row.get(5)?,
        monitor_id: row.get(6)?,
    })
}

#[async_trait]
impl CronStore for SqliteCronStore {
    async fn put(&self, cron: &Cron) -> Result<()> {
        let description = serde_json::to_string(&cron.description)
            .map_err(|e| Error::Internal(format!("description encode: {e}")))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("INSERT INTO crons ({CRON_COLUMNS}) VALUES (?1,?2,?3,?4,?5,?6,?7)"),
            rusqlite::params![
                cron.name,
                description,
                cron.rule_name,
                cron.rule_arn,
                cron.task_family,
                cron.latest_task_revision,
                cron.monitor_id,
            ],
        )
        .map_err(|e| match &e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::AlreadyExists(format!("cron {}", cron.name))
            }
            _ => db_err(e),
        })?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Cron>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(&format!("SELECT {CRON_COLUMNS} FROM crons WHERE name = ?1"))
            .map_err(db_err)?;
        stmt.query_row([name], cron_from_row)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(db_err(other)),
            })
    }

    async fn find_by_rule_arn(&self, rule_arn: &str) -> Result<Option<Cron>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {CRON_COLUMNS} FROM crons WHERE rule_arn = ?1"
            ))
            .map_err(db_err)?;
        stmt.query_row([rule_arn], cron_from_row)
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(db_err(other)),
            })
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn
            .execute("DELETE FROM crons WHERE name = ?1", [name])
            .map_err(db_err)?;
        if n == 0 {
            return Err(Error::NotFound(format!("cron {name}")));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Cron>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare_cached(&format!("SELECT {CRON_COLUMNS} FROM crons ORDER BY name"))
            .map_err(db_err)?;
        let crons = stmt
            .query_map([], cron_from_row)
            .map_err(db_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err)?;
        Ok(crons)
    }
}
