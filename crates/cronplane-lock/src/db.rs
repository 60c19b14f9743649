use rusqlite::Connection;

use cronplane_core::{Error, Result};

/// Initialise the lock schema in `conn`.
///
/// One row per named lease; `expires_at` is RFC 3339 UTC so the expiry
/// comparison can run on the stored string directly.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS locks (
            name       TEXT NOT NULL PRIMARY KEY,
            expires_at TEXT NOT NULL    -- ISO-8601 UTC
        ) STRICT;
        ",
    )
    .map_err(|e| Error::PermanentBackend(e.to_string()))?;
    Ok(())
}
