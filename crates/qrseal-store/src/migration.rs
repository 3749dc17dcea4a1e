//! Registry schema versions.
//!
//! Version N is applied on top of N-1 and logged in `schema_migrations`.
//! Pending versions run together in one transaction, so a database is never
//! left half-upgraded.

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = 2;

/// Bring `conn` up to [`CURRENT_VERSION`]. A no-op on an up-to-date database.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let from = current_version(conn)?;
    if from >= CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for version in from + 1..=CURRENT_VERSION {
        match version {
            1 => apply_v1(&tx)?,
            2 => apply_v2(&tx)?,
            other => {
                return Err(StoreError::Migration(format!(
                    "no migration for schema version {}",
                    other
                )))
            }
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, now_millis()],
        )?;
        info!(version, "applied registry migration");
    }
    tx.commit()?;

    Ok(())
}

/// The highest applied migration version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// v1: items and scans.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Issued labels, one row per serial
        CREATE TABLE IF NOT EXISTS items (
            serial TEXT PRIMARY KEY,
            product TEXT NOT NULL,
            batch TEXT NOT NULL,
            mfg TEXT NOT NULL,                 -- YYYY-MM-DD, empty when absent
            nonce TEXT NOT NULL,               -- base64url
            message TEXT NOT NULL,             -- base64url canonical payload, as printed
            signature TEXT NOT NULL,           -- base64url signature, as printed
            canonical_image_path TEXT NOT NULL
        );

        -- Append-only scan history
        CREATE TABLE IF NOT EXISTS scans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            serial TEXT NOT NULL,
            ts INTEGER NOT NULL,               -- registry clock (Unix ms)
            device TEXT NOT NULL,
            meta TEXT NOT NULL,                -- JSON
            similarity REAL NOT NULL,
            visual_flag INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_scans_serial ON scans(serial);
        CREATE INDEX IF NOT EXISTS idx_scans_ts ON scans(ts);
        "#,
    )?;

    Ok(())
}

/// v2: per-scan visual signals.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        ALTER TABLE scans ADD COLUMN phash_distance INTEGER;   -- NULL when no image
        ALTER TABLE scans ADD COLUMN orb_ratio REAL;           -- NULL when no image
        "#,
    )?;

    Ok(())
}

/// Registry clock, Unix milliseconds. A clock before the epoch reads as 0.
pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
