//! SQLite implementation of the Registry trait.
//!
//! This is the persistent backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use qrseal_core::{Item, ScanEvent, Serial, StoredScan};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{FlaggedItem, RecentScan, Registry};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-based registry.
///
/// Thread-safe via an internal Mutex; every call runs on the blocking pool.
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed. The parent directory
    /// is created when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn conversion_error(
    idx: usize,
    ty: Type,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

// Columns: serial, product, batch, mfg, nonce, message, signature, canonical_image_path
fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let mfg: String = row.get("mfg")?;
    let manufacture_date = match mfg.as_str() {
        "" => None,
        text => Some(
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map_err(|e| conversion_error(3, Type::Text, e))?,
        ),
    };
    let path: String = row.get("canonical_image_path")?;

    Ok(Item {
        serial: Serial::new(row.get::<_, String>("serial")?),
        product: row.get("product")?,
        batch: row.get("batch")?,
        manufacture_date,
        nonce: row.get("nonce")?,
        message: row.get("message")?,
        signature: row.get("signature")?,
        canonical_image_path: PathBuf::from(path),
    })
}

// Columns: id, serial, ts, device, meta, similarity, visual_flag, phash_distance, orb_ratio
fn row_to_scan(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredScan> {
    let meta: String = row.get("meta")?;
    let meta = serde_json::from_str(&meta).map_err(|e| conversion_error(4, Type::Text, e))?;

    Ok(StoredScan {
        id: row.get("id")?,
        timestamp: row.get("ts")?,
        event: ScanEvent {
            serial: Serial::new(row.get::<_, String>("serial")?),
            device: row.get("device")?,
            meta,
            similarity: row.get("similarity")?,
            visual_tamper: row.get("visual_flag")?,
            phash_distance: row.get("phash_distance")?,
            orb_ratio: row.get("orb_ratio")?,
        },
    })
}

const SCAN_COLUMNS: &str =
    "s.id, s.serial, s.ts, s.device, s.meta, s.similarity, s.visual_flag, s.phash_distance, s.orb_ratio";

#[async_trait]
impl Registry for SqliteRegistry {
    async fn create_item(&self, item: &Item) -> Result<()> {
        let item = item.clone();

        self.run(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO items (
                    serial, product, batch, mfg, nonce, message, signature, canonical_image_path
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item.serial.as_str(),
                    item.product,
                    item.batch,
                    item.manufacture_date
                        .map(|date| date.format(DATE_FORMAT).to_string())
                        .unwrap_or_default(),
                    item.nonce,
                    item.message,
                    item.signature,
                    item.canonical_image_path.to_string_lossy().into_owned(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_item(&self, serial: &Serial) -> Result<Option<Item>> {
        let serial = serial.clone();

        self.run(move |conn| {
            conn.query_row(
                "SELECT serial, product, batch, mfg, nonce, message, signature, canonical_image_path
                 FROM items WHERE serial = ?1",
                params![serial.as_str()],
                row_to_item,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn item_count(&self) -> Result<u64> {
        self.run(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn record_scan(&self, event: &ScanEvent) -> Result<u64> {
        let event = event.clone();

        self.run(move |conn| {
            let meta = serde_json::to_string(&event.meta)
                .map_err(|e| StoreError::InvalidData(format!("scan meta: {}", e)))?;

            // Immediate: take the write lock before reading the clock floor and count.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let last_ts: i64 =
                tx.query_row("SELECT COALESCE(MAX(ts), 0) FROM scans", [], |row| row.get(0))?;
            let ts = now_millis().max(last_ts);

            tx.execute(
                "INSERT INTO scans (
                    serial, ts, device, meta, similarity, visual_flag, phash_distance, orb_ratio
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.serial.as_str(),
                    ts,
                    event.device,
                    meta,
                    event.similarity,
                    event.visual_tamper,
                    event.phash_distance,
                    event.orb_ratio,
                ],
            )?;

            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM scans WHERE serial = ?1",
                params![event.serial.as_str()],
                |row| row.get(0),
            )?;

            tx.commit()?;

            debug!(serial = %event.serial, ts, count, "recorded scan");
            Ok(count as u64)
        })
        .await
    }

    async fn scan_count(&self, serial: &Serial) -> Result<u64> {
        let serial = serial.clone();

        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM scans WHERE serial = ?1",
                params![serial.as_str()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn scans_for(&self, serial: &Serial) -> Result<Vec<StoredScan>> {
        let serial = serial.clone();

        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM scans s WHERE s.serial = ?1 ORDER BY s.id ASC",
                SCAN_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let scans = stmt
                .query_map(params![serial.as_str()], row_to_scan)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(scans)
        })
        .await
    }

    async fn recent_scans(&self, limit: usize) -> Result<Vec<RecentScan>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.run(move |conn| {
            let sql = format!(
                "SELECT {}, i.product, i.batch
                 FROM scans s LEFT JOIN items i ON i.serial = s.serial
                 ORDER BY s.ts DESC, s.id DESC
                 LIMIT ?1",
                SCAN_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![limit], |row| {
                    Ok(RecentScan {
                        scan: row_to_scan(row)?,
                        product: row.get("product")?,
                        batch: row.get("batch")?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn flagged_items(&self, threshold: u64) -> Result<Vec<FlaggedItem>> {
        let threshold = i64::try_from(threshold).unwrap_or(i64::MAX);

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT s.serial AS serial, COUNT(*) AS scan_count, MAX(s.ts) AS last_scan,
                        i.product AS product, i.batch AS batch
                 FROM scans s LEFT JOIN items i ON i.serial = s.serial
                 GROUP BY s.serial
                 HAVING COUNT(*) > ?1
                 ORDER BY scan_count DESC, serial ASC",
            )?;
            let rows = stmt
                .query_map(params![threshold], |row| {
                    Ok(FlaggedItem {
                        serial: Serial::new(row.get::<_, String>("serial")?),
                        scan_count: row.get::<_, i64>("scan_count")? as u64,
                        last_scan: row.get("last_scan")?,
                        product: row.get("product")?,
                        batch: row.get("batch")?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn clear_scans(&self) -> Result<u64> {
        self.run(|conn| {
            let removed = conn.execute("DELETE FROM scans", [])?;
            Ok(removed as u64)
        })
        .await
    }
}
