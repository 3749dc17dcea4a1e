//! Registry trait: the abstract interface for item and scan persistence.
//!
//! This trait keeps the verifier storage-agnostic. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use qrseal_core::{Item, ScanEvent, Serial, StoredScan};

use crate::error::Result;

/// A stored scan joined with the item it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentScan {
    pub scan: StoredScan,
    /// None when the item row has since been removed.
    pub product: Option<String>,
    pub batch: Option<String>,
}

/// A serial whose scan count exceeds the flag threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlaggedItem {
    pub serial: Serial,
    pub scan_count: u64,
    /// Timestamp of the latest scan (Unix ms).
    pub last_scan: i64,
    pub product: Option<String>,
    pub batch: Option<String>,
}

/// The Registry trait: async interface over items and scan history.
///
/// All methods are async so blocking backends can move work off the runtime.
/// For SQLite, `spawn_blocking` is used internally.
///
/// # Design Notes
///
/// - **Upsert**: `create_item` replaces an existing row for the same serial
///   as a unit; there is never a partially updated item.
/// - **Atomic count**: `record_scan` returns the serial's total including the
///   event just inserted, computed inside the same unit of work.
/// - **Append-only scans**: events are never mutated; only `clear_scans`
///   (an explicit admin reset) removes them.
#[async_trait]
pub trait Registry: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Item Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace the item keyed by its serial.
    async fn create_item(&self, item: &Item) -> Result<()>;

    /// Exact-match lookup by serial.
    async fn find_item(&self, serial: &Serial) -> Result<Option<Item>>;

    /// Number of issued items.
    async fn item_count(&self) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Scan Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a scan event and return the serial's scan count including it.
    ///
    /// The registry assigns the timestamp.
    async fn record_scan(&self, event: &ScanEvent) -> Result<u64>;

    /// Current scan count for a serial.
    async fn scan_count(&self, serial: &Serial) -> Result<u64>;

    /// All scans for a serial, in insertion order.
    async fn scans_for(&self, serial: &Serial) -> Result<Vec<StoredScan>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Reporting
    // ─────────────────────────────────────────────────────────────────────────

    /// The newest `limit` scans across all serials, newest first.
    async fn recent_scans(&self, limit: usize) -> Result<Vec<RecentScan>>;

    /// Serials scanned more than `threshold` times, most-scanned first.
    async fn flagged_items(&self, threshold: u64) -> Result<Vec<FlaggedItem>>;

    /// Delete all scan history. Returns the number of events removed.
    async fn clear_scans(&self) -> Result<u64>;
}
