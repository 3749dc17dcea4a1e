//! In-memory implementation of the Registry trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use qrseal_core::{Item, ScanEvent, Serial, StoredScan};

use crate::error::{Result, StoreError};
use crate::migration::now_millis;
use crate::traits::{FlaggedItem, RecentScan, Registry};

/// In-memory registry.
///
/// All data is lost when the registry is dropped. Thread-safe via RwLock.
pub struct MemoryRegistry {
    inner: RwLock<MemoryRegistryInner>,
}

struct MemoryRegistryInner {
    /// Items keyed by serial.
    items: HashMap<Serial, Item>,

    /// Scan history in insertion order.
    scans: Vec<StoredScan>,

    /// Next scan id; never reused, even after a reset.
    next_id: i64,

    /// Timestamp of the last insert, the floor for the next one.
    last_ts: i64,
}

impl MemoryRegistry {
    /// Create a new empty in-memory registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryRegistryInner {
                items: HashMap::new(),
                scans: Vec::new(),
                next_id: 1,
                last_ts: 0,
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryRegistryInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryRegistryInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistryInner {
    fn count_for(&self, serial: &Serial) -> u64 {
        self.scans.iter().filter(|s| &s.event.serial == serial).count() as u64
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn create_item(&self, item: &Item) -> Result<()> {
        let mut inner = self.write()?;
        inner.items.insert(item.serial.clone(), item.clone());
        Ok(())
    }

    async fn find_item(&self, serial: &Serial) -> Result<Option<Item>> {
        let inner = self.read()?;
        Ok(inner.items.get(serial).cloned())
    }

    async fn item_count(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.items.len() as u64)
    }

    async fn record_scan(&self, event: &ScanEvent) -> Result<u64> {
        let mut inner = self.write()?;

        let timestamp = now_millis().max(inner.last_ts);
        let id = inner.next_id;
        inner.next_id += 1;
        inner.last_ts = timestamp;
        inner.scans.push(StoredScan {
            id,
            timestamp,
            event: event.clone(),
        });

        Ok(inner.count_for(&event.serial))
    }

    async fn scan_count(&self, serial: &Serial) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.count_for(serial))
    }

    async fn scans_for(&self, serial: &Serial) -> Result<Vec<StoredScan>> {
        let inner = self.read()?;
        Ok(inner
            .scans
            .iter()
            .filter(|s| &s.event.serial == serial)
            .cloned()
            .collect())
    }

    async fn recent_scans(&self, limit: usize) -> Result<Vec<RecentScan>> {
        let inner = self.read()?;
        // Insertion order is also timestamp order.
        Ok(inner
            .scans
            .iter()
            .rev()
            .take(limit)
            .map(|scan| {
                let item = inner.items.get(&scan.event.serial);
                RecentScan {
                    scan: scan.clone(),
                    product: item.map(|i| i.product.clone()),
                    batch: item.map(|i| i.batch.clone()),
                }
            })
            .collect())
    }

    async fn flagged_items(&self, threshold: u64) -> Result<Vec<FlaggedItem>> {
        let inner = self.read()?;

        let mut tally: HashMap<&Serial, (u64, i64)> = HashMap::new();
        for scan in &inner.scans {
            let entry = tally.entry(&scan.event.serial).or_insert((0, i64::MIN));
            entry.0 += 1;
            entry.1 = entry.1.max(scan.timestamp);
        }

        let mut flagged: Vec<FlaggedItem> = tally
            .into_iter()
            .filter(|(_, (count, _))| *count > threshold)
            .map(|(serial, (scan_count, last_scan))| {
                let item = inner.items.get(serial);
                FlaggedItem {
                    serial: serial.clone(),
                    scan_count,
                    last_scan,
                    product: item.map(|i| i.product.clone()),
                    batch: item.map(|i| i.batch.clone()),
                }
            })
            .collect();

        flagged.sort_by(|a, b| {
            b.scan_count
                .cmp(&a.scan_count)
                .then_with(|| a.serial.cmp(&b.serial))
        });
        Ok(flagged)
    }

    async fn clear_scans(&self) -> Result<u64> {
        let mut inner = self.write()?;
        let removed = inner.scans.len() as u64;
        inner.scans.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn make_item(serial: &str, product: &str) -> Item {
        Item {
            serial: Serial::from(serial),
            product: product.to_string(),
            batch: "B1".to_string(),
            manufacture_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            nonce: "AAAAAAAAAAAAAAAAAAAAAA".to_string(),
            message: "msg".to_string(),
            signature: "sig".to_string(),
            canonical_image_path: PathBuf::from("canonical.png"),
        }
    }

    fn scan(serial: &str) -> ScanEvent {
        ScanEvent::without_image(Serial::from(serial), "unknown", json!({}))
    }

    #[tokio::test]
    async fn test_memory_registry_basic() {
        let registry = MemoryRegistry::new();
        let item = make_item("SER001", "Widget");

        registry.create_item(&item).await.unwrap();

        assert_eq!(registry.find_item(&item.serial).await.unwrap(), Some(item));
        assert!(registry.find_item(&Serial::from("OTHER")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_registry_upsert() {
        let registry = MemoryRegistry::new();
        registry.create_item(&make_item("SER001", "Widget")).await.unwrap();
        registry.create_item(&make_item("SER001", "Gadget")).await.unwrap();

        assert_eq!(registry.item_count().await.unwrap(), 1);
        let found = registry.find_item(&Serial::from("SER001")).await.unwrap().unwrap();
        assert_eq!(found.product, "Gadget");
    }

    #[tokio::test]
    async fn test_memory_registry_scans() {
        let registry = MemoryRegistry::new();

        assert_eq!(registry.record_scan(&scan("A")).await.unwrap(), 1);
        assert_eq!(registry.record_scan(&scan("B")).await.unwrap(), 1);
        assert_eq!(registry.record_scan(&scan("A")).await.unwrap(), 2);

        let scans = registry.scans_for(&Serial::from("A")).await.unwrap();
        assert_eq!(scans.len(), 2);
        assert!(scans[0].id < scans[1].id);
        assert!(scans[0].timestamp <= scans[1].timestamp);
    }

    #[tokio::test]
    async fn test_memory_registry_reporting() {
        let registry = MemoryRegistry::new();
        registry.create_item(&make_item("A", "Widget")).await.unwrap();
        for _ in 0..3 {
            registry.record_scan(&scan("A")).await.unwrap();
        }
        registry.record_scan(&scan("B")).await.unwrap();

        let recent = registry.recent_scans(10).await.unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].scan.event.serial.as_str(), "B");
        assert_eq!(recent[0].product, None);
        assert_eq!(recent[1].product.as_deref(), Some("Widget"));

        let flagged = registry.flagged_items(1).await.unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].serial.as_str(), "A");
        assert_eq!(flagged[0].scan_count, 3);

        assert_eq!(registry.clear_scans().await.unwrap(), 4);
        assert!(registry.recent_scans(10).await.unwrap().is_empty());
        assert_eq!(registry.record_scan(&scan("A")).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_memory_registry_concurrent_scans() {
        let registry = Arc::new(MemoryRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..25 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.record_scan(&scan("A")).await.unwrap()
            }));
        }

        let mut counts = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=25).collect::<Vec<u64>>());
    }
}
