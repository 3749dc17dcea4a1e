//! # QRSeal Store
//!
//! The registry of issued items and their scan history. Provides a
//! trait-based interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The registry is the single writer and the single source of truth for
//! per-serial scan counts. [`SqliteRegistry`] is the persistent backend;
//! [`MemoryRegistry`] has the same semantics for tests.
//!
//! ## Key Types
//!
//! - [`Registry`] - The async trait for all registry operations
//! - [`SqliteRegistry`] - SQLite-based persistent registry
//! - [`MemoryRegistry`] - In-memory registry for tests
//! - [`RecentScan`] / [`FlaggedItem`] - Reporting rows
//!
//! ## Usage
//!
//! ```rust,no_run
//! use qrseal_store::{Registry, SqliteRegistry};
//! use qrseal_core::{ScanEvent, Serial};
//!
//! async fn example() {
//!     let registry = SqliteRegistry::open("db/qr_registry.db").unwrap();
//!
//!     let serial = Serial::from("SER001");
//!     if registry.find_item(&serial).await.unwrap().is_some() {
//!         let event = ScanEvent::without_image(serial, "phone", serde_json::json!({}));
//!         let count = registry.record_scan(&event).await.unwrap();
//!         println!("scanned {} times", count);
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Upsert items**: creating an existing serial replaces the whole row
//! - **Atomic counting**: `record_scan` inserts and counts in one unit of
//!   work, so concurrent scans never lose an increment
//! - **Server timestamps**: the registry stamps each scan, non-decreasing in
//!   insertion order

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryRegistry;
pub use sqlite::SqliteRegistry;
pub use traits::{FlaggedItem, RecentScan, Registry};
