//! Strong type definitions for QRSeal.
//!
//! The serial is a newtype so it cannot be confused with the other free-text
//! fields of a label.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::codec::SignedLabel;
use crate::payload::Payload;

/// The unique identifier of one physical labeled item.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Serial(pub String);

impl Serial {
    /// Create a serial from any string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the serial is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serial({})", self.0)
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Serial {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Serial {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Serial {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One issued physical label.
///
/// The signed fields (`message`, `signature`) are the exact wire halves that
/// were printed. Re-issuing a serial replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub serial: Serial,
    pub product: String,
    pub batch: String,
    pub manufacture_date: Option<NaiveDate>,
    pub nonce: String,
    /// Base64url canonical payload, as printed.
    pub message: String,
    /// Base64url signature, as printed.
    pub signature: String,
    /// Ground-truth label image used for visual comparison.
    pub canonical_image_path: PathBuf,
}

impl Item {
    /// Build the registry record for a freshly signed label.
    pub fn from_label(
        payload: &Payload,
        label: &SignedLabel,
        canonical_image_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            serial: payload.serial.clone(),
            product: payload.product.clone(),
            batch: payload.batch.clone(),
            manufacture_date: payload.manufacture_date,
            nonce: payload.nonce.clone(),
            message: label.message.clone(),
            signature: label.signature.clone(),
            canonical_image_path: canonical_image_path.into(),
        }
    }

    /// The stored signed halves.
    pub fn label(&self) -> SignedLabel {
        SignedLabel {
            message: self.message.clone(),
            signature: self.signature.clone(),
        }
    }

    /// The wire string printed on this item's label.
    pub fn wire(&self) -> String {
        self.label().wire()
    }
}

/// A verification attempt that reached a valid signature and known serial.
///
/// The timestamp is not part of the event; the registry assigns it at insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    pub serial: Serial,
    /// Caller-supplied device descriptor.
    pub device: String,
    /// Opaque caller context.
    pub meta: serde_json::Value,
    /// Structural similarity, 1.0 when no image was supplied.
    pub similarity: f64,
    pub visual_tamper: bool,
    /// None when no image was compared.
    pub phash_distance: Option<u32>,
    /// None when no image was compared.
    pub orb_ratio: Option<f64>,
}

impl ScanEvent {
    /// A scan without an image: full similarity, no tamper, no signals.
    pub fn without_image(serial: Serial, device: impl Into<String>, meta: serde_json::Value) -> Self {
        Self {
            serial,
            device: device.into(),
            meta,
            similarity: 1.0,
            visual_tamper: false,
            phash_distance: None,
            orb_ratio: None,
        }
    }
}

/// A scan event as persisted, with its registry-assigned identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredScan {
    /// Insertion-ordered row id.
    pub id: i64,
    /// Server clock at insert (Unix ms), non-decreasing in `id` order.
    pub timestamp: i64,
    pub event: ScanEvent,
}
