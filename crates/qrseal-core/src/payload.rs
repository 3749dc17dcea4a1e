//! The signed label payload and its canonical JSON form.
//!
//! The payload is serialized as compact JSON with single-letter keys in a
//! fixed order (`v`, `p`, `s`, `b`, `m`, `r`). Key order follows struct field
//! order, so the same logical payload always yields the same bytes.
//!
//! **CRITICAL**: key names and order are FROZEN. Changing them breaks every
//! label already printed.

use base64::Engine;
use chrono::NaiveDate;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::codec::WIRE_ENGINE;
use crate::error::CodecError;
use crate::types::Serial;

/// Current payload version.
pub const PAYLOAD_VERSION: u32 = 1;

/// Number of random bytes in a payload nonce.
pub const NONCE_LEN: usize = 16;

fn default_version() -> u32 {
    PAYLOAD_VERSION
}

/// The claim a manufacturer signs for one physical label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Payload format version.
    #[serde(rename = "v", default = "default_version")]
    pub version: u32,
    /// Product name.
    #[serde(rename = "p", default)]
    pub product: String,
    /// Unique serial of the labeled item.
    #[serde(rename = "s", default)]
    pub serial: Serial,
    /// Production batch.
    #[serde(rename = "b", default)]
    pub batch: String,
    /// Manufacture date, `YYYY-MM-DD` on the wire. Labels signed without
    /// one still verify; a present but malformed date does not.
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub manufacture_date: Option<NaiveDate>,
    /// Base64url nonce; keeps payloads distinct across items sharing
    /// product, batch, and date.
    #[serde(rename = "r", default)]
    pub nonce: String,
}

impl Payload {
    /// Build a current-version payload.
    pub fn new(
        product: impl Into<String>,
        serial: impl Into<Serial>,
        batch: impl Into<String>,
        manufacture_date: NaiveDate,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            product: product.into(),
            serial: serial.into(),
            batch: batch.into(),
            manufacture_date: Some(manufacture_date),
            nonce: nonce.into(),
        }
    }

    /// Canonical compact JSON bytes (the bytes that get signed).
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encoding(e.to_string()))
    }

    /// Parse payload bytes recovered from a wire string.
    ///
    /// Fails with [`CodecError::BadQr`] when the JSON is malformed or the
    /// serial is missing or empty.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let payload: Payload = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::BadQr(format!("payload parse error: {}", e)))?;

        if payload.serial.is_empty() {
            return Err(CodecError::BadQr("missing serial in payload".into()));
        }

        Ok(payload)
    }
}

/// Draw a fresh random nonce, base64url-encoded without padding.
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    WIRE_ENGINE.encode(bytes)
}
