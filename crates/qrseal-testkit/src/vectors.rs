//! Golden test vectors for the label wire format.
//!
//! Ed25519 signatures are deterministic, so a fixed seed and payload always
//! produce the same wire string. Any implementation that reads or writes
//! QRSeal labels must reproduce these exactly.

use chrono::NaiveDate;

use qrseal_core::{decode, encode, CodecError, Keypair, Payload, VerifyKey};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    pub product: &'static str,
    pub serial: &'static str,
    pub batch: &'static str,
    /// Manufacture date, `YYYY-MM-DD`.
    pub manufacture_date: &'static str,
    pub nonce: &'static str,
    /// Expected canonical payload JSON.
    pub expected_json: &'static str,
    /// Expected verify key, base64url.
    pub expected_verify_key: &'static str,
    /// Expected wire string.
    pub expected_wire: &'static str,
}

impl GoldenVector {
    pub fn keypair(&self) -> Keypair {
        Keypair::from_seed(&self.seed)
    }

    pub fn verify_key(&self) -> VerifyKey {
        self.keypair().verify_key()
    }

    /// The payload this vector signs.
    pub fn payload(&self) -> Result<Payload, chrono::ParseError> {
        let date = NaiveDate::parse_from_str(self.manufacture_date, "%Y-%m-%d")?;
        Ok(Payload::new(
            self.product,
            self.serial,
            self.batch,
            date,
            self.nonce,
        ))
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "ascii widget, zero nonce",
            seed: [0x42; 32],
            product: "Widget",
            serial: "SER001",
            batch: "B1",
            manufacture_date: "2024-01-15",
            nonce: "AAAAAAAAAAAAAAAAAAAAAA",
            expected_json: r#"{"v":1,"p":"Widget","s":"SER001","b":"B1","m":"2024-01-15","r":"AAAAAAAAAAAAAAAAAAAAAA"}"#,
            expected_verify_key: "IVL40Zt5HSRFMkLhXy6rbLfP-ntqXtMAl5YOBpiB2xI",
            expected_wire: "eyJ2IjoxLCJwIjoiV2lkZ2V0IiwicyI6IlNFUjAwMSIsImIiOiJCMSIsIm0iOiIyMDI0LTAxLTE1IiwiciI6IkFBQUFBQUFBQUFBQUFBQUFBQUFBQUEifQ.p6uf2du-znLcie98B5o4OzWtUk_m5DoZew0KkRbvuq0SM_JLvVyrm1z8nwX9JjkKuWIKvRlgRbO1WroUzcNCDw",
        },
        GoldenVector {
            name: "non-ascii product name",
            seed: [0x01; 32],
            product: "Café Crème",
            serial: "SERGenuine",
            batch: "BATCH-7",
            manufacture_date: "2025-06-30",
            nonce: "q83vEjRWeJq83vEjRWeJqw",
            expected_json: r#"{"v":1,"p":"Café Crème","s":"SERGenuine","b":"BATCH-7","m":"2025-06-30","r":"q83vEjRWeJq83vEjRWeJqw"}"#,
            expected_verify_key: "iojj3XQJ8ZX9UtstPLpdcspnCb8dlBIb83SIAbQPb1w",
            expected_wire: "eyJ2IjoxLCJwIjoiQ2Fmw6kgQ3LDqG1lIiwicyI6IlNFUkdlbnVpbmUiLCJiIjoiQkFUQ0gtNyIsIm0iOiIyMDI1LTA2LTMwIiwiciI6InE4M3ZFalJXZUpxODN2RWpSV2VKcXcifQ.VbYLjrMxwhQMjGiewOlY95bS-Qrmbcy7eKAGUmkBMuEvzMwKPXxSsZbYeEDVcn-FEObHFbc5puQbuOOYOumWBg",
        },
    ]
}

/// Encode the vector's payload under its seed.
pub fn generate_wire_from_vector(vector: &GoldenVector) -> Result<String, CodecError> {
    let payload = vector
        .payload()
        .map_err(|e| CodecError::Encoding(format!("bad vector date: {}", e)))?;
    encode(&payload, &vector.keypair())
}

/// Check every vector in both directions: encoding reproduces the expected
/// wire string, and decoding it yields the expected payload.
///
/// Returns `(name, matches, produced_wire)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let produced = generate_wire_from_vector(v).unwrap_or_default();
            let decoded = decode(v.expected_wire, &v.verify_key()).ok();
            let matches = produced == v.expected_wire
                && v.verify_key().to_base64url() == v.expected_verify_key
                && decoded.is_some()
                && decoded == v.payload().ok();
            (v.name.to_string(), matches, produced)
        })
        .collect()
}
