//! Engine configuration.
//!
//! Defaults match a fresh deployment; [`EngineConfig::from_env`] overlays
//! environment overrides.

use std::path::PathBuf;

use qrseal_vision::TamperThresholds;

use crate::error::ConfigError;

pub const ENV_DB_PATH: &str = "QRSEAL_DB_PATH";
pub const ENV_KEY_PATH: &str = "QRSEAL_KEY_PATH";
pub const ENV_PUBLIC_KEY: &str = "PUBLIC_KEY_B64";
pub const ENV_SCAN_FLAG_THRESHOLD: &str = "QRSEAL_SCAN_FLAG_THRESHOLD";

/// Default scans-per-serial before a serial is flagged.
pub const DEFAULT_SCAN_FLAG_THRESHOLD: u64 = 10;

/// Configuration for the whole engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite registry file.
    pub db_path: PathBuf,
    /// Raw 32-byte Ed25519 seed.
    pub key_path: PathBuf,
    /// Base64url verify key; takes precedence over the key file.
    pub public_key_b64: Option<String>,
    /// A serial is flagged once its scan count exceeds this.
    pub scan_flag_threshold: u64,
    /// Visual decision thresholds.
    pub thresholds: TamperThresholds,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("db/qr_registry.db"),
            key_path: PathBuf::from("private_key.pem"),
            public_key_b64: None,
            scan_flag_threshold: DEFAULT_SCAN_FLAG_THRESHOLD,
            thresholds: TamperThresholds::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    ///
    /// Empty values are ignored. A malformed threshold is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(path) = get(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_KEY_PATH) {
            config.key_path = PathBuf::from(path);
        }
        if let Some(key) = get(ENV_PUBLIC_KEY) {
            config.public_key_b64 = Some(key.trim().to_string());
        }
        if let Some(raw) = get(ENV_SCAN_FLAG_THRESHOLD) {
            config.scan_flag_threshold =
                raw.trim()
                    .parse()
                    .map_err(|e: std::num::ParseIntError| ConfigError::InvalidVar {
                        var: ENV_SCAN_FLAG_THRESHOLD,
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
        }

        Ok(config)
    }

    /// The verifier's slice of the configuration.
    pub fn verifier(&self) -> VerifierConfig {
        VerifierConfig {
            scan_flag_threshold: self.scan_flag_threshold,
            thresholds: self.thresholds,
        }
    }
}

/// Settings fixed for a verifier's lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerifierConfig {
    pub scan_flag_threshold: u64,
    pub thresholds: TamperThresholds,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        EngineConfig::default().verifier()
    }
}
