//! # QRSeal
//!
//! Anti-counterfeit verification for signed QR labels.
//!
//! ## Overview
//!
//! A manufacturer issues labels whose QR code carries a signed payload
//! (`base64url(json).base64url(ed25519_sig)`). A verifier scanning the label
//! learns three things:
//!
//! - **Authenticity**: the signature verifies and the serial was issued
//! - **Visual integrity**: an optional photo matches the canonical label
//!   image closely enough to rule out a photocopy or reprint
//! - **Circulation**: how often the serial has been scanned, flagged past a
//!   threshold as a possible clone
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use qrseal::{keys, EngineConfig, Verifier, VerificationRequest};
//! use qrseal::store::SqliteRegistry;
//! use qrseal::vision::StandardPrimitives;
//!
//! async fn example() {
//!     let config = EngineConfig::from_env().unwrap();
//!     let registry = Arc::new(SqliteRegistry::open(&config.db_path).unwrap());
//!     let verify_key = keys::load_verify_key(&config).unwrap();
//!
//!     let verifier = Verifier::new(
//!         registry,
//!         StandardPrimitives::new(),
//!         verify_key,
//!         config.verifier(),
//!     );
//!
//!     let response = verifier.verify(VerificationRequest::new("eyJ2Ijox...")).await;
//!     println!("{}", serde_json::to_string(&response).unwrap());
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `qrseal::core` - payloads, keys, the wire codec
//! - `qrseal::store` - the registry trait and backends
//! - `qrseal::vision` - normalization, signals, the decision table

pub mod config;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod request;
pub mod verifier;

// Re-export component crates
pub use qrseal_core as core;
pub use qrseal_store as store;
pub use qrseal_vision as vision;

pub use config::{EngineConfig, VerifierConfig};
pub use error::{ConfigError, ErrorCode, IssueError, VerificationError};
pub use issuer::{IssueRequest, IssuedLabel, Issuer};
pub use request::{ImageInput, VerificationRequest, VerificationResponse};
pub use verifier::Verifier;

pub use qrseal_core::{Item, Keypair, Payload, ScanEvent, Serial, VerifyKey};
pub use qrseal_vision::TamperThresholds;
