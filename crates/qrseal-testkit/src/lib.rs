//! # QRSeal Testkit
//!
//! Testing utilities for QRSeal.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known labels with expected wire strings for cross-platform verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A keypair, registry and scratch directory wired together
//! - **Scripted primitives**: Image primitives that return chosen signals
//! - **Images**: Deterministic label PNGs and their forgeries
//!
//! ## Golden Vectors
//!
//! ```rust
//! use qrseal_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, wire) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, wire);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use qrseal_testkit::generators::{wire_from_params, LabelParams};
//!
//! proptest! {
//!     #[test]
//!     fn wire_is_deterministic(params: LabelParams) {
//!         prop_assert_eq!(wire_from_params(&params)?, wire_from_params(&params)?);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use qrseal_testkit::{ScriptedPrimitives, TestFixture};
//!
//! let fixture = TestFixture::new()?;
//! let issued = fixture.issue_scripted("SER001").await?;
//! let verifier = fixture.verifier(ScriptedPrimitives::genuine());
//! ```

pub mod fixtures;
pub mod generators;
pub mod images;
pub mod scripted;
pub mod vectors;

pub use fixtures::{fixture_date, TestFixture};
pub use generators::{wire_from_params, LabelParams};
pub use scripted::{ScriptedPrimitives, CANONICAL_MARKER, UPLOAD_BYTES};
pub use vectors::{all_vectors, generate_wire_from_vector, verify_all_vectors, GoldenVector};
