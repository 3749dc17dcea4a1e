//! # QRSeal Core
//!
//! Pure primitives for QRSeal: the signed label payload, its canonical JSON
//! form, the `message.signature` wire codec, and the records kept by the
//! registry.
//!
//! This crate contains no I/O, no storage, no image processing.
//!
//! ## Key Types
//!
//! - [`Payload`] - The signed claim printed on a label
//! - [`SignedLabel`] - The two base64url halves of a wire string
//! - [`Keypair`] / [`VerifyKey`] - Ed25519 signing and verification keys
//! - [`Item`] - One issued physical label, as stored by the registry
//! - [`ScanEvent`] - One verification attempt against a known serial
//!
//! ## Wire Format
//!
//! `base64url(canonical_json) + "." + base64url(ed25519_signature)`, padding
//! stripped. The signature covers the raw JSON bytes, so those bytes are never
//! re-serialized on the verification path. See [`codec`].

pub mod codec;
pub mod crypto;
pub mod error;
pub mod payload;
pub mod types;

pub use codec::{decode, decode_with_message, encode, sign_payload, SignedLabel, SEPARATOR};
pub use crypto::{Keypair, VerifyKey, SIGNATURE_LEN};
pub use error::{CodecError, KeyError};
pub use payload::{generate_nonce, Payload, NONCE_LEN, PAYLOAD_VERSION};
pub use types::{Item, ScanEvent, Serial, StoredScan};
