//! Error types for QRSeal Core.

use thiserror::Error;

/// Errors produced while encoding or decoding a signed label.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Malformed wire string: no separator, bad base64, unparseable JSON,
    /// or a payload without a serial.
    #[error("malformed label: {0}")]
    BadQr(String),

    /// The signature does not match the message under the active key.
    #[error("invalid signature")]
    InvalidSignature,

    /// The signature machinery itself failed (e.g. unusable key material).
    #[error("verification failed: {0}")]
    Verify(String),

    /// The payload could not be serialized.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Errors produced while parsing key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid key encoding: {0}")]
    Encoding(String),

    #[error("invalid key length: expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}
