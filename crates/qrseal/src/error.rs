//! Error types for the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use qrseal_core::{CodecError, KeyError, Serial};
use qrseal_store::StoreError;

/// Stable error codes carried in a verification response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadQr,
    InvalidSignature,
    VerifyError,
    UnknownSerial,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadQr => "bad_qr",
            ErrorCode::InvalidSignature => "invalid_signature",
            ErrorCode::VerifyError => "verify_error",
            ErrorCode::UnknownSerial => "unknown_serial",
            ErrorCode::ServerError => "server_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failures of a verification.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Malformed wire string or payload.
    #[error("bad QR: {0}")]
    BadQr(String),

    /// Signature did not verify under the active key.
    #[error("invalid signature")]
    InvalidSignature,

    /// The signature machinery failed.
    #[error("verify error: {0}")]
    Verify(String),

    /// Signed and well-formed, but never issued.
    #[error("unknown serial: {0}")]
    UnknownSerial(Serial),

    /// Registry failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Any other internal fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl VerificationError {
    pub fn code(&self) -> ErrorCode {
        match self {
            VerificationError::BadQr(_) => ErrorCode::BadQr,
            VerificationError::InvalidSignature => ErrorCode::InvalidSignature,
            VerificationError::Verify(_) => ErrorCode::VerifyError,
            VerificationError::UnknownSerial(_) => ErrorCode::UnknownSerial,
            VerificationError::Storage(_) | VerificationError::Internal(_) => {
                ErrorCode::ServerError
            }
        }
    }
}

impl From<CodecError> for VerificationError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::BadQr(msg) => VerificationError::BadQr(msg),
            CodecError::InvalidSignature => VerificationError::InvalidSignature,
            CodecError::Verify(msg) => VerificationError::Verify(msg),
            CodecError::Encoding(msg) => VerificationError::Internal(msg),
        }
    }
}

/// Failures while issuing a label.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("invalid issue request: {0}")]
    InvalidRequest(String),

    #[error("signing failed: {0}")]
    Codec(#[from] CodecError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Configuration and key-loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidVar {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid key material: {0}")]
    Key(#[from] KeyError),
}

/// Result type for verification internals.
pub type Result<T> = std::result::Result<T, VerificationError>;
