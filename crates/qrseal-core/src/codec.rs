//! The `message.signature` wire codec.
//!
//! A wire string is `base64url(message) + "." + base64url(signature)` with
//! padding stripped, where `message` is the payload's canonical JSON and
//! `signature` is Ed25519 over those exact bytes. Decoding verifies the
//! signature over the bytes recovered from the wire, never over a
//! re-serialization.

use std::fmt;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::crypto::{Keypair, VerifyKey};
use crate::error::CodecError;
use crate::payload::Payload;

/// Separator between the message and signature halves.
pub const SEPARATOR: char = '.';

/// Base64url without padding on encode; padding optional on decode.
pub(crate) const WIRE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The two encoded halves of a wire string, stored verbatim by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedLabel {
    /// Base64url of the canonical payload bytes.
    pub message: String,
    /// Base64url of the Ed25519 signature.
    pub signature: String,
}

impl SignedLabel {
    /// Split a wire string on the first separator.
    pub fn parse(wire: &str) -> Result<Self, CodecError> {
        let (message, signature) = wire
            .split_once(SEPARATOR)
            .ok_or_else(|| CodecError::BadQr("invalid label format: missing separator".into()))?;

        Ok(Self {
            message: message.to_string(),
            signature: signature.to_string(),
        })
    }

    /// The full wire string.
    pub fn wire(&self) -> String {
        format!("{}{}{}", self.message, SEPARATOR, self.signature)
    }

    /// Decode both halves to raw bytes.
    pub fn decode_parts(&self) -> Result<(Vec<u8>, Vec<u8>), CodecError> {
        let message = WIRE_ENGINE
            .decode(&self.message)
            .map_err(|e| CodecError::BadQr(format!("base64 decode error in message: {}", e)))?;
        let signature = WIRE_ENGINE
            .decode(&self.signature)
            .map_err(|e| CodecError::BadQr(format!("base64 decode error in signature: {}", e)))?;
        Ok((message, signature))
    }
}

impl fmt::Display for SignedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.message, SEPARATOR, self.signature)
    }
}

/// Sign a payload, returning both encoded halves.
pub fn sign_payload(payload: &Payload, keypair: &Keypair) -> Result<SignedLabel, CodecError> {
    let message = payload.canonical_bytes()?;
    let signature = keypair.sign(&message);

    Ok(SignedLabel {
        message: WIRE_ENGINE.encode(&message),
        signature: WIRE_ENGINE.encode(signature),
    })
}

/// Sign a payload and return the wire string.
pub fn encode(payload: &Payload, keypair: &Keypair) -> Result<String, CodecError> {
    sign_payload(payload, keypair).map(|label| label.wire())
}

/// Decode and verify a wire string.
///
/// Checks run in a fixed order: separator, base64 of both halves, signature,
/// then payload parsing. A payload is only parsed once its bytes are known to
/// be authentic.
pub fn decode(wire: &str, verify_key: &VerifyKey) -> Result<Payload, CodecError> {
    decode_with_message(wire, verify_key).map(|(payload, _)| payload)
}

/// Like [`decode`], also returning the authenticated message bytes.
///
/// The bytes carry every signed field, including keys [`Payload`] does not
/// model.
pub fn decode_with_message(
    wire: &str,
    verify_key: &VerifyKey,
) -> Result<(Payload, Vec<u8>), CodecError> {
    let label = SignedLabel::parse(wire)?;
    let (message, signature) = label.decode_parts()?;

    verify_key.verify(&message, &signature)?;

    let payload = Payload::from_slice(&message)?;
    Ok((payload, message))
}
