//! Label signing keys.
//!
//! Ed25519 behind two small types: [`Keypair`] on the issuing side and
//! [`VerifyKey`] on the verifying side. Verify keys are held as raw bytes and
//! only parsed into a curve point when a signature is checked, so unusable
//! key material surfaces as [`CodecError::Verify`] rather than at load.

use std::fmt;

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};

use crate::codec::WIRE_ENGINE;
use crate::error::{CodecError, KeyError};

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Public half of the issuer's key, as configured on verifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerifyKey(pub [u8; 32]);

impl VerifyKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Unpadded base64url, the form printed by `gen-keys`.
    pub fn to_base64url(&self) -> String {
        WIRE_ENGINE.encode(self.0)
    }

    /// Parse base64url text, padded or not. Surrounding whitespace is ignored.
    pub fn from_base64url(text: &str) -> Result<Self, KeyError> {
        let raw = WIRE_ENGINE
            .decode(text.trim())
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| KeyError::Length {
            expected: 32,
            got: raw.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Check `signature` over `message`.
    ///
    /// A mismatch or a signature of the wrong length is
    /// [`CodecError::InvalidSignature`]; key bytes off the curve are
    /// [`CodecError::Verify`].
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CodecError> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CodecError::Verify(format!("unusable verify key: {}", e)))?;
        let signature =
            Signature::from_slice(signature).map_err(|_| CodecError::InvalidSignature)?;
        key.verify(message, &signature)
            .map_err(|_| CodecError::InvalidSignature)
    }
}

impl fmt::Debug for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First eight bytes are enough to tell keys apart in logs.
        write!(f, "VerifyKey({})", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 32]> for VerifyKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// The issuer's signing key.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Derive from a 32-byte seed. The same seed always yields the same key.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Derive from seed bytes read off disk.
    pub fn from_seed_slice(seed: &[u8]) -> Result<Self, KeyError> {
        let seed: &[u8; 32] = seed.try_into().map_err(|_| KeyError::Length {
            expected: 32,
            got: seed.len(),
        })?;
        Ok(Self::from_seed(seed))
    }

    pub fn verify_key(&self) -> VerifyKey {
        VerifyKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign `message`, returning the raw signature bytes.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing_key.sign(message).to_bytes()
    }

    /// The secret seed. Handle with care.
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.verify_key()).finish()
    }
}
