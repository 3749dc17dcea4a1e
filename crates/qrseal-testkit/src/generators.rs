//! Proptest generators for property-based testing.

use chrono::NaiveDate;
use proptest::prelude::*;

use qrseal_core::{encode, CodecError, Keypair, Payload, Serial};

/// Characters of the base64url alphabet.
pub const BASE64URL_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a non-empty serial.
pub fn serial() -> impl Strategy<Value = Serial> {
    "[A-Z0-9][A-Za-z0-9-]{0,23}".prop_map(Serial::from)
}

/// Generate a product name, including non-ASCII and JSON-special characters.
pub fn product() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z][A-Za-z0-9 ]{0,31}",
        "\\PC{0,24}",
        Just("Quote \" and \\ backslash".to_string()),
    ]
}

pub fn batch() -> impl Strategy<Value = String> {
    "[A-Z0-9-]{0,12}".prop_map(String::from)
}

/// Generate a date between 2000-01-01 and roughly 2099.
pub fn manufacture_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..36_500).prop_map(|days| {
        NaiveDate::from_ymd_opt(2000, 1, 1)
            .and_then(|base| base.checked_add_signed(chrono::Duration::days(days)))
            .unwrap_or_default()
    })
}

/// Generate a 22-character base64url nonce.
pub fn nonce() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{22}".prop_map(String::from)
}

/// Generate a payload.
pub fn payload() -> impl Strategy<Value = Payload> {
    (product(), serial(), batch(), manufacture_date(), nonce())
        .prop_map(|(p, s, b, m, r)| Payload::new(p, s, b, m, r))
}

/// Parameters for generating a signed label.
#[derive(Debug, Clone)]
pub struct LabelParams {
    pub keypair: Keypair,
    pub payload: Payload,
}

impl Arbitrary for LabelParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<[u8; 32]>(), payload())
            .prop_map(|(seed, payload)| LabelParams {
                keypair: Keypair::from_seed(&seed),
                payload,
            })
            .boxed()
    }
}

/// Encode the label described by `params`.
pub fn wire_from_params(params: &LabelParams) -> Result<String, CodecError> {
    encode(&params.payload, &params.keypair)
}

/// Replace the character at `index` with a different base64url character.
///
/// The separator is never touched; `index` wraps over the other positions.
pub fn substitute_char(wire: &str, index: usize, replacement: u8) -> String {
    let bytes = wire.as_bytes();
    let positions: Vec<usize> = (0..bytes.len()).filter(|&i| bytes[i] != b'.').collect();
    if positions.is_empty() {
        return wire.to_string();
    }
    let at = positions[index % positions.len()];

    let mut pick = BASE64URL_ALPHABET[replacement as usize % BASE64URL_ALPHABET.len()];
    if pick == bytes[at] {
        pick = BASE64URL_ALPHABET[(replacement as usize + 1) % BASE64URL_ALPHABET.len()];
    }

    let mut out = bytes.to_vec();
    out[at] = pick;
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrseal_core::decode;

    proptest! {
        #[test]
        fn test_encode_decode_identity(params: LabelParams) {
            let wire = wire_from_params(&params).unwrap();
            let decoded = decode(&wire, &params.keypair.verify_key()).unwrap();
            prop_assert_eq!(decoded, params.payload);
        }

        #[test]
        fn test_wire_deterministic(params: LabelParams) {
            prop_assert_eq!(
                wire_from_params(&params).unwrap(),
                wire_from_params(&params).unwrap()
            );
        }

        #[test]
        fn test_any_substitution_rejected(
            params: LabelParams,
            index in any::<usize>(),
            replacement in any::<u8>(),
        ) {
            let wire = wire_from_params(&params).unwrap();
            let tampered = substitute_char(&wire, index, replacement);
            prop_assert_ne!(&tampered, &wire);
            prop_assert!(decode(&tampered, &params.keypair.verify_key()).is_err());
        }

        #[test]
        fn test_other_key_rejected(params: LabelParams, other in keypair()) {
            prop_assume!(other.seed() != params.keypair.seed());
            let wire = wire_from_params(&params).unwrap();
            prop_assert!(decode(&wire, &other.verify_key()).is_err());
        }
    }

    #[test]
    fn test_substitute_skips_separator() {
        let out = substitute_char("AB.CD", 2, 0);
        assert_eq!(out, "AB.AD");
    }
}
