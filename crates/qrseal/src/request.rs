//! Request and response types at the verification boundary.
//!
//! Image inputs are resolved to raw bytes here; nothing past this module
//! sees data URLs or base64.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use qrseal_core::{Payload, Serial};
use qrseal_vision::VisionError;

use crate::error::{ErrorCode, VerificationError};

/// Device name used when the caller does not send one.
pub const UNKNOWN_DEVICE: &str = "unknown";

const IMAGE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// An uploaded label photo.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Encoded image bytes, e.g. from a multipart upload.
    Raw(Vec<u8>),
    /// A `data:image/...;base64,` URL or bare base64 text.
    DataUrl(String),
}

impl ImageInput {
    /// Resolve to encoded image bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>, VisionError> {
        match self {
            ImageInput::Raw(bytes) => Ok(bytes),
            ImageInput::DataUrl(text) => {
                let body = match text.strip_prefix("data:") {
                    Some(rest) => rest
                        .split_once(',')
                        .map(|(_, body)| body)
                        .ok_or_else(|| VisionError::Decode("data URL without payload".into()))?,
                    None => text.as_str(),
                };
                let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                IMAGE_ENGINE
                    .decode(compact)
                    .map_err(|e| VisionError::Decode(format!("image base64: {}", e)))
            }
        }
    }
}

impl std::fmt::Debug for ImageInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageInput::Raw(b) => write!(f, "Raw({} bytes)", b.len()),
            ImageInput::DataUrl(s) => write!(f, "DataUrl({} chars)", s.len()),
        }
    }
}

/// One verification attempt.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireRequest")]
pub struct VerificationRequest {
    /// The scanned wire string.
    pub qr: String,
    pub device: String,
    /// Opaque caller context, stored with the scan.
    pub meta: Value,
    pub image: Option<ImageInput>,
}

impl VerificationRequest {
    pub fn new(qr: impl Into<String>) -> Self {
        Self {
            qr: qr.into(),
            device: UNKNOWN_DEVICE.to_string(),
            meta: Value::Object(Map::new()),
            image: None,
        }
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.image = Some(image);
        self
    }
}

/// JSON shape of a request.
#[derive(Deserialize)]
struct WireRequest {
    #[serde(default)]
    qr: String,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    meta: Option<Value>,
    #[serde(default)]
    image: Option<WireImage>,
}

/// A JSON image: base64 text (or a data URL), or an array of byte values.
#[derive(Deserialize)]
#[serde(untagged)]
enum WireImage {
    Text(String),
    Bytes(Vec<u8>),
}

impl From<WireImage> for ImageInput {
    fn from(image: WireImage) -> Self {
        match image {
            WireImage::Text(text) => ImageInput::DataUrl(text),
            WireImage::Bytes(bytes) => ImageInput::Raw(bytes),
        }
    }
}

impl From<WireRequest> for VerificationRequest {
    fn from(wire: WireRequest) -> Self {
        let mut meta = match wire.meta {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(meta) => meta,
        };

        // Older clients send the photo as meta.image.
        let image = wire.image.or_else(|| {
            let obj = meta.as_object_mut()?;
            if !matches!(obj.get("image"), Some(Value::String(_))) {
                return None;
            }
            match obj.remove("image") {
                Some(Value::String(s)) => Some(WireImage::Text(s)),
                _ => None,
            }
        });

        Self {
            qr: wire.qr,
            device: wire.device.unwrap_or_else(|| UNKNOWN_DEVICE.to_string()),
            meta,
            image: image.map(ImageInput::from),
        }
    }
}

/// Outcome of a verification, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<Serial>,
    /// Scan count for the serial including this scan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scans: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flagged: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    /// The signed JSON exactly as verified, including fields [`Payload`]
    /// does not model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_tamper: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phash_distance: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orb_ratio: Option<f64>,
    /// Which accepting rule matched, when a comparison ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_rule: Option<String>,
    /// Why a comparison failed closed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl VerificationResponse {
    /// A success response with no visual signals.
    pub(crate) fn accepted(payload: Payload, raw_payload: Value, scans: u64, flagged: bool) -> Self {
        Self {
            ok: true,
            serial: Some(payload.serial.clone()),
            scans: Some(scans),
            flagged: Some(flagged),
            payload: Some(payload),
            raw_payload: Some(raw_payload),
            visual_tamper: Some(false),
            similarity: Some(1.0),
            phash_distance: None,
            orb_ratio: None,
            visual_rule: None,
            visual_detail: None,
            error: None,
            detail: None,
        }
    }

    /// A failure response carrying the error's code and message.
    pub fn failure(err: &VerificationError) -> Self {
        let serial = match err {
            VerificationError::UnknownSerial(serial) => Some(serial.clone()),
            _ => None,
        };
        Self {
            ok: false,
            serial,
            scans: None,
            flagged: None,
            payload: None,
            raw_payload: None,
            visual_tamper: None,
            similarity: None,
            phash_distance: None,
            orb_ratio: None,
            visual_rule: None,
            visual_detail: None,
            error: Some(err.code()),
            detail: Some(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_url_decodes() {
        let input = ImageInput::DataUrl("data:image/png;base64,aGVsbG8=".into());
        assert_eq!(input.into_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_bare_base64_without_padding() {
        let input = ImageInput::DataUrl("aGVsbG8".into());
        assert_eq!(input.into_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let input = ImageInput::DataUrl("data:image/jpeg;base64,aGVs\nbG8=".into());
        assert_eq!(input.into_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_bad_base64_is_decode_error() {
        let input = ImageInput::DataUrl("data:image/png;base64,@@@".into());
        assert!(matches!(input.into_bytes(), Err(VisionError::Decode(_))));
        let input = ImageInput::DataUrl("data:image/png;base64".into());
        assert!(matches!(input.into_bytes(), Err(VisionError::Decode(_))));
    }

    #[test]
    fn test_raw_passes_through() {
        assert_eq!(ImageInput::Raw(vec![1, 2, 3]).into_bytes().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_request_defaults() {
        let req: VerificationRequest = serde_json::from_value(json!({"qr": "a.b"})).unwrap();
        assert_eq!(req, VerificationRequest::new("a.b"));
        assert_eq!(req.device, "unknown");
        assert_eq!(req.meta, json!({}));
        assert!(req.image.is_none());
    }

    #[test]
    fn test_meta_image_is_lifted() {
        let req: VerificationRequest = serde_json::from_value(json!({
            "qr": "a.b",
            "device": "phone",
            "meta": {"image": "data:image/png;base64,aGVsbG8=", "lat": 1}
        }))
        .unwrap();

        assert_eq!(req.device, "phone");
        assert_eq!(req.meta, json!({"lat": 1}));
        assert_eq!(
            req.image,
            Some(ImageInput::DataUrl("data:image/png;base64,aGVsbG8=".into()))
        );
    }

    #[test]
    fn test_top_level_image_wins() {
        let req: VerificationRequest = serde_json::from_value(json!({
            "qr": "a.b",
            "image": "aGVsbG8=",
            "meta": {"image": "b3RoZXI="}
        }))
        .unwrap();

        assert_eq!(req.image, Some(ImageInput::DataUrl("aGVsbG8=".into())));
        assert_eq!(req.meta, json!({"image": "b3RoZXI="}));
    }

    #[test]
    fn test_byte_array_image_is_raw() {
        let req: VerificationRequest = serde_json::from_value(json!({
            "qr": "a.b",
            "image": [137, 80, 78, 71]
        }))
        .unwrap();

        assert_eq!(req.image, Some(ImageInput::Raw(vec![137, 80, 78, 71])));
        assert_eq!(req.image.unwrap().into_bytes().unwrap(), vec![137, 80, 78, 71]);
    }

    #[test]
    fn test_image_of_other_shape_is_rejected() {
        let result = serde_json::from_value::<VerificationRequest>(json!({
            "qr": "a.b",
            "image": [1, 300]
        }));
        assert!(result.is_err());
        let result = serde_json::from_value::<VerificationRequest>(json!({
            "qr": "a.b",
            "image": {"png": true}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_failure_response_shape() {
        let resp = VerificationResponse::failure(&VerificationError::UnknownSerial("X".into()));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["ok"], json!(false));
        assert_eq!(json["error"], json!("unknown_serial"));
        assert_eq!(json["serial"], json!("X"));
        assert!(json.get("scans").is_none());
        assert!(json.get("raw_payload").is_none());
    }
}
