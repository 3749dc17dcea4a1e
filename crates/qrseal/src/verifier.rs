//! The verification orchestrator.
//!
//! A verification moves through these stages, stopping at the first failure:
//!
//! ```text
//! Received -> Decoded -> SignatureChecked -> SerialResolved
//!          -> (ImageCompared) -> Recorded -> Responded
//! ```
//!
//! - Malformed wire string or payload: `bad_qr`
//! - Signature mismatch: `invalid_signature`; broken key material: `verify_error`
//! - Serial never issued: `unknown_serial`, and no scan is recorded
//! - Registry failure: `server_error`
//!
//! A scan is recorded only once the comparison step (if any) has finished.
//! Visual failures never abort a verification; they fail closed to tampered.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use qrseal_core::{decode_with_message, Item, ScanEvent, VerifyKey};
use qrseal_store::Registry;
use qrseal_vision::{ImagePrimitives, VisualAssessment, VisualComparator};

use crate::config::VerifierConfig;
use crate::error::{Result, VerificationError};
use crate::request::{ImageInput, VerificationRequest, VerificationResponse};

/// Verifies scanned labels against the registry.
///
/// The verify key and configuration are fixed at construction. Concurrent
/// calls share nothing but the registry.
pub struct Verifier<R, P> {
    registry: Arc<R>,
    comparator: VisualComparator<P>,
    verify_key: VerifyKey,
    config: VerifierConfig,
}

impl<R: Registry, P: ImagePrimitives> Verifier<R, P> {
    pub fn new(registry: Arc<R>, primitives: P, verify_key: VerifyKey, config: VerifierConfig) -> Self {
        Self {
            registry,
            comparator: VisualComparator::new(primitives, config.thresholds),
            verify_key,
            config,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn verify_key(&self) -> &VerifyKey {
        &self.verify_key
    }

    /// Verify a scan. Every failure becomes a response with an error code.
    pub async fn verify(&self, request: VerificationRequest) -> VerificationResponse {
        match self.try_verify(request).await {
            Ok(response) => response,
            Err(err) => {
                match &err {
                    VerificationError::BadQr(reason) => debug!(%reason, "rejected malformed label"),
                    VerificationError::InvalidSignature => warn!("rejected label: invalid signature"),
                    VerificationError::Verify(reason) => {
                        warn!(%reason, "signature verification machinery failed")
                    }
                    VerificationError::UnknownSerial(serial) => {
                        info!(serial = %serial, "signed label for unknown serial")
                    }
                    VerificationError::Storage(e) => error!(error = %e, "registry failure during verification"),
                    VerificationError::Internal(reason) => error!(%reason, "internal verification fault"),
                }
                VerificationResponse::failure(&err)
            }
        }
    }

    /// Verify a scan, returning the terminal failure as an error.
    pub async fn try_verify(&self, request: VerificationRequest) -> Result<VerificationResponse> {
        let VerificationRequest {
            qr,
            device,
            meta,
            image,
        } = request;

        let (payload, message) = decode_with_message(&qr, &self.verify_key)?;
        let serial = payload.serial.clone();
        let raw_payload: serde_json::Value = serde_json::from_slice(&message)
            .map_err(|e| VerificationError::BadQr(format!("payload parse error: {}", e)))?;

        let item = self
            .registry
            .find_item(&serial)
            .await?
            .ok_or_else(|| VerificationError::UnknownSerial(serial.clone()))?;

        let assessment = match image {
            Some(image) => Some(self.assess(&item, image).await),
            None => None,
        };

        let event = match &assessment {
            Some(a) => ScanEvent {
                serial: serial.clone(),
                device,
                meta,
                similarity: a.similarity(),
                visual_tamper: a.tampered(),
                phash_distance: a.phash_distance(),
                orb_ratio: a.orb_ratio(),
            },
            None => ScanEvent::without_image(serial.clone(), device, meta),
        };

        let scans = self.registry.record_scan(&event).await?;
        let flagged = scans > self.config.scan_flag_threshold;

        info!(
            serial = %serial,
            scans,
            flagged,
            visual_tamper = event.visual_tamper,
            similarity = event.similarity,
            "verified label"
        );

        let mut response = VerificationResponse::accepted(payload, raw_payload, scans, flagged);
        if let Some(a) = assessment {
            response.visual_tamper = Some(a.tampered());
            response.similarity = Some(a.similarity());
            response.phash_distance = a.phash_distance();
            response.orb_ratio = a.orb_ratio();
            response.visual_rule = a.comparison().map(|_| {
                a.rule()
                    .map(|r| r.as_str())
                    .unwrap_or("none")
                    .to_string()
            });
            response.visual_detail = a.failure().map(|e| e.to_string());
        }
        Ok(response)
    }

    async fn assess(&self, item: &Item, image: ImageInput) -> VisualAssessment {
        match image.into_bytes() {
            Ok(bytes) => {
                self.comparator
                    .assess_async(item.canonical_image_path.clone(), bytes)
                    .await
            }
            Err(e) => {
                warn!(serial = %item.serial, error = %e, "uploaded image unreadable, failing closed");
                VisualAssessment::FailedClosed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use qrseal_core::{encode, Keypair, Payload, Serial, StoredScan};
    use qrseal_store::{FlaggedItem, MemoryRegistry, RecentScan, StoreError};
    use qrseal_vision::StandardPrimitives;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn item_for(payload: &Payload, keypair: &Keypair) -> Item {
        let label = qrseal_core::sign_payload(payload, keypair).unwrap();
        Item::from_label(payload, &label, "does/not/exist.png")
    }

    struct Setup {
        keypair: Keypair,
        registry: Arc<MemoryRegistry>,
        verifier: Verifier<MemoryRegistry, StandardPrimitives>,
    }

    async fn setup(threshold: u64) -> Setup {
        let keypair = Keypair::from_seed(&[7; 32]);
        let registry = Arc::new(MemoryRegistry::new());
        let config = VerifierConfig {
            scan_flag_threshold: threshold,
            ..VerifierConfig::default()
        };
        let verifier = Verifier::new(
            registry.clone(),
            StandardPrimitives::new(),
            keypair.verify_key(),
            config,
        );
        Setup {
            keypair,
            registry,
            verifier,
        }
    }

    async fn issue(setup: &Setup, serial: &str) -> String {
        let payload = Payload::new("Widget", serial, "B1", date(), "nonce");
        setup
            .registry
            .create_item(&item_for(&payload, &setup.keypair))
            .await
            .unwrap();
        encode(&payload, &setup.keypair).unwrap()
    }

    #[tokio::test]
    async fn test_genuine_without_image() {
        let s = setup(10).await;
        let wire = issue(&s, "SER001").await;

        let resp = s.verifier.verify(VerificationRequest::new(wire)).await;

        assert!(resp.ok);
        assert_eq!(resp.serial, Some(Serial::from("SER001")));
        assert_eq!(resp.scans, Some(1));
        assert_eq!(resp.flagged, Some(false));
        assert_eq!(resp.visual_tamper, Some(false));
        assert_eq!(resp.similarity, Some(1.0));
        assert_eq!(resp.phash_distance, None);
        assert_eq!(resp.payload.unwrap().product, "Widget");

        let scans = s.registry.scans_for(&Serial::from("SER001")).await.unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].event.device, "unknown");
    }

    /// Sign arbitrary JSON and register the serial it names.
    async fn issue_raw(setup: &Setup, message: &[u8]) -> String {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;

        let label = qrseal_core::SignedLabel {
            message: URL_SAFE_NO_PAD.encode(message),
            signature: URL_SAFE_NO_PAD.encode(setup.keypair.sign(message)),
        };
        let payload = Payload::from_slice(message).unwrap();
        setup
            .registry
            .create_item(&Item::from_label(&payload, &label, "does/not/exist.png"))
            .await
            .unwrap();
        label.wire()
    }

    #[tokio::test]
    async fn test_label_without_date_verifies_and_records() {
        let s = setup(10).await;
        let wire = issue_raw(&s, br#"{"v":1,"p":"Widget","s":"SN-1","b":"B1","r":"abc"}"#).await;

        let resp = s.verifier.verify(VerificationRequest::new(wire)).await;

        assert!(resp.ok, "{:?}", resp);
        assert_eq!(resp.serial, Some(Serial::from("SN-1")));
        assert_eq!(resp.scans, Some(1));
        assert_eq!(resp.payload.unwrap().manufacture_date, None);
        assert_eq!(s.registry.scan_count(&Serial::from("SN-1")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_extra_signed_fields_reach_response() {
        let s = setup(10).await;
        let wire = issue_raw(
            &s,
            br#"{"v":1,"p":"Widget","s":"SN-2","b":"B1","m":"2024-01-15","r":"abc","color":"red"}"#,
        )
        .await;

        let resp = s.verifier.verify(VerificationRequest::new(wire)).await;

        assert!(resp.ok);
        let raw = resp.raw_payload.clone().unwrap();
        assert_eq!(raw["color"], json!("red"));
        assert_eq!(raw["s"], json!("SN-2"));

        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body["raw_payload"]["color"], json!("red"));
        assert!(body["payload"].get("color").is_none());
    }

    #[tokio::test]
    async fn test_device_and_meta_recorded() {
        let s = setup(10).await;
        let wire = issue(&s, "SER001").await;

        s.verifier
            .verify(
                VerificationRequest::new(wire)
                    .with_device("pixel-8")
                    .with_meta(json!({"store": 12})),
            )
            .await;

        let scans = s.registry.scans_for(&Serial::from("SER001")).await.unwrap();
        assert_eq!(scans[0].event.device, "pixel-8");
        assert_eq!(scans[0].event.meta, json!({"store": 12}));
    }

    #[tokio::test]
    async fn test_unknown_serial_records_nothing() {
        let s = setup(10).await;
        let payload = Payload::new("Widget", "GHOST", "B1", date(), "nonce");
        let wire = encode(&payload, &s.keypair).unwrap();

        let resp = s.verifier.verify(VerificationRequest::new(wire)).await;

        assert!(!resp.ok);
        assert_eq!(resp.error, Some(ErrorCode::UnknownSerial));
        assert_eq!(s.registry.scan_count(&Serial::from("GHOST")).await.unwrap(), 0);
        assert!(s.registry.recent_scans(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_qr() {
        let s = setup(10).await;
        for wire in ["", "no-separator", "!!!.???", "e30.AAAA"] {
            let resp = s.verifier.verify(VerificationRequest::new(wire)).await;
            assert!(!resp.ok);
            assert!(
                matches!(resp.error, Some(ErrorCode::BadQr) | Some(ErrorCode::InvalidSignature)),
                "{:?} -> {:?}",
                wire,
                resp.error
            );
        }
        let resp = s.verifier.verify(VerificationRequest::new("no-separator")).await;
        assert_eq!(resp.error, Some(ErrorCode::BadQr));
    }

    #[tokio::test]
    async fn test_wrong_key_is_invalid_signature() {
        let s = setup(10).await;
        let payload = Payload::new("Widget", "SER001", "B1", date(), "nonce");
        s.registry
            .create_item(&item_for(&payload, &s.keypair))
            .await
            .unwrap();
        let forged = encode(&payload, &Keypair::from_seed(&[8; 32])).unwrap();

        let resp = s.verifier.verify(VerificationRequest::new(forged)).await;

        assert_eq!(resp.error, Some(ErrorCode::InvalidSignature));
        assert_eq!(s.registry.scan_count(&Serial::from("SER001")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_key_material_is_verify_error() {
        let keypair = Keypair::from_seed(&[7; 32]);
        let mut bad = [0u8; 32];
        bad[0] = 2;
        let verifier = Verifier::new(
            Arc::new(MemoryRegistry::new()),
            StandardPrimitives::new(),
            VerifyKey::from_bytes(bad),
            VerifierConfig::default(),
        );
        let payload = Payload::new("Widget", "SER001", "B1", date(), "nonce");
        let wire = encode(&payload, &keypair).unwrap();

        let resp = verifier.verify(VerificationRequest::new(wire)).await;
        assert_eq!(resp.error, Some(ErrorCode::VerifyError));
    }

    #[tokio::test]
    async fn test_flag_after_threshold() {
        let s = setup(3).await;
        let wire = issue(&s, "SER001").await;

        for expected in 1..=3u64 {
            let resp = s.verifier.verify(VerificationRequest::new(wire.clone())).await;
            assert_eq!(resp.scans, Some(expected));
            assert_eq!(resp.flagged, Some(false));
        }
        let resp = s.verifier.verify(VerificationRequest::new(wire)).await;
        assert_eq!(resp.scans, Some(4));
        assert_eq!(resp.flagged, Some(true));
    }

    #[tokio::test]
    async fn test_undecodable_image_fails_closed() {
        let s = setup(10).await;
        let wire = issue(&s, "SER001").await;

        let resp = s
            .verifier
            .verify(VerificationRequest::new(wire).with_image(ImageInput::DataUrl("data:image/png;base64,###".into())))
            .await;

        assert!(resp.ok);
        assert_eq!(resp.visual_tamper, Some(true));
        assert_eq!(resp.similarity, Some(0.0));
        assert!(resp.visual_detail.is_some());
        assert_eq!(resp.visual_rule, None);

        let scans = s.registry.scans_for(&Serial::from("SER001")).await.unwrap();
        assert!(scans[0].event.visual_tamper);
        assert_eq!(scans[0].event.similarity, 0.0);
        assert_eq!(scans[0].event.phash_distance, None);
    }

    #[tokio::test]
    async fn test_missing_canonical_fails_closed() {
        let s = setup(10).await;
        let wire = issue(&s, "SER001").await;

        let resp = s
            .verifier
            .verify(VerificationRequest::new(wire).with_image(ImageInput::Raw(vec![0x89, 0x50])))
            .await;

        assert!(resp.ok);
        assert_eq!(resp.visual_tamper, Some(true));
        assert!(resp.visual_detail.unwrap().contains("canonical image"));
    }

    /// Registry whose every operation fails.
    struct BrokenRegistry;

    fn broken<T>() -> qrseal_store::Result<T> {
        Err(StoreError::LockPoisoned("disk on fire".into()))
    }

    #[async_trait]
    impl Registry for BrokenRegistry {
        async fn create_item(&self, _: &Item) -> qrseal_store::Result<()> {
            broken()
        }
        async fn find_item(&self, _: &Serial) -> qrseal_store::Result<Option<Item>> {
            broken()
        }
        async fn item_count(&self) -> qrseal_store::Result<u64> {
            broken()
        }
        async fn record_scan(&self, _: &ScanEvent) -> qrseal_store::Result<u64> {
            broken()
        }
        async fn scan_count(&self, _: &Serial) -> qrseal_store::Result<u64> {
            broken()
        }
        async fn scans_for(&self, _: &Serial) -> qrseal_store::Result<Vec<StoredScan>> {
            broken()
        }
        async fn recent_scans(&self, _: usize) -> qrseal_store::Result<Vec<RecentScan>> {
            broken()
        }
        async fn flagged_items(&self, _: u64) -> qrseal_store::Result<Vec<FlaggedItem>> {
            broken()
        }
        async fn clear_scans(&self) -> qrseal_store::Result<u64> {
            broken()
        }
    }

    #[tokio::test]
    async fn test_storage_failure_is_server_error() {
        let keypair = Keypair::from_seed(&[7; 32]);
        let verifier = Verifier::new(
            Arc::new(BrokenRegistry),
            StandardPrimitives::new(),
            keypair.verify_key(),
            VerifierConfig::default(),
        );
        let wire = encode(&Payload::new("W", "SER001", "B1", date(), "n"), &keypair).unwrap();

        let resp = verifier.verify(VerificationRequest::new(wire)).await;

        assert!(!resp.ok);
        assert_eq!(resp.error, Some(ErrorCode::ServerError));
        assert!(resp.detail.unwrap().contains("disk on fire"));
    }
}
