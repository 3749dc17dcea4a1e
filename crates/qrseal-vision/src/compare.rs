//! The fail-closed visual comparator.
//!
//! [`VisualComparator::assess`] never errors: any failure of the primitives,
//! the canonical image, or the upload becomes
//! [`VisualAssessment::FailedClosed`], which reports tampered with similarity
//! 0.0.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::decision::{decide, orb_ratio, Decision, MatchedRule, TamperThresholds, VisualSignals};
use crate::error::{Result, VisionError};
use crate::pipeline::NormalizationPipeline;
use crate::primitives::{ImagePrimitives, PerceptualHash};
use crate::raster::GrayRaster;

/// Signals and verdict for a completed comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub signals: VisualSignals,
    pub decision: Decision,
    pub canonical_hash: PerceptualHash,
    pub uploaded_hash: PerceptualHash,
}

/// Outcome of a visual check.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualAssessment {
    /// Signals were computed and the decision table applied.
    Compared(Comparison),
    /// No signals; treated as tampered.
    FailedClosed(VisionError),
}

impl VisualAssessment {
    pub fn tampered(&self) -> bool {
        match self {
            VisualAssessment::Compared(c) => c.decision.tampered(),
            VisualAssessment::FailedClosed(_) => true,
        }
    }

    /// SSIM score, 0.0 on failure.
    pub fn similarity(&self) -> f64 {
        match self {
            VisualAssessment::Compared(c) => c.signals.ssim,
            VisualAssessment::FailedClosed(_) => 0.0,
        }
    }

    pub fn phash_distance(&self) -> Option<u32> {
        self.comparison().map(|c| c.signals.phash_distance)
    }

    pub fn orb_ratio(&self) -> Option<f64> {
        self.comparison().map(|c| c.signals.orb_ratio)
    }

    pub fn rule(&self) -> Option<MatchedRule> {
        self.comparison().and_then(|c| c.decision.rule)
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        match self {
            VisualAssessment::Compared(c) => Some(c),
            VisualAssessment::FailedClosed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&VisionError> {
        match self {
            VisualAssessment::Compared(_) => None,
            VisualAssessment::FailedClosed(e) => Some(e),
        }
    }
}

/// Compares an uploaded photo against an item's canonical image.
pub struct VisualComparator<P> {
    primitives: Arc<P>,
    pipeline: NormalizationPipeline,
    thresholds: TamperThresholds,
}

impl<P> Clone for VisualComparator<P> {
    fn clone(&self) -> Self {
        Self {
            primitives: self.primitives.clone(),
            pipeline: self.pipeline,
            thresholds: self.thresholds,
        }
    }
}

impl<P: ImagePrimitives> VisualComparator<P> {
    pub fn new(primitives: P, thresholds: TamperThresholds) -> Self {
        Self::with_shared(Arc::new(primitives), thresholds)
    }

    pub fn with_shared(primitives: Arc<P>, thresholds: TamperThresholds) -> Self {
        Self {
            primitives,
            pipeline: NormalizationPipeline::default(),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &TamperThresholds {
        &self.thresholds
    }

    pub fn primitives(&self) -> &P {
        &self.primitives
    }

    /// Compare, propagating the first failure.
    pub fn compare(&self, canonical_path: &Path, uploaded: &[u8]) -> Result<Comparison> {
        let canonical_error = |reason: String| VisionError::CanonicalImage {
            path: canonical_path.display().to_string(),
            reason,
        };

        let canonical_bytes =
            std::fs::read(canonical_path).map_err(|e| canonical_error(e.to_string()))?;
        let canonical = self
            .pipeline
            .normalize_bytes(self.primitives.as_ref(), &canonical_bytes)
            .map_err(|e| canonical_error(e.to_string()))?;
        let uploaded = self
            .pipeline
            .normalize_bytes(self.primitives.as_ref(), uploaded)?;

        self.compare_normalized(&canonical, &uploaded)
    }

    /// Compute signals over two normalized rasters and apply the decision table.
    pub fn compare_normalized(
        &self,
        canonical: &GrayRaster,
        uploaded: &GrayRaster,
    ) -> Result<Comparison> {
        let primitives = self.primitives.as_ref();

        let canonical_hash = primitives.perceptual_hash(canonical)?;
        let uploaded_hash = primitives.perceptual_hash(uploaded)?;
        let ssim = primitives.structural_similarity(canonical, uploaded)?;
        if !ssim.is_finite() {
            return Err(VisionError::Primitive(format!("non-finite SSIM: {}", ssim)));
        }
        let matches = primitives.match_keypoints(canonical, uploaded)?;

        let signals = VisualSignals {
            phash_distance: canonical_hash.distance(&uploaded_hash),
            ssim,
            orb_ratio: orb_ratio(&matches),
        };
        let decision = decide(&signals, &self.thresholds);

        debug!(
            phash_distance = signals.phash_distance,
            ssim = signals.ssim,
            orb_ratio = signals.orb_ratio,
            descriptors_a = matches.descriptors_a,
            descriptors_b = matches.descriptors_b,
            rule = decision.rule.map(|r| r.as_str()).unwrap_or("none"),
            tampered = decision.tampered(),
            "visual comparison"
        );

        Ok(Comparison {
            signals,
            decision,
            canonical_hash,
            uploaded_hash,
        })
    }

    /// Compare, failing closed on any error.
    pub fn assess(&self, canonical_path: &Path, uploaded: &[u8]) -> VisualAssessment {
        match self.compare(canonical_path, uploaded) {
            Ok(comparison) => VisualAssessment::Compared(comparison),
            Err(e) => {
                warn!(error = %e, "visual comparison failed closed");
                VisualAssessment::FailedClosed(e)
            }
        }
    }

    /// [`assess`](Self::assess) on the blocking pool. A panicking primitive
    /// fails closed.
    pub async fn assess_async(&self, canonical_path: PathBuf, uploaded: Vec<u8>) -> VisualAssessment {
        let comparator = self.clone();
        let task =
            tokio::task::spawn_blocking(move || comparator.assess(&canonical_path, &uploaded));

        match task.await {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(error = %e, "visual comparison worker failed");
                VisualAssessment::FailedClosed(VisionError::Worker(e.to_string()))
            }
        }
    }
}
