//! # QRSeal Vision
//!
//! Visual tamper detection: does an uploaded photo of a label match the
//! label's canonical image?
//!
//! ## Overview
//!
//! Both images pass through the same [`NormalizationPipeline`] (grayscale,
//! 512x512, 3x3 Gaussian, CLAHE). Three signals are then computed over the
//! normalized rasters and fed to the ordered decision table in [`decision`]:
//!
//! - perceptual-hash Hamming distance
//! - mean SSIM
//! - ORB ratio: the fraction of cross-checked keypoint matches that are good
//!
//! The signal computations sit behind the [`ImagePrimitives`] trait.
//! [`StandardPrimitives`] is the production backend.
//!
//! ## Failure Policy
//!
//! [`VisualComparator::assess`] fails closed: an unreadable canonical image,
//! an undecodable upload, or a failing primitive yields
//! [`VisualAssessment::FailedClosed`], reported as tampered with similarity
//! 0.0 and the reason attached.

pub mod backend;
pub mod compare;
pub mod decision;
pub mod error;
pub mod pipeline;
pub mod primitives;
pub mod raster;

pub use backend::{StandardPrimitives, MAX_FEATURES, MAX_FEATURE_PIXELS};
pub use compare::{Comparison, VisualAssessment, VisualComparator};
pub use decision::{decide, orb_ratio, Decision, MatchedRule, TamperThresholds, VisualSignals};
pub use error::{Result, VisionError};
pub use pipeline::NormalizationPipeline;
pub use primitives::{DescriptorMatch, ImagePrimitives, KeypointMatches, PerceptualHash};
pub use raster::GrayRaster;
