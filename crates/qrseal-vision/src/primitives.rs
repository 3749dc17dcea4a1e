//! The image-primitive seam.
//!
//! The comparator treats every signal as a black box behind
//! [`ImagePrimitives`]. [`crate::StandardPrimitives`] is the production
//! implementation; tests substitute scripted ones to drive the decision
//! table directly.

use std::fmt;

use crate::error::Result;
use crate::raster::GrayRaster;

/// A 64-bit perceptual fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PerceptualHash(pub u64);

impl PerceptualHash {
    /// Hamming distance, 0..=64.
    pub fn distance(&self, other: &PerceptualHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }

    /// Lowercase hex, 16 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Debug for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PerceptualHash({})", self.to_hex())
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// One cross-checked descriptor correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorMatch {
    /// Index into the first image's descriptors.
    pub query: usize,
    /// Index into the second image's descriptors.
    pub train: usize,
    /// Hamming distance between the two descriptors.
    pub distance: u32,
}

/// Output of keypoint detection and matching over two images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeypointMatches {
    pub descriptors_a: usize,
    pub descriptors_b: usize,
    /// Cross-checked matches, ascending by distance.
    pub matches: Vec<DescriptorMatch>,
}

/// Image operations the visual comparator depends on.
///
/// Implementations must be deterministic: the same inputs always produce the
/// same outputs, since the decision thresholds are calibrated against them.
pub trait ImagePrimitives: Send + Sync + 'static {
    /// Decode encoded image bytes (PNG, JPEG) to grayscale.
    fn decode_gray(&self, bytes: &[u8]) -> Result<GrayRaster>;

    /// Resample to exactly `width` x `height`.
    fn resize(&self, img: &GrayRaster, width: u32, height: u32) -> Result<GrayRaster>;

    /// 3x3 Gaussian smoothing.
    fn gaussian_blur_3x3(&self, img: &GrayRaster) -> Result<GrayRaster>;

    /// Contrast-limited adaptive histogram equalization.
    fn equalize_adaptive(
        &self,
        img: &GrayRaster,
        clip_limit: f64,
        tile_grid: (u32, u32),
    ) -> Result<GrayRaster>;

    fn perceptual_hash(&self, img: &GrayRaster) -> Result<PerceptualHash>;

    /// Mean structural similarity over two equal-size rasters.
    fn structural_similarity(&self, a: &GrayRaster, b: &GrayRaster) -> Result<f64>;

    /// Detect keypoints in both rasters and match their descriptors with
    /// cross-check.
    fn match_keypoints(&self, a: &GrayRaster, b: &GrayRaster) -> Result<KeypointMatches>;
}
