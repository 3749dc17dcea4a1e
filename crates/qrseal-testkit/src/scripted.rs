//! Image primitives that return preset signals.
//!
//! [`ScriptedPrimitives`] lets a test pick the exact pHash distance, SSIM and
//! ORB ratio the decision table sees, while the rest of the verification
//! path (file reads, decoding, fail-closed handling) runs for real.
//!
//! Inputs are tagged by their first byte: the canonical image file holds
//! [`CANONICAL_MARKER`], anything else counts as the upload.

use std::path::Path;

use qrseal_vision::{
    DescriptorMatch, GrayRaster, ImagePrimitives, KeypointMatches, PerceptualHash, Result,
    VisionError,
};

/// First byte of a scripted canonical image.
pub const CANONICAL_MARKER: u8 = 0;

/// Bytes accepted as an uploaded photo.
pub const UPLOAD_BYTES: &[u8] = &[1];

/// Distance below which a scripted match counts as good.
const GOOD_DISTANCE: u32 = 10;
const BAD_DISTANCE: u32 = 90;

#[derive(Debug, Clone)]
pub struct ScriptedPrimitives {
    pub phash_distance: u32,
    pub ssim: f64,
    pub good_matches: usize,
    pub bad_matches: usize,
    /// Descriptors reported for each image.
    pub descriptors: usize,
    /// Fail keypoint matching with a primitive error.
    pub fail_keypoints: bool,
}

impl ScriptedPrimitives {
    pub fn new(phash_distance: u32, ssim: f64, good_matches: usize, bad_matches: usize) -> Self {
        Self {
            phash_distance,
            ssim,
            good_matches,
            bad_matches,
            descriptors: 500,
            fail_keypoints: false,
        }
    }

    /// Signals of an untouched label.
    pub fn genuine() -> Self {
        Self::new(0, 1.0, 100, 0)
    }

    /// Signals of a reprint that fails every rule.
    pub fn forged() -> Self {
        Self::new(48, 0.02, 0, 100)
    }

    pub fn with_descriptors(mut self, descriptors: usize) -> Self {
        self.descriptors = descriptors;
        self
    }

    pub fn failing_keypoints(mut self) -> Self {
        self.fail_keypoints = true;
        self
    }

    /// Write a canonical image these primitives will recognise.
    pub fn write_canonical(path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, [CANONICAL_MARKER])
    }
}

impl ImagePrimitives for ScriptedPrimitives {
    fn decode_gray(&self, bytes: &[u8]) -> Result<GrayRaster> {
        match bytes.first() {
            Some(&tag) => Ok(GrayRaster::filled(8, 8, tag)),
            None => Err(VisionError::Decode("empty image".into())),
        }
    }

    fn resize(&self, img: &GrayRaster, width: u32, height: u32) -> Result<GrayRaster> {
        Ok(GrayRaster::filled(width, height, img.get(0, 0)))
    }

    fn gaussian_blur_3x3(&self, img: &GrayRaster) -> Result<GrayRaster> {
        Ok(img.clone())
    }

    fn equalize_adaptive(&self, img: &GrayRaster, _: f64, _: (u32, u32)) -> Result<GrayRaster> {
        Ok(img.clone())
    }

    fn perceptual_hash(&self, img: &GrayRaster) -> Result<PerceptualHash> {
        if img.get(0, 0) == CANONICAL_MARKER {
            Ok(PerceptualHash(0))
        } else {
            Ok(PerceptualHash(low_bits(self.phash_distance)))
        }
    }

    fn structural_similarity(&self, _: &GrayRaster, _: &GrayRaster) -> Result<f64> {
        Ok(self.ssim)
    }

    fn match_keypoints(&self, _: &GrayRaster, _: &GrayRaster) -> Result<KeypointMatches> {
        if self.fail_keypoints {
            return Err(VisionError::Primitive("scripted matcher failure".into()));
        }
        let matches = (0..self.good_matches + self.bad_matches)
            .map(|i| DescriptorMatch {
                query: i,
                train: i,
                distance: if i < self.good_matches {
                    GOOD_DISTANCE
                } else {
                    BAD_DISTANCE
                },
            })
            .collect();
        Ok(KeypointMatches {
            descriptors_a: self.descriptors,
            descriptors_b: self.descriptors,
            matches,
        })
    }
}

/// A hash with the lowest `n` bits set, `n` clamped to 64.
fn low_bits(n: u32) -> u64 {
    if n >= 64 {
        u64::MAX
    } else {
        (1u64 << n) - 1
    }
}
