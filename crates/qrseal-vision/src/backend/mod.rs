//! The standard image backend.
//!
//! Decoding and resampling come from `image`, smoothing and keypoints from
//! `imageproc`, the perceptual hash from `image_hasher`, and SSIM from
//! `image-compare`. Adaptive equalization is local.

mod clahe;
mod features;
mod phash;
mod ssim;

use image::imageops::{self, FilterType};
use imageproc::filter::separable_filter_equal;

use crate::error::{Result, VisionError};
use crate::primitives::{ImagePrimitives, KeypointMatches, PerceptualHash};
use crate::raster::GrayRaster;

pub use features::{MAX_FEATURES, MAX_FEATURE_PIXELS};

/// Binomial approximation of a sigma-0.8 Gaussian, applied along each axis.
const GAUSSIAN_3: [f32; 3] = [0.25, 0.5, 0.25];

/// Production [`ImagePrimitives`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPrimitives {
    _private: (),
}

impl StandardPrimitives {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ImagePrimitives for StandardPrimitives {
    fn decode_gray(&self, bytes: &[u8]) -> Result<GrayRaster> {
        let img = image::load_from_memory(bytes).map_err(|e| VisionError::Decode(e.to_string()))?;
        let gray = GrayRaster::from(img.to_luma8());
        if gray.is_empty() {
            return Err(VisionError::Decode("image has no pixels".into()));
        }
        Ok(gray)
    }

    fn resize(&self, img: &GrayRaster, width: u32, height: u32) -> Result<GrayRaster> {
        if img.is_empty() || width == 0 || height == 0 {
            return Err(VisionError::Dimensions(format!(
                "cannot resize {:?} to {}x{}",
                img, width, height
            )));
        }
        if img.width() == width && img.height() == height {
            return Ok(img.clone());
        }
        let resized = imageops::resize(&img.to_image()?, width, height, FilterType::Triangle);
        Ok(GrayRaster::from(resized))
    }

    fn gaussian_blur_3x3(&self, img: &GrayRaster) -> Result<GrayRaster> {
        if img.is_empty() {
            return Ok(img.clone());
        }
        let blurred = separable_filter_equal(&img.to_image()?, &GAUSSIAN_3);
        Ok(GrayRaster::from(blurred))
    }

    fn equalize_adaptive(
        &self,
        img: &GrayRaster,
        clip_limit: f64,
        tile_grid: (u32, u32),
    ) -> Result<GrayRaster> {
        clahe::equalize(img, clip_limit, tile_grid)
    }

    fn perceptual_hash(&self, img: &GrayRaster) -> Result<PerceptualHash> {
        phash::dct_hash(img)
    }

    fn structural_similarity(&self, a: &GrayRaster, b: &GrayRaster) -> Result<f64> {
        ssim::mean_ssim(a, b)
    }

    fn match_keypoints(&self, a: &GrayRaster, b: &GrayRaster) -> Result<KeypointMatches> {
        let descriptors_a = features::describe(a)?;
        let descriptors_b = features::describe(b)?;
        let matches = features::cross_check_match(&descriptors_a, &descriptors_b);
        Ok(KeypointMatches {
            descriptors_a: descriptors_a.len(),
            descriptors_b: descriptors_b.len(),
            matches,
        })
    }
}
