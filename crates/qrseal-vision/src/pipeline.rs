//! Image normalization.
//!
//! Canonical and uploaded images go through the same steps before any signal
//! is computed: grayscale, resize, 3x3 Gaussian blur, CLAHE. Changing any
//! parameter here invalidates the decision thresholds.

use crate::error::Result;
use crate::primitives::ImagePrimitives;
use crate::raster::GrayRaster;

/// Side length of the normalized square raster.
pub const CANONICAL_SIZE: u32 = 512;

/// CLAHE clip limit.
pub const CLAHE_CLIP_LIMIT: f64 = 2.0;

/// CLAHE tile grid (columns, rows).
pub const CLAHE_TILE_GRID: (u32, u32) = (8, 8);

/// The fixed normalization parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizationPipeline {
    pub size: u32,
    pub clip_limit: f64,
    pub tile_grid: (u32, u32),
}

impl Default for NormalizationPipeline {
    fn default() -> Self {
        Self {
            size: CANONICAL_SIZE,
            clip_limit: CLAHE_CLIP_LIMIT,
            tile_grid: CLAHE_TILE_GRID,
        }
    }
}

impl NormalizationPipeline {
    /// Decode and normalize encoded image bytes.
    pub fn normalize_bytes<P: ImagePrimitives + ?Sized>(
        &self,
        primitives: &P,
        bytes: &[u8],
    ) -> Result<GrayRaster> {
        let gray = primitives.decode_gray(bytes)?;
        self.normalize(primitives, &gray)
    }

    /// Normalize an already decoded grayscale raster.
    pub fn normalize<P: ImagePrimitives + ?Sized>(
        &self,
        primitives: &P,
        gray: &GrayRaster,
    ) -> Result<GrayRaster> {
        let resized = primitives.resize(gray, self.size, self.size)?;
        let blurred = primitives.gaussian_blur_3x3(&resized)?;
        primitives.equalize_adaptive(&blurred, self.clip_limit, self.tile_grid)
    }
}
