//! Mean structural similarity, via `image-compare`'s simple MSSIM.

use image_compare::Algorithm;

use crate::error::{Result, VisionError};
use crate::raster::GrayRaster;

/// Side of the smallest raster the SSIM window fits in.
const MIN_SIDE: u32 = 8;

pub(crate) fn mean_ssim(a: &GrayRaster, b: &GrayRaster) -> Result<f64> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(VisionError::Dimensions(format!(
            "SSIM needs equal sizes, got {:?} and {:?}",
            a, b
        )));
    }
    if a.width() < MIN_SIDE || a.height() < MIN_SIDE {
        return Err(VisionError::Dimensions(format!(
            "SSIM needs at least {}x{}, got {:?}",
            MIN_SIDE, MIN_SIDE, a
        )));
    }

    let similarity =
        image_compare::gray_similarity_structure(&Algorithm::MSSIMSimple, &a.to_image()?, &b.to_image()?)
            .map_err(|e| VisionError::Primitive(format!("ssim: {}", e)))?;
    Ok(similarity.score)
}
