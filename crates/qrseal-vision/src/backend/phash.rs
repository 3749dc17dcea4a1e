//! 64-bit DCT perceptual hash.
//!
//! `image_hasher` with DCT preprocessing and a median threshold over the
//! 8x8 lowest frequencies.

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig};

use crate::error::{Result, VisionError};
use crate::primitives::PerceptualHash;
use crate::raster::GrayRaster;

const HASH_SIDE: u32 = 8;

pub(crate) fn dct_hash(img: &GrayRaster) -> Result<PerceptualHash> {
    if img.is_empty() {
        return Err(VisionError::Dimensions("cannot hash an empty raster".into()));
    }

    let hasher = HasherConfig::new()
        .hash_size(HASH_SIDE, HASH_SIDE)
        .hash_alg(HashAlg::Median)
        .preproc_dct()
        .to_hasher();
    let hash = hasher.hash_image(&DynamicImage::ImageLuma8(img.to_image()?));

    let bytes: [u8; 8] = hash.as_bytes().try_into().map_err(|_| {
        VisionError::Primitive(format!(
            "expected a 64-bit hash, got {} bytes",
            hash.as_bytes().len()
        ))
    })?;
    Ok(PerceptualHash(u64::from_be_bytes(bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(offset: u8) -> GrayRaster {
        GrayRaster::from_fn(128, 128, |x, y| {
            let v = ((x * x + 3 * y + x * y / 7) % 200) as u8;
            v + offset
        })
    }

    #[test]
    fn test_same_image_same_hash() {
        let a = dct_hash(&textured(0)).unwrap();
        let b = dct_hash(&textured(0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_brightness_shift_is_tolerated() {
        let a = dct_hash(&textured(0)).unwrap();
        let b = dct_hash(&textured(40)).unwrap();
        assert!(a.distance(&b) <= 4, "distance {}", a.distance(&b));
    }

    #[test]
    fn test_inversion_flips_most_bits() {
        let img = textured(0);
        let inverted = GrayRaster::from_fn(128, 128, |x, y| 255 - img.get(x, y));
        let a = dct_hash(&img).unwrap();
        let b = dct_hash(&inverted).unwrap();
        assert!(a.distance(&b) >= 32, "distance {}", a.distance(&b));
    }

    #[test]
    fn test_tiny_image() {
        let img = GrayRaster::from_fn(3, 2, |x, y| (x * 50 + y * 20) as u8);
        assert!(dct_hash(&img).is_ok());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(dct_hash(&GrayRaster::filled(0, 0, 0)).is_err());
    }
}
