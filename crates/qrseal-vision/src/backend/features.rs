//! Keypoints, binary descriptors, and cross-checked matching.
//!
//! `imageproc` supplies FAST-9 corners (threshold 20, non-maximum
//! suppression over a 3x3 neighbourhood, strongest [`MAX_FEATURES`] kept)
//! and unoriented 256-bit BRIEF descriptors. The BRIEF sampling pattern is
//! drawn once from a fixed seed so descriptors are reproducible across runs.
//! Matching is brute-force Hamming with a mutual-nearest-neighbour check.

use std::sync::OnceLock;

use imageproc::binary_descriptors::brief::{brief, BriefDescriptor, TestPair};
use imageproc::binary_descriptors::BinaryDescriptor;
use imageproc::corners::{corners_fast9, Corner};
use imageproc::point::Point;
use imageproc::suppress::local_maxima;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Result, VisionError};
use crate::primitives::DescriptorMatch;
use crate::raster::GrayRaster;

/// Upper bound on keypoints per image.
pub const MAX_FEATURES: usize = 500;

/// Largest raster described. Integral sums over bigger images no longer
/// fit in 32 bits.
pub const MAX_FEATURE_PIXELS: u64 = u32::MAX as u64 / 255;

const FAST_THRESHOLD: u8 = 20;

/// Keypoints closer than this to the border are not described.
const EDGE: u32 = 16;

const BRIEF_BITS: usize = 256;
/// BRIEF patches are 31x31; test points stay inside the inner 27x27 so the
/// 5x5 smoothing box never leaves the patch.
const PATCH_LOW: u32 = 2;
const PATCH_HIGH: u32 = 28;
const BRIEF_SEED: u64 = 0x5152_5345_414c_0001;

fn test_pairs() -> &'static Vec<TestPair> {
    static PAIRS: OnceLock<Vec<TestPair>> = OnceLock::new();
    PAIRS.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(BRIEF_SEED);
        let mut point = || {
            let x = rng.gen_range(PATCH_LOW..=PATCH_HIGH);
            let y = rng.gen_range(PATCH_LOW..=PATCH_HIGH);
            Point::new(x, y)
        };
        (0..BRIEF_BITS)
            .map(|_| TestPair {
                p0: point(),
                p1: point(),
            })
            .collect()
    })
}

/// FAST-9 corners away from the border, strongest first.
pub(crate) fn detect(img: &image::GrayImage) -> Vec<Corner> {
    let (w, h) = img.dimensions();
    if w <= 2 * EDGE || h <= 2 * EDGE {
        return Vec::new();
    }

    let corners: Vec<Corner> = corners_fast9(img, FAST_THRESHOLD)
        .into_iter()
        .filter(|c| c.x >= EDGE && c.y >= EDGE && c.x < w - EDGE && c.y < h - EDGE)
        .collect();

    let mut keypoints = local_maxima(&corners, 1);
    keypoints.sort_by(|a, b| b.score.total_cmp(&a.score).then((a.y, a.x).cmp(&(b.y, b.x))));
    keypoints.truncate(MAX_FEATURES);
    keypoints
}

/// Detect keypoints and compute one descriptor per keypoint.
pub(crate) fn describe(raster: &GrayRaster) -> Result<Vec<BriefDescriptor>> {
    let pixels = raster.width() as u64 * raster.height() as u64;
    if pixels > MAX_FEATURE_PIXELS {
        return Err(VisionError::Dimensions(format!(
            "{:?} is too large to describe ({} pixels, limit {})",
            raster, pixels, MAX_FEATURE_PIXELS
        )));
    }

    let img = raster.to_image()?;
    let keypoints: Vec<Point<u32>> = detect(&img).iter().map(|c| Point::new(c.x, c.y)).collect();
    if keypoints.is_empty() {
        return Ok(Vec::new());
    }

    let (descriptors, _) = brief(&img, &keypoints, BRIEF_BITS, Some(test_pairs()))
        .map_err(|e| VisionError::Primitive(format!("brief: {}", e)))?;
    Ok(descriptors)
}

/// Index and distance of the nearest candidate; first wins on ties.
fn nearest(query: &BriefDescriptor, candidates: &[BriefDescriptor]) -> (usize, u32) {
    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (i, query.hamming_distance(c)))
        .fold((0, u32::MAX), |best, cur| if cur.1 < best.1 { cur } else { best })
}

/// Brute-force Hamming matching keeping only mutual nearest neighbours,
/// sorted by distance.
pub(crate) fn cross_check_match(a: &[BriefDescriptor], b: &[BriefDescriptor]) -> Vec<DescriptorMatch> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }

    let backward: Vec<usize> = b.iter().map(|d| nearest(d, a).0).collect();

    let mut matches: Vec<DescriptorMatch> = a
        .iter()
        .enumerate()
        .filter_map(|(query, d)| {
            let (train, distance) = nearest(d, b);
            (backward[train] == query).then_some(DescriptorMatch {
                query,
                train,
                distance,
            })
        })
        .collect();

    matches.sort_by_key(|m| (m.distance, m.query));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> image::GrayImage {
        image::GrayImage::from_fn(64, 64, |x, y| {
            if (20..44).contains(&x) && (20..44).contains(&y) {
                image::Luma([255])
            } else {
                image::Luma([0])
            }
        })
    }

    fn blocks(seed: u64, size: u32) -> GrayRaster {
        let mut rng = StdRng::seed_from_u64(seed);
        let cells: Vec<bool> = (0..(size / 8) * (size / 8)).map(|_| rng.gen_bool(0.5)).collect();
        GrayRaster::from_fn(size, size, |x, y| {
            if cells[((y / 8) * (size / 8) + x / 8) as usize] {
                230
            } else {
                25
            }
        })
    }

    fn descriptor(fill: u128) -> BriefDescriptor {
        BriefDescriptor {
            bits: vec![fill, fill],
            corner: Corner::new(0, 0, 0.0),
        }
    }

    #[test]
    fn test_pattern_is_fixed() {
        let pairs = test_pairs();
        assert_eq!(pairs.len(), BRIEF_BITS);
        assert!(pairs.iter().all(|p| {
            [p.p0.x, p.p0.y, p.p1.x, p.p1.y]
                .iter()
                .all(|v| (PATCH_LOW..=PATCH_HIGH).contains(v))
        }));
        assert!(std::ptr::eq(pairs, test_pairs()));
    }

    #[test]
    fn test_flat_image_has_no_corners() {
        assert!(detect(&image::GrayImage::from_pixel(64, 64, image::Luma([128]))).is_empty());
    }

    #[test]
    fn test_square_corners() {
        let keypoints = detect(&square());
        for &(cx, cy) in &[(20i64, 20i64), (43, 20), (20, 43), (43, 43)] {
            assert!(
                keypoints
                    .iter()
                    .any(|k| (k.x as i64 - cx).abs() <= 2 && (k.y as i64 - cy).abs() <= 2),
                "no keypoint near ({}, {}): {:?}",
                cx,
                cy,
                keypoints
            );
        }
    }

    #[test]
    fn test_small_image_has_no_keypoints() {
        assert!(detect(&image::GrayImage::new(32, 32)).is_empty());
    }

    #[test]
    fn test_identical_images_match_perfectly() {
        let img = blocks(7, 128);
        let d = describe(&img).unwrap();
        assert!(d.len() >= 10, "only {} descriptors", d.len());
        assert!(d.iter().all(|x| x.bits.len() * 128 == BRIEF_BITS));

        let matches = cross_check_match(&d, &d);
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|m| m.distance == 0));
    }

    #[test]
    fn test_descriptors_are_reproducible() {
        let img = blocks(3, 128);
        let a = describe(&img).unwrap();
        let b = describe(&img).unwrap();
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(&b).all(|(x, y)| x.bits == y.bits && x.corner == y.corner));
    }

    #[test]
    fn test_keypoint_cap() {
        let img = blocks(11, 512).to_image().unwrap();
        assert!(detect(&img).len() <= MAX_FEATURES);
    }

    #[test]
    fn test_large_raster_described() {
        let img = blocks(5, 1024);
        let d = describe(&img).unwrap();
        assert!(!d.is_empty());
        assert!(d.len() <= MAX_FEATURES);
    }

    #[test]
    fn test_oversized_raster_rejected() {
        // One row past the pixel limit.
        let width = 4096u32;
        let height = (MAX_FEATURE_PIXELS / width as u64) as u32 + 1;
        let img = GrayRaster::filled(width, height, 255);
        assert!(matches!(describe(&img), Err(VisionError::Dimensions(_))));
    }

    #[test]
    fn test_cross_check_is_mutual() {
        let a = vec![descriptor(0), descriptor(u128::MAX)];
        let b = vec![descriptor(u128::MAX), descriptor(1), descriptor(3)];
        let matches = cross_check_match(&a, &b);

        assert_eq!(
            matches,
            vec![
                DescriptorMatch { query: 1, train: 0, distance: 0 },
                DescriptorMatch { query: 0, train: 1, distance: 2 },
            ]
        );
    }

    #[test]
    fn test_empty_side_gives_no_matches() {
        let a = vec![descriptor(0)];
        assert!(cross_check_match(&a, &[]).is_empty());
        assert!(cross_check_match(&[], &a).is_empty());
    }
}
