//! Contrast-limited adaptive histogram equalization.
//!
//! Per-tile histograms are clipped at `clip_limit * tile_area / 256`, the
//! excess spread evenly across all bins, and each tile's CDF becomes a
//! lookup table. Output pixels bilinearly blend the four nearest tile LUTs.
//! Images whose size is not a multiple of the grid are padded by mirroring.
//!
//! None of the imaging crates we depend on ship CLAHE, so it lives here.

use crate::error::{Result, VisionError};
use crate::raster::GrayRaster;

const BINS: usize = 256;

/// Mirror an out-of-range index without repeating the edge pixel
/// (`dcb|abcd|cba`).
#[inline]
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

pub(crate) fn equalize(img: &GrayRaster, clip_limit: f64, tile_grid: (u32, u32)) -> Result<GrayRaster> {
    let (tiles_x, tiles_y) = (tile_grid.0 as usize, tile_grid.1 as usize);
    if tiles_x == 0 || tiles_y == 0 {
        return Err(VisionError::Dimensions(format!(
            "tile grid must be non-zero, got {}x{}",
            tiles_x, tiles_y
        )));
    }
    if img.is_empty() {
        return Err(VisionError::Dimensions("cannot equalize an empty raster".into()));
    }
    if !clip_limit.is_finite() {
        return Err(VisionError::Primitive(format!("invalid clip limit {}", clip_limit)));
    }

    let w = img.width() as usize;
    let h = img.height() as usize;
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);
    let tile_area = tile_w * tile_h;

    let clip = if clip_limit > 0.0 {
        ((clip_limit * tile_area as f64 / BINS as f64) as usize).max(1)
    } else {
        usize::MAX
    };

    let src = img.pixels();
    let lut_scale = (BINS - 1) as f32 / tile_area as f32;
    let mut luts = vec![[0u8; BINS]; tiles_x * tiles_y];

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut hist = [0usize; BINS];
            for y in ty * tile_h..(ty + 1) * tile_h {
                let row = reflect101(y as isize, h) * w;
                for x in tx * tile_w..(tx + 1) * tile_w {
                    hist[src[row + reflect101(x as isize, w)] as usize] += 1;
                }
            }

            clip_histogram(&mut hist, clip);

            let lut = &mut luts[ty * tiles_x + tx];
            let mut sum = 0usize;
            for (bin, slot) in lut.iter_mut().enumerate() {
                sum += hist[bin];
                *slot = (sum as f32 * lut_scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    // Per-column tile neighbours and weights.
    let columns: Vec<(usize, usize, f32)> = (0..w)
        .map(|x| neighbours(x, tile_w, tiles_x))
        .collect();

    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        let (ty1, ty2, ya) = neighbours(y, tile_h, tiles_y);
        let ya1 = 1.0 - ya;
        let top = ty1 * tiles_x;
        let bottom = ty2 * tiles_x;
        for (x, &(tx1, tx2, xa)) in columns.iter().enumerate() {
            let v = src[y * w + x] as usize;
            let xa1 = 1.0 - xa;
            let upper = luts[top + tx1][v] as f32 * xa1 + luts[top + tx2][v] as f32 * xa;
            let lower = luts[bottom + tx1][v] as f32 * xa1 + luts[bottom + tx2][v] as f32 * xa;
            let res = upper * ya1 + lower * ya;
            out.push(res.round().clamp(0.0, 255.0) as u8);
        }
    }

    Ok(GrayRaster::from_vec(img.width(), img.height(), out))
}

/// Clip bins at `clip` and hand the excess back out, evenly first, then one
/// at a time at a fixed stride.
fn clip_histogram(hist: &mut [usize; BINS], clip: usize) {
    let mut clipped = 0usize;
    for bin in hist.iter_mut() {
        if *bin > clip {
            clipped += *bin - clip;
            *bin = clip;
        }
    }
    if clipped == 0 {
        return;
    }

    let batch = clipped / BINS;
    let mut residual = clipped - batch * BINS;
    for bin in hist.iter_mut() {
        *bin += batch;
    }
    if residual != 0 {
        let step = (BINS / residual).max(1);
        let mut i = 0;
        while i < BINS && residual > 0 {
            hist[i] += 1;
            i += step;
            residual -= 1;
        }
    }
}

/// The two tiles whose centres bracket `pos`, and the weight of the second.
fn neighbours(pos: usize, tile_size: usize, tiles: usize) -> (usize, usize, f32) {
    let f = pos as f32 / tile_size as f32 - 0.5;
    let lower = f.floor();
    let weight = f - lower;
    let lower = lower as isize;
    let first = lower.max(0) as usize;
    let second = ((lower + 1) as usize).min(tiles - 1);
    (first, second, weight)
}
