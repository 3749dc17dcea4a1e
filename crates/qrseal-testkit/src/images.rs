//! Deterministic label images.
//!
//! Real PNGs for exercising [`qrseal_vision::StandardPrimitives`] end to end.
//! A label is a 16px block pattern; its forgery is the same pattern with
//! every block inverted, which no decision rule accepts.

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{GrayImage, ImageFormat, ImageResult, Luma};

/// Side length of generated labels.
pub const LABEL_SIZE: u32 = 256;

const CELL: u32 = 16;

fn pattern(variant: u32, invert: bool) -> GrayImage {
    GrayImage::from_fn(LABEL_SIZE, LABEL_SIZE, |x, y| {
        let (cx, cy) = (x / CELL, y / CELL);
        let dark = (cx * 7 + cy * 13 + cx * cy + variant) % 3 == 0;
        Luma([if dark != invert { 0 } else { 255 }])
    })
}

/// The canonical label for `variant`.
pub fn label_image(variant: u32) -> GrayImage {
    pattern(variant, false)
}

/// The inverted counterfeit of [`label_image`].
pub fn forged_image(variant: u32) -> GrayImage {
    pattern(variant, true)
}

pub fn encode_png(img: &GrayImage) -> ImageResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Save `img` as PNG, creating parent directories.
pub fn write_png(img: &GrayImage, path: &Path) -> ImageResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    img.save(path)
}

/// `data:image/png;base64,...` as sent by browser clients.
pub fn data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
