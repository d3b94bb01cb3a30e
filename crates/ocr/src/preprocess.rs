use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to load image: {0}")]
    Load(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Knobs for the binarization applied before recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Longest side allowed before downscaling, in pixels.
    pub max_dimension: u32,
    /// Gaussian blur sigma; `0` disables the blur.
    pub blur_sigma: f32,
    /// Side of the square neighbourhood used for the local mean; odd.
    pub threshold_block: u32,
    /// Subtracted from the local mean before comparing.
    pub threshold_offset: i32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2800,
            blur_sigma: 1.0,
            threshold_block: 11,
            threshold_offset: 2,
        }
    }
}

/// Load an image file, binarize it, and return PNG bytes ready for OCR.
pub fn prepare_for_ocr(path: &Path, cfg: &PreprocessConfig) -> Result<Vec<u8>, PreprocessError> {
    let img = image::open(path)?;
    encode_as_png(normalize(img, cfg))
}

/// Process raw image bytes (JPEG / PNG / WEBP / …) and return binarized PNG bytes.
pub fn prepare_for_ocr_from_bytes(
    data: &[u8],
    cfg: &PreprocessConfig,
) -> Result<Vec<u8>, PreprocessError> {
    let img = image::load_from_memory(data)?;
    encode_as_png(normalize(img, cfg))
}

/// Downscale, grayscale, blur, adaptive threshold.
fn normalize(img: DynamicImage, cfg: &PreprocessConfig) -> GrayImage {
    let max = cfg.max_dimension.max(1);
    let img = if img.width() > max || img.height() > max {
        img.resize(max, max, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let gray = img.to_luma8();
    let gray = if cfg.blur_sigma > 0.0 {
        image::imageops::blur(&gray, cfg.blur_sigma)
    } else {
        gray
    };

    adaptive_threshold(&gray, cfg.threshold_block, cfg.threshold_offset)
}

/// Binary threshold against the mean of each pixel's `block × block`
/// neighbourhood minus `offset`; the window is clipped at the borders.
fn adaptive_threshold(gray: &GrayImage, block: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let radius = (block.max(1) / 2) as i64;
    let integral = integral_image(gray);
    let stride = w as usize + 1;
    let sum_at = |x: i64, y: i64| integral[y as usize * stride + x as usize];

    ImageBuffer::from_fn(w, h, |x, y| {
        let x0 = (x as i64 - radius).max(0);
        let y0 = (y as i64 - radius).max(0);
        let x1 = (x as i64 + radius + 1).min(w as i64);
        let y1 = (y as i64 + radius + 1).min(h as i64);

        let area = (x1 - x0) * (y1 - y0);
        let sum = sum_at(x1, y1) - sum_at(x0, y1) - sum_at(x1, y0) + sum_at(x0, y0);
        let threshold = sum as f64 / area as f64 - offset as f64;

        let p = gray.get_pixel(x, y)[0] as f64;
        Luma([if p > threshold { 255 } else { 0 }])
    })
}

/// Summed-area table with a zero first row and column.
fn integral_image(gray: &GrayImage) -> Vec<i64> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let stride = w + 1;
    let mut table = vec![0i64; stride * (h + 1)];
    for y in 0..h {
        let mut row = 0i64;
        for x in 0..w {
            row += gray.get_pixel(x as u32, y as u32)[0] as i64;
            table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row;
        }
    }
    table
}

fn encode_as_png(img: GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
