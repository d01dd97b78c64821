//! Pixel-level frame similarity.
//!
//! Two frames are normalized to the same size and compared two ways:
//! mean absolute channel difference (structure) and RGB histogram
//! intersection (color distribution). Both are expressed on a 0..=100 scale.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Both frames are resized to `COMPARE_SIZE x COMPARE_SIZE` before scoring.
pub const COMPARE_SIZE: u32 = 256;

const HIST_BINS: usize = 8;
const PIXEL_WEIGHT: f64 = 0.6;
const HISTOGRAM_WEIGHT: f64 = 0.4;

/// Similarity between two frames, each component in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityScore {
    pub pixel: f64,
    pub histogram: f64,
    pub combined: f64,
}

/// Load and compare two image files.
pub fn compare_images(a: impl AsRef<Path>, b: impl AsRef<Path>) -> MediaResult<SimilarityScore> {
    let a = load_rgb(a.as_ref())?;
    let b = load_rgb(b.as_ref())?;
    Ok(compare_rgb(&a, &b))
}

/// Compare two in-memory RGB images of any size.
pub fn compare_rgb(a: &RgbImage, b: &RgbImage) -> SimilarityScore {
    let a = normalize(a);
    let b = normalize(b);

    let pixel = pixel_similarity(&a, &b);
    let histogram = 100.0 * histogram_intersection(&color_histogram(&a), &color_histogram(&b));
    let combined = PIXEL_WEIGHT * pixel + HISTOGRAM_WEIGHT * histogram;

    SimilarityScore {
        pixel: clamp_score(pixel),
        histogram: clamp_score(histogram),
        combined: clamp_score(combined),
    }
}

fn load_rgb(path: &Path) -> MediaResult<RgbImage> {
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    Ok(image::open(path)?.to_rgb8())
}

fn normalize(img: &RgbImage) -> RgbImage {
    if img.dimensions() == (COMPARE_SIZE, COMPARE_SIZE) {
        return img.clone();
    }
    image::imageops::resize(img, COMPARE_SIZE, COMPARE_SIZE, FilterType::Triangle)
}

fn pixel_similarity(a: &RgbImage, b: &RgbImage) -> f64 {
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(x, y)| u64::from(x.abs_diff(*y)))
        .sum();
    let samples = a.as_raw().len().max(1) as f64;
    let mad = total as f64 / samples;
    100.0 * (1.0 - mad / 255.0)
}

fn color_histogram(img: &RgbImage) -> Vec<f32> {
    let mut hist = vec![0f32; HIST_BINS * HIST_BINS * HIST_BINS];
    let shift = 8 - HIST_BINS.trailing_zeros();

    for px in img.pixels() {
        let r = (px[0] >> shift) as usize;
        let g = (px[1] >> shift) as usize;
        let b = (px[2] >> shift) as usize;
        hist[(r * HIST_BINS + g) * HIST_BINS + b] += 1.0;
    }

    let total = (img.width() * img.height()).max(1) as f32;
    for v in &mut hist {
        *v /= total;
    }
    hist
}

/// Histogram intersection normalized by the smaller histogram mass.
fn histogram_intersection(h1: &[f32], h2: &[f32]) -> f64 {
    if h1.len() != h2.len() || h1.is_empty() {
        return 0.0;
    }

    let mut intersection = 0.0f64;
    let mut sum1 = 0.0f64;
    let mut sum2 = 0.0f64;

    for (a, b) in h1.iter().zip(h2.iter()) {
        intersection += f64::from(*a).min(f64::from(*b));
        sum1 += f64::from(*a);
        sum2 += f64::from(*b);
    }

    let denominator = sum1.min(sum2);
    if denominator > 0.0 {
        intersection / denominator
    } else {
        0.0
    }
}

fn clamp_score(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(color))
    }

    #[test]
    fn test_identical_images_score_100() {
        let img = crate::test_image::render_test_image();
        let score = compare_rgb(&img, &img);
        assert!((score.pixel - 100.0).abs() < 1e-9);
        assert!((score.histogram - 100.0).abs() < 1e-6);
        assert!((score.combined - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_black_vs_white_scores_zero() {
        let score = compare_rgb(&solid(64, 64, [0, 0, 0]), &solid(64, 64, [255, 255, 255]));
        assert!(score.pixel.abs() < 1e-9);
        assert!(score.histogram.abs() < 1e-9);
        assert!(score.combined.abs() < 1e-9);
    }

    #[test]
    fn test_different_sizes_are_normalized() {
        let score = compare_rgb(&solid(576, 1024, [10, 20, 30]), &solid(100, 50, [10, 20, 30]));
        assert!(score.combined > 99.9);
    }

    #[test]
    fn test_small_shift_stays_high() {
        let a = solid(32, 32, [100, 100, 100]);
        let b = solid(32, 32, [110, 100, 100]);
        let score = compare_rgb(&a, &b);
        // 10/255 on one channel out of three
        assert!((score.pixel - (100.0 * (1.0 - 10.0 / 3.0 / 255.0))).abs() < 0.01);
        // Both land in the same 8-bin bucket
        assert!((score.histogram - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_histogram_intersection_mismatched() {
        assert_eq!(histogram_intersection(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(histogram_intersection(&[], &[]), 0.0);
    }

    #[test]
    fn test_compare_images_missing_file() {
        let result = compare_images("/nonexistent/a.png", "/nonexistent/b.png");
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
