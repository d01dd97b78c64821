//! Synthetic keyframe for smoke-testing generation workflows.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, Rgb, RgbImage};
use tracing::info;

use crate::error::MediaResult;

pub const TEST_IMAGE_WIDTH: u32 = 576;
pub const TEST_IMAGE_HEIGHT: u32 = 1024;
const JPEG_QUALITY: u8 = 95;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 128, 0]);

/// Render the test keyframe: white canvas with an outlined blue rectangle,
/// red ellipse and green triangle.
pub fn render_test_image() -> RgbImage {
    let mut img = RgbImage::from_pixel(TEST_IMAGE_WIDTH, TEST_IMAGE_HEIGHT, WHITE);

    draw_rect(&mut img, (100, 100), (476, 400), BLUE, 2);
    draw_ellipse(&mut img, (200, 500), (376, 676), RED, 2);
    draw_triangle(&mut img, [(288, 750), (100, 900), (476, 900)], GREEN);

    img
}

/// Render the test keyframe and write it to `path`.
///
/// `.jpg`/`.jpeg` are written at quality 95, anything else by extension.
pub fn create_test_image(path: impl AsRef<Path>) -> MediaResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let img = render_test_image();
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
        .unwrap_or(false);

    if is_jpeg {
        let mut writer = BufWriter::new(File::create(path)?);
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        encoder.encode(img.as_raw(), img.width(), img.height(), ColorType::Rgb8)?;
    } else {
        img.save(path)?;
    }

    info!(
        "Test image created: {} ({}x{})",
        path.display(),
        TEST_IMAGE_WIDTH,
        TEST_IMAGE_HEIGHT
    );
    Ok(())
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_rect(img: &mut RgbImage, min: (i64, i64), max: (i64, i64), fill: Rgb<u8>, outline: i64) {
    for y in min.1..=max.1 {
        for x in min.0..=max.0 {
            let edge = x - min.0 < outline
                || max.0 - x < outline
                || y - min.1 < outline
                || max.1 - y < outline;
            put(img, x, y, if edge { BLACK } else { fill });
        }
    }
}

fn draw_ellipse(img: &mut RgbImage, min: (i64, i64), max: (i64, i64), fill: Rgb<u8>, outline: i64) {
    let cx = (min.0 + max.0) as f64 / 2.0;
    let cy = (min.1 + max.1) as f64 / 2.0;
    let rx = (max.0 - min.0) as f64 / 2.0;
    let ry = (max.1 - min.1) as f64 / 2.0;
    let inner_rx = (rx - outline as f64).max(0.0);
    let inner_ry = (ry - outline as f64).max(0.0);

    for y in min.1..=max.1 {
        for x in min.0..=max.0 {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if (dx / rx).powi(2) + (dy / ry).powi(2) > 1.0 {
                continue;
            }
            let inside = inner_rx > 0.0
                && inner_ry > 0.0
                && (dx / inner_rx).powi(2) + (dy / inner_ry).powi(2) <= 1.0;
            put(img, x, y, if inside { fill } else { BLACK });
        }
    }
}

fn draw_triangle(img: &mut RgbImage, pts: [(i64, i64); 3], fill: Rgb<u8>) {
    let min_x = pts.iter().map(|p| p.0).min().unwrap_or(0);
    let max_x = pts.iter().map(|p| p.0).max().unwrap_or(0);
    let min_y = pts.iter().map(|p| p.1).min().unwrap_or(0);
    let max_y = pts.iter().map(|p| p.1).max().unwrap_or(0);

    let edge = |a: (i64, i64), b: (i64, i64), p: (i64, i64)| {
        (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
    };
    let area = edge(pts[0], pts[1], pts[2]);
    if area == 0 {
        return;
    }

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = (x, y);
            let w0 = edge(pts[1], pts[2], p) * area.signum();
            let w1 = edge(pts[2], pts[0], p) * area.signum();
            let w2 = edge(pts[0], pts[1], p) * area.signum();
            if w0 >= 0 && w1 >= 0 && w2 >= 0 {
                put(img, x, y, fill);
            }
        }
    }

    for i in 0..3 {
        draw_line(img, pts[i], pts[(i + 1) % 3], BLACK);
    }
}

fn draw_line(img: &mut RgbImage, a: (i64, i64), b: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = a;
    let dx = (b.0 - a.0).abs();
    let dy = -(b.1 - a.1).abs();
    let sx = if a.0 < b.0 { 1 } else { -1 };
    let sy = if a.1 < b.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(img, x, y, color);
        if (x, y) == b {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
