//! Shared test utilities for the converter test suite.
//!
//! Builds DATA streams by hand (independent of the encoder under test),
//! generates small synthetic images, and compares images with a per-channel
//! tolerance.

use image::{Rgba, RgbaImage};
use std::path::Path;

// =========================================================================
// DATA stream builders
// =========================================================================

/// The 12-byte header for a `width`×`height` stream.
pub fn data_header(width: i32, height: i32, has_alpha: bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&width.to_le_bytes());
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(&i32::from(has_alpha).to_le_bytes());
    bytes
}

/// A complete stream from `(count, [r, g, b, a])` runs.
///
/// Counts above 255 must be written as 256 (encoded as `0`).
pub fn data_stream(width: i32, height: i32, has_alpha: bool, runs: &[(usize, [u8; 4])]) -> Vec<u8> {
    let mut bytes = data_header(width, height, has_alpha);
    for &(count, [r, g, b, a]) in runs {
        assert!((1..=256).contains(&count), "run length {count} out of range");
        bytes.push((count % 256) as u8);
        if !has_alpha {
            bytes.extend_from_slice(&[b, g, r]);
        } else if a == 0 {
            bytes.push(0);
        } else {
            bytes.extend_from_slice(&[a, b, g, r]);
        }
    }
    bytes
}

// =========================================================================
// Synthetic images
// =========================================================================

/// Stripes of opaque, translucent and fully transparent pixels.
///
/// Transparent pixels are `(0, 0, 0, 0)` and translucent colors are chosen
/// to survive premultiplication, so the image round-trips exactly.
pub fn multi_color_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| match (x + y) % 5 {
        0 => Rgba([255, 0, 0, 255]),
        1 => Rgba([0, 255, 0, 128]),
        2 => Rgba([0, 0, 0, 0]),
        3 => Rgba([(x * 7) as u8, (y * 11) as u8, 200, 255]),
        _ => Rgba([255, 255, 255, 1]),
    })
}

/// Write a DATA fixture to `path`, creating parent directories.
pub fn write_file(path: &Path, bytes: &[u8]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

// =========================================================================
// Assertions
// =========================================================================

/// Assert equal dimensions and every channel within `tolerance`.
pub fn assert_images_close(expected: &RgbaImage, actual: &RgbaImage, tolerance: u8) {
    assert_eq!(
        expected.dimensions(),
        actual.dimensions(),
        "image dimensions mismatch"
    );
    for (x, y, want) in expected.enumerate_pixels() {
        let got = actual.get_pixel(x, y);
        let close = want
            .0
            .iter()
            .zip(got.0.iter())
            .all(|(a, b)| a.abs_diff(*b) <= tolerance);
        assert!(
            close,
            "pixel mismatch at ({x},{y}): expected {:?}, got {:?}",
            want.0, got.0
        );
    }
}
