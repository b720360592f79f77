//! Seed images: the binary input the Voronoi diagram is computed from.
//!
//! A seed image is a single-channel grid; samples above the threshold are
//! foreground and become Voronoi sites. Images can be loaded from disk or
//! taken from the built-in shape catalog (selected with keys 1-4).

use anyhow::{Context, Result};
use std::path::Path;

/// Threshold separating foreground (seed) from background samples.
pub const FOREGROUND_THRESHOLD: u8 = 128;

/// Default edge length for the built-in catalog shapes.
const CATALOG_SIZE: u32 = 512;

/// Number of shapes in the built-in catalog.
pub const CATALOG_LEN: u8 = 4;

/// A W×H single-channel seed image, immutable once built.
#[derive(Clone)]
pub struct SeedImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl SeedImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// Decode an image file to greyscale. TGA, PNG and JPEG are accepted.
    pub fn from_file(path: &Path) -> Result<Self> {
        let img = image::open(path)
            .with_context(|| format!("Failed to load seed image {}", path.display()))?
            .to_luma8();
        let (width, height) = img.dimensions();
        Ok(Self::new(width, height, img.into_raw()))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw greyscale samples, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize] >= FOREGROUND_THRESHOLD
    }

    pub fn foreground_count(&self) -> usize {
        self.data
            .iter()
            .filter(|&&v| v >= FOREGROUND_THRESHOLD)
            .count()
    }
}

/// Built-in catalog standing in for the classic shape1..4 test images.
/// `index` is 1-based to match the selection keys.
pub fn catalog_shape(index: u8) -> SeedImage {
    let n = CATALOG_SIZE;
    match index {
        2 => circle_outline(n),
        3 => diagonal_bar(n),
        4 => point_grid(n),
        _ => scattered_dots(n),
    }
}

/// Shape 1: a handful of pseudo-random dots (fixed LCG, reproducible).
fn scattered_dots(n: u32) -> SeedImage {
    let mut data = vec![0u8; (n * n) as usize];
    let mut state = 0x2545_f491u32;
    for _ in 0..24 {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        let x = (state >> 16) % n;
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        let y = (state >> 16) % n;
        data[(y * n + x) as usize] = 255;
    }
    SeedImage::new(n, n, data)
}

/// Shape 2: a one-pixel circle outline centered in the texture.
fn circle_outline(n: u32) -> SeedImage {
    let mut data = vec![0u8; (n * n) as usize];
    let c = n as f32 / 2.0;
    let r = n as f32 * 0.35;
    for y in 0..n {
        for x in 0..n {
            let d = ((x as f32 - c).powi(2) + (y as f32 - c).powi(2)).sqrt();
            if (d - r).abs() < 0.7 {
                data[(y * n + x) as usize] = 255;
            }
        }
    }
    SeedImage::new(n, n, data)
}

/// Shape 3: the main diagonal.
fn diagonal_bar(n: u32) -> SeedImage {
    let mut data = vec![0u8; (n * n) as usize];
    for i in 0..n {
        data[(i * n + i) as usize] = 255;
    }
    SeedImage::new(n, n, data)
}

/// Shape 4: a sparse regular grid of points.
fn point_grid(n: u32) -> SeedImage {
    let mut data = vec![0u8; (n * n) as usize];
    let stride = n / 8;
    let mut y = stride / 2;
    while y < n {
        let mut x = stride / 2;
        while x < n {
            data[(y * n + x) as usize] = 255;
            x += stride;
        }
        y += stride;
    }
    SeedImage::new(n, n, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shapes_have_seeds() {
        for index in 1..=CATALOG_LEN {
            let shape = catalog_shape(index);
            assert_eq!(shape.width(), CATALOG_SIZE);
            assert_eq!(shape.height(), CATALOG_SIZE);
            assert!(
                shape.foreground_count() > 0,
                "shape {index} has no foreground texels"
            );
        }
    }

    #[test]
    fn test_threshold_classification() {
        let img = SeedImage::new(2, 1, vec![127, 128]);
        assert!(!img.is_foreground(0, 0));
        assert!(img.is_foreground(1, 0));
        assert_eq!(img.foreground_count(), 1);
    }

    #[test]
    fn test_diagonal_hits_corners() {
        let shape = catalog_shape(3);
        assert!(shape.is_foreground(0, 0));
        assert!(shape.is_foreground(CATALOG_SIZE - 1, CATALOG_SIZE - 1));
        assert!(!shape.is_foreground(0, CATALOG_SIZE - 1));
    }
}
