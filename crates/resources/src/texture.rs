//! RGBA8 pixel buffers.
//!
//! Images are decoded with the `image` crate and always converted to four
//! channels, whatever the source format.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

pub type Rgba = [u8; 4];

/// Tightly packed, row-major RGBA8 pixels with the top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureData {
    /// Wraps tightly packed RGBA8 rows, top row first.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ZeroDimensions`] or
    /// [`ResourceError::PixelSizeMismatch`] when `pixels` does not hold
    /// exactly `width * height` texels.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> ResourceResult<Self> {
        if width == 0 || height == 0 {
            return Err(ResourceError::ZeroDimensions(width, height));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(ResourceError::PixelSizeMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decodes any format the `image` crate was built with into RGBA8.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::FileNotFound`] for a missing path and
    /// [`ResourceError::Image`] when decoding fails.
    pub fn load(path: &Path) -> ResourceResult<Self> {
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }
        let decoded = image::open(path)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        debug!("Decoded texture {:?}: {}x{}", path, width, height);
        Self::new(width, height, decoded.into_raw())
    }

    pub fn solid(width: u32, height: u32, color: Rgba) -> ResourceResult<Self> {
        let count = width as usize * height as usize;
        Self::new(width, height, color.repeat(count))
    }

    /// Square checkerboard of `cells` x `cells` squares, starting with `a`
    /// in the top-left corner.
    pub fn checkerboard(size: u32, cells: u32, a: Rgba, b: Rgba) -> ResourceResult<Self> {
        let cell = (size / cells.max(1)).max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let even = ((x / cell) + (y / cell)) % 2 == 0;
                pixels.extend_from_slice(if even { &a } else { &b });
            }
        }
        Self::new(size, size, pixels)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba = [0, 0, 0, 255];
    const WHITE: Rgba = [255, 255, 255, 255];

    #[test]
    fn test_new_checks_length() {
        assert!(TextureData::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            TextureData::new(2, 2, vec![0; 12]),
            Err(ResourceError::PixelSizeMismatch {
                expected: 16,
                actual: 12,
                ..
            })
        ));
        assert!(matches!(
            TextureData::new(0, 4, Vec::new()),
            Err(ResourceError::ZeroDimensions(0, 4))
        ));
    }

    #[test]
    fn test_solid() {
        let tex = TextureData::solid(3, 2, [10, 20, 30, 40]).unwrap();
        assert_eq!(tex.pixels().len(), 24);
        assert_eq!(tex.pixel(2, 1), Some([10, 20, 30, 40]));
        assert_eq!(tex.pixel(3, 0), None);
    }

    #[test]
    fn test_checkerboard_cells() {
        let tex = TextureData::checkerboard(8, 4, WHITE, BLACK).unwrap();
        assert_eq!(tex.width(), 8);
        assert_eq!(tex.pixel(0, 0), Some(WHITE));
        assert_eq!(tex.pixel(1, 1), Some(WHITE));
        assert_eq!(tex.pixel(2, 0), Some(BLACK));
        assert_eq!(tex.pixel(0, 2), Some(BLACK));
        assert_eq!(tex.pixel(2, 2), Some(WHITE));
    }

    #[test]
    fn test_load_missing_file() {
        let err = TextureData::load(Path::new("definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, ResourceError::FileNotFound(_)));
    }
}
