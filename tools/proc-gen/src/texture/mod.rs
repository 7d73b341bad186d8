//! Procedural texture generation
//!
//! Textures are single-channel `f32` buffers, nominally in `[0, 1]`. Operations
//! may push values outside that range (math expressions, for example); export
//! clamps when quantizing.
//!
//! # Example
//! ```no_run
//! use proc_gen::texture::*;
//!
//! let noise = PerlinConfig { octaves: 4, ..Default::default() }.generate(128, 128);
//! let mut mask = noise.clone();
//! mask.apply(Erode { kernel_size: 3, iterations: 2 });
//!
//! write_png(&mask, std::path::Path::new("mask.png"), BitDepth::Eight).unwrap();
//! ```

mod export;
mod expr;
mod modifiers;
mod noise;
mod patterns;

// Core type
pub use self::buffer::TextureBuffer;

// Basic patterns
pub use patterns::{RandomRectangles, solid};

// Noise generators
pub use noise::PerlinConfig;

// Modifiers
pub use modifiers::{
    Blur, Clip, Contrast, Dilate, Erode, KeepOverlap, TextureApply, TextureModifier,
};

// Per-pixel expressions
pub use expr::{Expr, ExprError};

// Export
pub use export::{BitDepth, write_png};

mod buffer {
    /// Grayscale texture buffer for procedural texture generation
    #[derive(Clone, Debug, PartialEq)]
    pub struct TextureBuffer {
        /// Width in pixels
        pub width: u32,
        /// Height in pixels
        pub height: u32,
        /// Pixel values (one `f32` per pixel, row-major order)
        pub pixels: Vec<f32>,
    }

    impl TextureBuffer {
        /// Create a new texture buffer initialized to black
        pub fn new(width: u32, height: u32) -> Self {
            Self::filled(width, height, 0.0)
        }

        /// Create a texture buffer filled with a constant value
        pub fn filled(width: u32, height: u32, value: f32) -> Self {
            Self {
                width,
                height,
                pixels: vec![value; width as usize * height as usize],
            }
        }

        #[inline]
        fn index(&self, x: u32, y: u32) -> usize {
            y as usize * self.width as usize + x as usize
        }

        /// Get pixel at (x, y)
        #[inline]
        pub fn get(&self, x: u32, y: u32) -> f32 {
            self.pixels[self.index(x, y)]
        }

        /// Set pixel at (x, y)
        #[inline]
        pub fn set(&mut self, x: u32, y: u32, value: f32) {
            let idx = self.index(x, y);
            self.pixels[idx] = value;
        }

        /// Whether both buffers have the same dimensions
        pub fn same_size(&self, other: &TextureBuffer) -> bool {
            self.width == other.width && self.height == other.height
        }

        /// Nearest-neighbour resample to the given dimensions.
        ///
        /// Returns a plain clone when the size already matches.
        pub fn resized(&self, width: u32, height: u32) -> TextureBuffer {
            if self.width == width && self.height == height {
                return self.clone();
            }
            let mut out = TextureBuffer::new(width, height);
            if self.width == 0 || self.height == 0 {
                return out;
            }
            for y in 0..height {
                let sy = ((y as u64 * self.height as u64) / height as u64) as u32;
                for x in 0..width {
                    let sx = ((x as u64 * self.width as u64) / width as u64) as u32;
                    out.set(x, y, self.get(sx, sy));
                }
            }
            out
        }

        /// Smallest and largest pixel value, `None` for an empty buffer
        pub fn range(&self) -> Option<(f32, f32)> {
            let mut iter = self.pixels.iter().copied();
            let first = iter.next()?;
            Some(iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_buffer_new() {
        let buf = TextureBuffer::new(64, 32);
        assert_eq!(buf.width, 64);
        assert_eq!(buf.height, 32);
        assert_eq!(buf.pixels.len(), 64 * 32);
        assert!(buf.pixels.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_texture_buffer_set_get_pixel() {
        let mut buf = TextureBuffer::new(4, 4);
        buf.set(2, 3, 0.75);
        assert_eq!(buf.get(2, 3), 0.75);
        assert_eq!(buf.get(3, 2), 0.0);
    }

    #[test]
    fn test_resize_nearest() {
        let mut buf = TextureBuffer::new(2, 2);
        buf.set(1, 0, 1.0);
        let big = buf.resized(4, 4);
        assert_eq!(big.get(2, 0), 1.0);
        assert_eq!(big.get(3, 1), 1.0);
        assert_eq!(big.get(0, 0), 0.0);
        assert_eq!(big.get(2, 2), 0.0);
    }

    #[test]
    fn test_range() {
        let mut buf = TextureBuffer::filled(3, 3, 0.5);
        buf.set(0, 0, -1.0);
        buf.set(2, 2, 2.0);
        assert_eq!(buf.range(), Some((-1.0, 2.0)));
        assert_eq!(TextureBuffer::new(0, 0).range(), None);
    }
}
