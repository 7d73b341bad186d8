//! Basic texture patterns
//!
//! Constant fills and randomly placed rectangles.

use super::TextureBuffer;
use rand::Rng;
use sceneforge_shared::gaussian;

/// Generate a constant-valued texture
pub fn solid(width: u32, height: u32, value: f32) -> TextureBuffer {
    TextureBuffer::filled(width, height, value)
}

/// Stamp axis-aligned rectangles of Gaussian-distributed size at uniformly
/// random positions. Stamped pixels are set to 1.0.
#[derive(Clone, Debug, PartialEq)]
pub struct RandomRectangles {
    /// Number of rectangles to draw
    pub count: u32,
    /// Mean rectangle width in pixels
    pub avg_width: f64,
    /// Standard deviation of the width
    pub std_width: f64,
    /// Mean rectangle height in pixels
    pub avg_height: f64,
    /// Standard deviation of the height
    pub std_height: f64,
}

impl RandomRectangles {
    /// Draw the rectangles, consuming draws from `rng`.
    ///
    /// Sizes are rounded and clamped to `[1, texture size]`, and every
    /// rectangle lies fully inside the texture.
    pub fn stamp<R: Rng + ?Sized>(&self, buffer: &mut TextureBuffer, rng: &mut R) {
        if buffer.width == 0 || buffer.height == 0 {
            return;
        }
        for _ in 0..self.count {
            let w = sample_extent(rng, self.avg_width, self.std_width, buffer.width);
            let h = sample_extent(rng, self.avg_height, self.std_height, buffer.height);
            let x0 = rng.random_range(0..=buffer.width - w);
            let y0 = rng.random_range(0..=buffer.height - h);
            for y in y0..y0 + h {
                for x in x0..x0 + w {
                    buffer.set(x, y, 1.0);
                }
            }
        }
    }
}

fn sample_extent<R: Rng + ?Sized>(rng: &mut R, mean: f64, std_dev: f64, limit: u32) -> u32 {
    let value = gaussian(rng, mean, std_dev).round();
    (value.max(1.0) as u32).min(limit)
}
