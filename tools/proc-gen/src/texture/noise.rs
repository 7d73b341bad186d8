//! Noise-based texture generation using the `noise` crate
//!
//! Perlin noise with fractal Brownian motion (fBm) for multi-octave output.
//! Coordinates are normalized to the texture size, so the base frequency counts
//! lattice cells across the whole image independent of its resolution.

use super::TextureBuffer;
use noise::{NoiseFn, Perlin};

/// Configuration for Perlin noise generation
#[derive(Clone, Debug, PartialEq)]
pub struct PerlinConfig {
    /// Number of octaves for fractal noise
    pub octaves: u32,
    /// Persistence (amplitude multiplier per octave)
    pub persistence: f64,
    /// Lacunarity (frequency multiplier per octave)
    pub lacunarity: f64,
    /// Lattice cells across the image for the first octave
    pub frequency: f64,
    /// Random seed
    pub seed: u32,
}

impl Default for PerlinConfig {
    fn default() -> Self {
        Self {
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            frequency: 1.0,
            seed: 0,
        }
    }
}

impl PerlinConfig {
    /// Create a new Perlin config with the given seed
    pub fn with_seed(seed: u32) -> Self {
        Self {
            seed,
            ..Default::default()
        }
    }

    /// Generate a texture using Perlin noise, mapped to `[0, 1]`
    pub fn generate(&self, width: u32, height: u32) -> TextureBuffer {
        let perlin = Perlin::new(self.seed);
        let mut buffer = TextureBuffer::new(width, height);
        let w = width.max(1) as f64;
        let h = height.max(1) as f64;

        for y in 0..height {
            for x in 0..width {
                let value = self.sample_fbm(&perlin, x as f64 / w, y as f64 / h);
                buffer.set(x, y, (value.clamp(-1.0, 1.0) * 0.5 + 0.5) as f32);
            }
        }
        buffer
    }

    /// Sample fractal Brownian motion (multi-octave noise)
    fn sample_fbm<N: NoiseFn<f64, 2>>(&self, noise: &N, x: f64, y: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_value = 0.0;

        for _ in 0..self.octaves {
            total += noise.get([x * frequency, y * frequency]) * amplitude;
            max_value += amplitude;
            amplitude *= self.persistence;
            frequency *= self.lacunarity;
        }

        if max_value == 0.0 {
            return 0.0;
        }
        total / max_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perlin_default() {
        let config = PerlinConfig::default();
        assert_eq!(config.octaves, 4);
        assert_eq!(config.seed, 0);
    }

    #[test]
    fn test_perlin_generate_in_unit_range() {
        let config = PerlinConfig {
            frequency: 4.0,
            ..PerlinConfig::with_seed(42)
        };
        let tex = config.generate(64, 64);

        assert_eq!(tex.width, 64);
        assert_eq!(tex.height, 64);
        assert!(tex.pixels.iter().all(|&p| (0.0..=1.0).contains(&p)));

        let (lo, hi) = tex.range().unwrap();
        assert!(hi > lo, "Perlin noise should have variation");
    }

    #[test]
    fn test_perlin_deterministic() {
        let config = PerlinConfig::with_seed(123);
        let tex1 = config.generate(32, 32);
        let tex2 = config.generate(32, 32);
        assert_eq!(tex1.pixels, tex2.pixels);
    }

    #[test]
    fn test_perlin_seed_changes_output() {
        let a = PerlinConfig { frequency: 3.0, ..PerlinConfig::with_seed(1) }.generate(32, 32);
        let b = PerlinConfig { frequency: 3.0, ..PerlinConfig::with_seed(2) }.generate(32, 32);
        assert_ne!(a.pixels, b.pixels);
    }

    #[test]
    fn test_zero_octaves_is_flat_gray() {
        let tex = PerlinConfig { octaves: 0, ..Default::default() }.generate(8, 8);
        assert!(tex.pixels.iter().all(|&p| p == 0.5));
    }
}
