//! Texture modifiers for post-processing
//!
//! Provides a trait-based system for applying modifications to textures.
//! Each modifier rewrites the buffer in place.

use super::TextureBuffer;

/// Trait for texture modifiers
pub trait TextureModifier {
    /// Apply the modification to the texture buffer
    fn apply(&self, buffer: &mut TextureBuffer);
}

/// Extension trait for fluent modifier application
pub trait TextureApply {
    /// Apply a modifier and return self for chaining
    fn apply<M: TextureModifier>(&mut self, modifier: M) -> &mut Self;
}

impl TextureApply for TextureBuffer {
    fn apply<M: TextureModifier>(&mut self, modifier: M) -> &mut Self {
        modifier.apply(self);
        self
    }
}

/// Adjust contrast of the texture about the 0.5 midpoint
pub struct Contrast {
    /// Contrast factor (1.0 = no change, >1 = more contrast, <1 = less)
    pub factor: f32,
}

impl TextureModifier for Contrast {
    fn apply(&self, buffer: &mut TextureBuffer) {
        for v in buffer.pixels.iter_mut() {
            *v = ((*v - 0.5) * self.factor + 0.5).clamp(0.0, 1.0);
        }
    }
}

/// Clamp pixel values into `[min, max]`
pub struct Clip {
    pub min: f32,
    pub max: f32,
}

impl TextureModifier for Clip {
    fn apply(&self, buffer: &mut TextureBuffer) {
        for v in buffer.pixels.iter_mut() {
            *v = v.max(self.min).min(self.max);
        }
    }
}

/// Gaussian blur with a square kernel.
///
/// `kernel_size` should be odd; an even size behaves like the next odd one.
/// Sigma is derived from the kernel size. Borders are reflected without
/// repeating the edge pixel.
pub struct Blur {
    pub kernel_size: u32,
}

impl Blur {
    fn kernel(&self) -> Vec<f32> {
        let radius = (self.kernel_size / 2) as i32;
        let size = (2 * radius + 1) as usize;
        let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
        let mut weights: Vec<f64> = (-radius..=radius)
            .map(|i| (-(i * i) as f64 / (2.0 * sigma * sigma)).exp())
            .collect();
        let sum: f64 = weights.iter().sum();
        for w in weights.iter_mut() {
            *w /= sum;
        }
        weights.into_iter().map(|w| w as f32).collect()
    }
}

impl TextureModifier for Blur {
    fn apply(&self, buffer: &mut TextureBuffer) {
        if self.kernel_size <= 1 || buffer.pixels.is_empty() {
            return;
        }
        let kernel = self.kernel();
        let radius = (kernel.len() / 2) as i64;
        let (w, h) = (buffer.width as i64, buffer.height as i64);

        let mut horizontal = TextureBuffer::new(buffer.width, buffer.height);
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect_101(x + k as i64 - radius, w);
                    acc += weight * buffer.get(sx as u32, y as u32);
                }
                horizontal.set(x as u32, y as u32, acc);
            }
        }
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sy = reflect_101(y + k as i64 - radius, h);
                    acc += weight * horizontal.get(x as u32, sy as u32);
                }
                buffer.set(x as u32, y as u32, acc);
            }
        }
    }
}

/// Mirror an out-of-range index back into `[0, len)` (`dcb|abcd|cba`).
fn reflect_101(i: i64, len: i64) -> i64 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let m = i.rem_euclid(period);
    if m < len { m } else { period - m }
}

/// Morphological erosion: minimum over a square window, repeated
pub struct Erode {
    pub kernel_size: u32,
    pub iterations: u32,
}

impl TextureModifier for Erode {
    fn apply(&self, buffer: &mut TextureBuffer) {
        for _ in 0..self.iterations {
            morph(buffer, self.kernel_size, f32::min);
        }
    }
}

/// Morphological dilation: maximum over a square window, repeated
pub struct Dilate {
    pub kernel_size: u32,
    pub iterations: u32,
}

impl TextureModifier for Dilate {
    fn apply(&self, buffer: &mut TextureBuffer) {
        for _ in 0..self.iterations {
            morph(buffer, self.kernel_size, f32::max);
        }
    }
}

/// Separable rank filter over a `size x size` window anchored at its center.
/// Window positions outside the image are ignored.
fn morph(buffer: &mut TextureBuffer, size: u32, pick: fn(f32, f32) -> f32) {
    if size <= 1 || buffer.pixels.is_empty() {
        return;
    }
    let before = (size / 2) as i64;
    let after = size as i64 - 1 - before;
    let (w, h) = (buffer.width as i64, buffer.height as i64);

    let mut rows = TextureBuffer::new(buffer.width, buffer.height);
    for y in 0..h {
        for x in 0..w {
            let lo = (x - before).max(0);
            let hi = (x + after).min(w - 1);
            let mut acc = buffer.get(lo as u32, y as u32);
            for sx in lo + 1..=hi {
                acc = pick(acc, buffer.get(sx as u32, y as u32));
            }
            rows.set(x as u32, y as u32, acc);
        }
    }
    for y in 0..h {
        let lo = (y - before).max(0);
        let hi = (y + after).min(h - 1);
        for x in 0..w {
            let mut acc = rows.get(x as u32, lo as u32);
            for sy in lo + 1..=hi {
                acc = pick(acc, rows.get(x as u32, sy as u32));
            }
            buffer.set(x as u32, y as u32, acc);
        }
    }
}

/// Zero every pixel where the mask texture is zero
pub struct KeepOverlap<'a> {
    /// Mask texture, resampled when its size differs
    pub mask: &'a TextureBuffer,
}

impl TextureModifier for KeepOverlap<'_> {
    fn apply(&self, buffer: &mut TextureBuffer) {
        let resized;
        let mask = if self.mask.same_size(buffer) {
            self.mask
        } else {
            resized = self.mask.resized(buffer.width, buffer.height);
            &resized
        };
        for (v, m) in buffer.pixels.iter_mut().zip(mask.pixels.iter()) {
            if *m == 0.0 {
                *v = 0.0;
            }
        }
    }
}
