//! PNG export for texture buffers

use super::TextureBuffer;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Bit depth of an exported grayscale image
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitDepth {
    Eight,
    Sixteen,
}

impl BitDepth {
    /// Map a configured bit count to a depth, `None` unless 8 or 16
    pub fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            8 => Some(BitDepth::Eight),
            16 => Some(BitDepth::Sixteen),
            _ => None,
        }
    }

    /// Quantize pixel values (clamped to `[0, 1]`) into big-endian sample bytes
    pub fn quantize(self, texture: &TextureBuffer) -> Vec<u8> {
        match self {
            BitDepth::Eight => texture
                .pixels
                .iter()
                .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect(),
            BitDepth::Sixteen => texture
                .pixels
                .iter()
                .flat_map(|v| ((v.clamp(0.0, 1.0) * 65535.0).round() as u16).to_be_bytes())
                .collect(),
        }
    }
}

/// Write a TextureBuffer to a grayscale PNG file
///
/// # Example
/// ```no_run
/// use proc_gen::texture::{solid, write_png, BitDepth};
/// use std::path::Path;
///
/// let tex = solid(64, 64, 0.5);
/// write_png(&tex, Path::new("gray.png"), BitDepth::Eight).unwrap();
/// ```
pub fn write_png(texture: &TextureBuffer, path: &Path, depth: BitDepth) -> std::io::Result<()> {
    let file = File::create(path)?;
    let w = BufWriter::new(file);

    let mut encoder = png::Encoder::new(w, texture.width, texture.height);
    encoder.set_color(png::ColorType::Grayscale);
    encoder.set_depth(match depth {
        BitDepth::Eight => png::BitDepth::Eight,
        BitDepth::Sixteen => png::BitDepth::Sixteen,
    });
    encoder.set_compression(png::Compression::Default);

    let mut writer = encoder
        .write_header()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    writer
        .write_image_data(&depth.quantize(texture))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    Ok(())
}
