//! Procedural texture operations for sceneforge
//!
//! Grayscale floating-point image buffers plus the operations the texture
//! pipeline chains together: fractal noise, morphology, blur, contrast,
//! clipping, masking, rectangle stamping and per-pixel math expressions.
//!
//! # Example
//! ```no_run
//! use proc_gen::texture::*;
//! use std::path::Path;
//!
//! let mut tex = PerlinConfig::with_seed(42).generate(256, 256);
//! tex.apply(Contrast { factor: 1.5 })
//!    .apply(Blur { kernel_size: 5 })
//!    .apply(Clip { min: 0.2, max: 0.8 });
//!
//! write_png(&tex, Path::new("mask.png"), BitDepth::Sixteen)?;
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod texture;
