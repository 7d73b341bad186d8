//! Texture definitions parsed from resolved (evaluator-free) values.

use proc_gen::texture::{BitDepth, Expr, RandomRectangles};
use serde_json::{Map, Value};

use super::TextureError;

/// Image config of a texture definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureConfig {
    pub width: u32,
    pub height: u32,
    pub bit_depth: BitDepth,
    pub seed: u64,
    pub num_textures: usize,
}

/// Perlin parameters; the noise seed is drawn per instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PerlinOp {
    pub octaves: u32,
    pub frequency: f64,
    pub persistence: f64,
    pub lacunarity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Perlin(PerlinOp),
    MathExpression(Expr),
    InputTexture(String),
    Erode { kernel_size: u32, iterations: u32 },
    Dilate { kernel_size: u32, iterations: u32 },
    Clip { min: f32, max: f32 },
    Blur { kernel_size: u32 },
    Contrast(f32),
    KeepOverlap(String),
    RandomRectangles(RandomRectangles),
}

impl Operation {
    /// Ids of the textures this operation reads.
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            Operation::MathExpression(expr) => expr.variables().iter().map(String::as_str).collect(),
            Operation::InputTexture(id) | Operation::KeepOverlap(id) => vec![id.as_str()],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDefinition {
    pub id: String,
    pub config: TextureConfig,
    pub ops: Vec<Operation>,
}

impl TextureDefinition {
    /// Parse a `textures/<id>` value whose evaluators are already resolved.
    pub fn from_value(id: &str, value: &Value) -> Result<Self, TextureError> {
        let p = Params { texture: id };
        let fields = p.object(value, "definition")?;
        let config = p.config(p.field(fields, "config")?)?;

        let ops = p
            .field(fields, "ops")?
            .as_array()
            .ok_or_else(|| p.invalid("ops must be a list"))?;
        if ops.is_empty() {
            return Err(p.invalid("ops must not be empty"));
        }
        let ops = ops.iter().map(|op| p.operation(op)).collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: id.to_string(),
            config,
            ops,
        })
    }

    /// Referenced texture ids in first-use order, without duplicates.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        for dep in self.ops.iter().flat_map(Operation::dependencies) {
            if !deps.contains(&dep) {
                deps.push(dep);
            }
        }
        deps
    }
}

/// Parameter readers that tag failures with the texture id.
struct Params<'a> {
    texture: &'a str,
}

impl Params<'_> {
    fn invalid(&self, message: impl Into<String>) -> TextureError {
        TextureError::InvalidParameter {
            texture: self.texture.to_string(),
            message: message.into(),
        }
    }

    fn object<'v>(&self, value: &'v Value, what: &str) -> Result<&'v Map<String, Value>, TextureError> {
        value
            .as_object()
            .ok_or_else(|| self.invalid(format!("{what} must be a mapping")))
    }

    fn field<'v>(&self, map: &'v Map<String, Value>, key: &str) -> Result<&'v Value, TextureError> {
        map.get(key).ok_or_else(|| self.invalid(format!("missing '{key}'")))
    }

    fn number(&self, value: &Value, name: &str) -> Result<f64, TextureError> {
        value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid(format!("{name} must be a number, found {value}")))
    }

    /// Non-negative whole number; sampled floats are rounded.
    fn count(&self, value: &Value, name: &str) -> Result<u64, TextureError> {
        if let Some(n) = value.as_u64() {
            return Ok(n);
        }
        match value.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 => Ok(f.round() as u64),
            _ => Err(self.invalid(format!(
                "{name} must be a non-negative integer, found {value}"
            ))),
        }
    }

    fn small(&self, value: &Value, name: &str) -> Result<u32, TextureError> {
        let n = self.count(value, name)?;
        u32::try_from(n).map_err(|_| self.invalid(format!("{name} is too large: {n}")))
    }

    fn positive(&self, value: &Value, name: &str) -> Result<u32, TextureError> {
        match self.small(value, name)? {
            0 => Err(self.invalid(format!("{name} must be at least 1"))),
            n => Ok(n),
        }
    }

    fn optional<T>(
        &self,
        map: &Map<String, Value>,
        key: &str,
        default: T,
        read: impl FnOnce(&Value) -> Result<T, TextureError>,
    ) -> Result<T, TextureError> {
        map.get(key).map_or(Ok(default), read)
    }

    fn reference(&self, value: &Value, name: &str) -> Result<String, TextureError> {
        value
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| self.invalid(format!("{name} must name a texture, found {value}")))
    }

    fn config(&self, value: &Value) -> Result<TextureConfig, TextureError> {
        let map = self.object(value, "config")?;

        let size = self
            .field(map, "image_size")?
            .as_array()
            .filter(|s| s.len() == 2)
            .ok_or_else(|| self.invalid("image_size must be [rows, cols]"))?;
        let height = self.positive(&size[0], "image_size rows")?;
        let width = self.positive(&size[1], "image_size cols")?;

        let depth = self.field(map, "bit_depth")?;
        let bit_depth = depth
            .as_u64()
            .and_then(BitDepth::from_bits)
            .ok_or_else(|| TextureError::BitDepth {
                texture: self.texture.to_string(),
                found: depth.to_string(),
            })?;

        let seed = self.optional(map, "seed", 0, |v| self.count(v, "seed"))?;
        let num_textures = self.optional(map, "num_textures", 1, |v| {
            match self.count(v, "num_textures")? {
                0 => Err(self.invalid("num_textures must be at least 1")),
                n => Ok(n as usize),
            }
        })?;

        Ok(TextureConfig {
            width,
            height,
            bit_depth,
            seed,
            num_textures,
        })
    }

    fn operation(&self, value: &Value) -> Result<Operation, TextureError> {
        let map = self.object(value, "operation")?;
        let mut entries = map.iter();
        let (name, params) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(self.invalid("each operation must have exactly one key")),
        };

        match name.as_str() {
            "perlin" => {
                let map = self.object(params, "perlin")?;
                Ok(Operation::Perlin(PerlinOp {
                    octaves: self.positive(self.field(map, "octaves")?, "octaves")?,
                    frequency: self.optional(map, "frequency", 1.0, |v| self.number(v, "frequency"))?,
                    persistence: self.optional(map, "persistence", 0.5, |v| {
                        self.number(v, "persistence")
                    })?,
                    lacunarity: self.optional(map, "lacunarity", 2.0, |v| {
                        self.number(v, "lacunarity")
                    })?,
                }))
            }
            "math_expression" => {
                let source = params
                    .as_str()
                    .ok_or_else(|| self.invalid("math_expression must be a string"))?;
                Expr::parse(source)
                    .map(Operation::MathExpression)
                    .map_err(|source| TextureError::Expression {
                        texture: self.texture.to_string(),
                        source,
                    })
            }
            "input_texture" => Ok(Operation::InputTexture(self.reference(params, "input_texture")?)),
            "erode" | "dilate" => {
                let map = self.object(params, name)?;
                let kernel_size = self.positive(self.field(map, "kernel_size")?, "kernel_size")?;
                let iterations = self.optional(map, "iterations", 1, |v| self.small(v, "iterations"))?;
                Ok(if name == "erode" {
                    Operation::Erode {
                        kernel_size,
                        iterations,
                    }
                } else {
                    Operation::Dilate {
                        kernel_size,
                        iterations,
                    }
                })
            }
            "clip" => {
                let bounds = params
                    .as_array()
                    .filter(|b| b.len() == 2)
                    .ok_or_else(|| self.invalid("clip must be [min, max]"))?;
                let min = self.number(&bounds[0], "clip min")?;
                let max = self.number(&bounds[1], "clip max")?;
                if min > max {
                    return Err(self.invalid(format!("clip min {min} exceeds max {max}")));
                }
                Ok(Operation::Clip {
                    min: min as f32,
                    max: max as f32,
                })
            }
            "blur" => {
                let map = self.object(params, "blur")?;
                Ok(Operation::Blur {
                    kernel_size: self.positive(self.field(map, "kernel_size")?, "kernel_size")?,
                })
            }
            "contrast" => Ok(Operation::Contrast(self.number(params, "contrast")? as f32)),
            "keep_overlap" => {
                let map = self.object(params, "keep_overlap")?;
                Ok(Operation::KeepOverlap(
                    self.reference(self.field(map, "texture")?, "keep_overlap texture")?,
                ))
            }
            "random_rectangles" => {
                let map = self.object(params, "random_rectangles")?;
                let std = |key: &str| -> Result<f64, TextureError> {
                    let v = self.number(self.field(map, key)?, key)?;
                    if v < 0.0 {
                        return Err(self.invalid(format!("{key} must not be negative")));
                    }
                    Ok(v)
                };
                Ok(Operation::RandomRectangles(RandomRectangles {
                    count: self.small(self.field(map, "num_rectangles")?, "num_rectangles")?,
                    avg_width: self.number(self.field(map, "avg_width")?, "avg_width")?,
                    std_width: std("std_width")?,
                    avg_height: self.number(self.field(map, "avg_height")?, "avg_height")?,
                    std_height: std("std_height")?,
                }))
            }
            other => Err(self.invalid(format!("unknown operation '{other}'"))),
        }
    }
}
