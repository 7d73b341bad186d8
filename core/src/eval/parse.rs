use serde_json::{Map, Value};

use super::{EVALUATOR_TAGS, Evaluator, GLOBAL_PREFIX, Operand};
use crate::catalog::AssetType;
use crate::document::DocPath;
use crate::error::ConfigError;

impl Evaluator {
    /// Recognize an evaluator mapping.
    ///
    /// Returns `Ok(None)` for ordinary mappings. A single-key mapping whose
    /// key is an evaluator tag must be well formed.
    pub(crate) fn from_mapping(
        map: &Map<String, Value>,
        path: &DocPath,
    ) -> Result<Option<Self>, ConfigError> {
        if map.len() != 1 {
            return Ok(None);
        }
        let Some((tag, params)) = map.iter().next() else {
            return Ok(None);
        };
        if !EVALUATOR_TAGS.contains(&tag.as_str()) {
            return Ok(None);
        }
        let err = |message: String| ConfigError::new(path.pointer(), message);

        let evaluator = match tag.as_str() {
            "constant" => Evaluator::Constant(params.clone()),
            "linear" => {
                let [start, increment] = operand_pair(tag, params).map_err(err)?;
                Evaluator::Linear { start, increment }
            }
            "normal" => {
                let [mean, std_dev] = operand_pair(tag, params).map_err(err)?;
                if has_negative(std_dev) {
                    return Err(err("normal: standard deviation must not be negative".into()));
                }
                Evaluator::Normal { mean, std_dev }
            }
            "uniform" => {
                let [low, high] = operand_pair(tag, params).map_err(err)?;
                let (lows, highs) = (low.components(), high.components());
                if lows.iter().zip(&highs).any(|(l, h)| l > h) {
                    return Err(err("uniform: low must not exceed high".into()));
                }
                Evaluator::Uniform { low, high }
            }
            "step" => Evaluator::Step(choices(tag, params).map_err(err)?),
            "random_selection" => Evaluator::RandomSelection(choices(tag, params).map_err(err)?),
            "selection_asset" => {
                let library = string_field(tag, params, "library").map_err(err)?;
                let type_name = string_field(tag, params, "type").map_err(err)?;
                let asset_type = AssetType::parse(&type_name)
                    .ok_or_else(|| err(format!("selection_asset: unknown asset type '{type_name}'")))?;
                Evaluator::SelectionAsset {
                    library,
                    asset_type,
                }
            }
            "selection_wildcard" | "wildcard" => Evaluator::SelectionWildcard {
                library: string_field(tag, params, "library").map_err(err)?,
                pattern: string_field(tag, params, "pattern").map_err(err)?,
            },
            "selection_folder" => {
                return Err(err(
                    "selection_folder is not supported; catalog assets with selection_wildcard instead"
                        .into(),
                ));
            }
            _ => return Ok(None),
        };
        Ok(Some(evaluator))
    }

    /// Recognize a `$global.<name>` reference.
    pub(crate) fn from_string(text: &str, path: &DocPath) -> Result<Option<Self>, ConfigError> {
        let Some(name) = text.strip_prefix(GLOBAL_PREFIX) else {
            return Ok(None);
        };
        if name.is_empty() {
            return Err(ConfigError::new(
                path.pointer(),
                "global reference is missing an evaluator name",
            ));
        }
        Ok(Some(Evaluator::GlobalRef(name.to_string())))
    }
}

fn operand_pair(tag: &str, params: &Value) -> Result<[Operand; 2], String> {
    match params.as_array().map(Vec::as_slice) {
        Some([a, b]) => Ok([operand(tag, a)?, operand(tag, b)?]),
        _ => Err(format!("{tag}: expected a list of two operands")),
    }
}

fn operand(tag: &str, value: &Value) -> Result<Operand, String> {
    if let Some(v) = value.as_f64() {
        return Ok(Operand::Scalar(v));
    }
    let Some(items) = value.as_array() else {
        return Err(format!("{tag}: operands must be numbers or 3-component vectors"));
    };
    if items.len() != 3 {
        return Err(format!(
            "{tag}: vector operands must have exactly 3 components, found {}",
            items.len()
        ));
    }
    let mut out = [0.0; 3];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = item
            .as_f64()
            .ok_or_else(|| format!("{tag}: vector components must be numbers"))?;
    }
    Ok(Operand::Vector(out))
}

fn has_negative(operand: Operand) -> bool {
    match operand {
        Operand::Scalar(v) => v < 0.0,
        Operand::Vector(v) => v.iter().any(|c| *c < 0.0),
    }
}

fn choices(tag: &str, params: &Value) -> Result<Vec<Value>, String> {
    match params.as_array() {
        Some(items) if !items.is_empty() => Ok(items.clone()),
        _ => Err(format!("{tag}: expected a non-empty list")),
    }
}

fn string_field(tag: &str, params: &Value, field: &str) -> Result<String, String> {
    params
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("{tag}: missing string field '{field}'"))
}
