//! Evaluator expressions.
//!
//! An evaluator is a single-key mapping whose key names the kind
//! (`{uniform: [0, 1]}`), or a `$global.<name>` string referring to a
//! declared global evaluator. Resolving a document replaces every
//! evaluator with a concrete value for one step.
//!
//! # Random streams
//!
//! Each step owns one [`rand_pcg::Pcg64`] seeded from the run seed and the
//! step index. Every evaluator kind draws from that one stream: global
//! evaluators first in declaration order, then the document depth-first in
//! document order. Steps are independent of each other, so they can be
//! resolved in any order or in parallel.

mod parse;
mod resolve;
mod sampler;

use serde_json::Value;

use crate::catalog::AssetType;
use crate::error::ResolveError;

pub use resolve::{ResolvedDocument, StepResolver, resolve_step};

/// Tag of every evaluator kind recognized in a mapping.
pub const EVALUATOR_TAGS: &[&str] = &[
    "constant",
    "linear",
    "normal",
    "uniform",
    "step",
    "random_selection",
    "selection_asset",
    "selection_wildcard",
    "wildcard",
    "selection_folder",
];

/// Prefix of a global evaluator reference.
pub const GLOBAL_PREFIX: &str = "$global.";

/// Numeric argument of a distribution: a scalar or a 3-component vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    Scalar(f64),
    Vector([f64; 3]),
}

impl Operand {
    /// Apply `f` component-wise, broadcasting a scalar against a vector.
    ///
    /// Components are visited in order, so random draws inside `f` happen
    /// x, y, z.
    pub(crate) fn zip_with(self, other: Operand, mut f: impl FnMut(f64, f64) -> f64) -> Operand {
        match (self, other) {
            (Operand::Scalar(a), Operand::Scalar(b)) => Operand::Scalar(f(a, b)),
            (a, b) => {
                let (a, b) = (a.components(), b.components());
                Operand::Vector([f(a[0], b[0]), f(a[1], b[1]), f(a[2], b[2])])
            }
        }
    }

    fn components(self) -> [f64; 3] {
        match self {
            Operand::Scalar(v) => [v; 3],
            Operand::Vector(v) => v,
        }
    }

    /// JSON form of the operand; NaN and infinities have none.
    pub(crate) fn to_value(self, evaluator: &'static str) -> Result<Value, ResolveError> {
        let number = |v: f64| {
            serde_json::Number::from_f64(v)
                .map(Value::Number)
                .ok_or(ResolveError::NonFinite { evaluator, value: v })
        };
        match self {
            Operand::Scalar(v) => number(v),
            Operand::Vector(v) => Ok(Value::Array(
                v.iter().copied().map(number).collect::<Result<_, _>>()?,
            )),
        }
    }
}

/// A parsed evaluator expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluator {
    /// Always the given value.
    Constant(Value),
    /// `start + increment * step`.
    Linear { start: Operand, increment: Operand },
    /// Gaussian draw per component.
    Normal { mean: Operand, std_dev: Operand },
    /// Uniform draw in `[low, high)` per component.
    Uniform { low: Operand, high: Operand },
    /// `choices[step % len]`.
    Step(Vec<Value>),
    /// Uniformly random element of the list.
    RandomSelection(Vec<Value>),
    /// Random catalog entry of one type in one library, as `"library/key"`.
    SelectionAsset {
        library: String,
        asset_type: AssetType,
    },
    /// Random catalog entry whose key matches a glob, as `"library/key"`.
    SelectionWildcard { library: String, pattern: String },
    /// Value of a global evaluator for the current step.
    GlobalRef(String),
}

impl Evaluator {
    /// Short name of the evaluator kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Evaluator::Constant(_) => "constant",
            Evaluator::Linear { .. } => "linear",
            Evaluator::Normal { .. } => "normal",
            Evaluator::Uniform { .. } => "uniform",
            Evaluator::Step(_) => "step",
            Evaluator::RandomSelection(_) => "random_selection",
            Evaluator::SelectionAsset { .. } => "selection_asset",
            Evaluator::SelectionWildcard { .. } => "selection_wildcard",
            Evaluator::GlobalRef(_) => "global",
        }
    }

    /// Literal values this evaluator can yield without sampling a distribution.
    pub fn literal_choices(&self) -> &[Value] {
        match self {
            Evaluator::Constant(value) => std::slice::from_ref(value),
            Evaluator::Step(choices) | Evaluator::RandomSelection(choices) => choices,
            _ => &[],
        }
    }
}
