use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use sceneforge_shared::{gaussian, step_seed};
use serde_json::Value;

use super::Evaluator;
use crate::catalog::{Catalog, CatalogEntry};
use crate::error::ResolveError;

/// Per-step evaluation state: the step's random stream and the resolved
/// global table.
pub(crate) struct Sampler<'a> {
    step: usize,
    rng: Pcg64,
    catalog: &'a Catalog,
    globals: IndexMap<String, Value>,
}

impl<'a> Sampler<'a> {
    pub(crate) fn new(catalog: &'a Catalog, run_seed: u64, step: usize) -> Self {
        Self {
            step,
            rng: Pcg64::seed_from_u64(step_seed(run_seed, step)),
            catalog,
            globals: IndexMap::new(),
        }
    }

    pub(crate) fn define_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub(crate) fn into_globals(self) -> IndexMap<String, Value> {
        self.globals
    }

    pub(crate) fn evaluate(&mut self, evaluator: &Evaluator) -> Result<Value, ResolveError> {
        let step = self.step;
        let rng = &mut self.rng;
        let value = match evaluator {
            Evaluator::Constant(value) => value.clone(),
            Evaluator::Linear { start, increment } => start
                .zip_with(*increment, |s, i| s + i * step as f64)
                .to_value("linear")?,
            Evaluator::Normal { mean, std_dev } => mean
                .zip_with(*std_dev, |m, s| gaussian(rng, m, s))
                .to_value("normal")?,
            Evaluator::Uniform { low, high } => low
                .zip_with(*high, |l, h| l + (h - l) * rng.random::<f64>())
                .to_value("uniform")?,
            Evaluator::Step(choices) => choices[step % choices.len()].clone(),
            Evaluator::RandomSelection(choices) => {
                choices[rng.random_range(0..choices.len())].clone()
            }
            Evaluator::SelectionAsset {
                library,
                asset_type,
            } => {
                let candidates = self.library_assets(library, |e| e.asset_type == *asset_type)?;
                let filter = format!("type '{asset_type}'");
                self.pick(library, candidates, filter)?
            }
            Evaluator::SelectionWildcard { library, pattern } => {
                let catalog = self.catalog;
                let candidates = catalog.resolve_wildcard(library, pattern)?;
                let filter = format!("pattern '{pattern}'");
                self.pick(library, candidates, filter)?
            }
            Evaluator::GlobalRef(name) => self
                .globals
                .get(name)
                .cloned()
                .ok_or_else(|| ResolveError::UnknownGlobalEvaluator(name.clone()))?,
        };
        Ok(value)
    }

    fn library_assets(
        &self,
        library: &str,
        filter: impl Fn(&CatalogEntry) -> bool,
    ) -> Result<Vec<&'a CatalogEntry>, ResolveError> {
        let lib = self
            .catalog
            .library(library)
            .ok_or_else(|| ResolveError::UnknownLibrary(library.to_string()))?;
        Ok(lib.assets.values().filter(|e| filter(e)).collect())
    }

    fn pick(
        &mut self,
        library: &str,
        candidates: Vec<&CatalogEntry>,
        filter: String,
    ) -> Result<Value, ResolveError> {
        if candidates.is_empty() {
            return Err(ResolveError::AssetNotFound {
                library: library.to_string(),
                filter,
            });
        }
        let entry = candidates[self.rng.random_range(0..candidates.len())];
        Ok(Value::String(entry.reference()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Operand;
    use serde_json::json;

    #[test]
    fn test_linear_uses_step_index() {
        let catalog = Catalog::default();
        let evaluator = Evaluator::Linear {
            start: Operand::Vector([0.0; 3]),
            increment: Operand::Vector([1.0, 0.0, 0.0]),
        };
        let values: Vec<_> = (0..3)
            .map(|step| Sampler::new(&catalog, 0, step).evaluate(&evaluator).unwrap())
            .collect();
        assert_eq!(
            values,
            [json!([0.0, 0.0, 0.0]), json!([1.0, 0.0, 0.0]), json!([2.0, 0.0, 0.0])]
        );
    }

    #[test]
    fn test_step_cycles_through_choices() {
        let catalog = Catalog::default();
        let evaluator = Evaluator::Step(vec![json!("a"), json!("b"), json!("c")]);
        let picks: Vec<_> = [0, 1, 2, 3, 4]
            .iter()
            .map(|step| Sampler::new(&catalog, 9, *step).evaluate(&evaluator).unwrap())
            .collect();
        assert_eq!(picks, [json!("a"), json!("b"), json!("c"), json!("a"), json!("b")]);
    }

    #[test]
    fn test_uniform_range_and_mean() {
        let catalog = Catalog::default();
        let evaluator = Evaluator::Uniform {
            low: Operand::Scalar(0.0),
            high: Operand::Scalar(1.0),
        };
        let mut sampler = Sampler::new(&catalog, 42, 0);
        let n = 10_000;
        let mut sum = 0.0;
        for _ in 0..n {
            let v = sampler.evaluate(&evaluator).unwrap().as_f64().unwrap();
            assert!((0.0..1.0).contains(&v));
            sum += v;
        }
        let mean = sum / n as f64;
        assert!((mean - 0.5).abs() < 0.02, "mean was {mean}");
    }

    #[test]
    fn test_normal_with_vector_mean_broadcasts_scalar_std() {
        let catalog = Catalog::default();
        let evaluator = Evaluator::Normal {
            mean: Operand::Vector([1.0, 2.0, 3.0]),
            std_dev: Operand::Scalar(0.0),
        };
        let value = Sampler::new(&catalog, 1, 0).evaluate(&evaluator).unwrap();
        assert_eq!(value, json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_non_finite_sample_is_an_error() {
        let catalog = Catalog::default();
        let evaluator = Evaluator::Linear {
            start: Operand::Vector([0.0, f64::MAX, 0.0]),
            increment: Operand::Scalar(f64::MAX),
        };
        assert!(Sampler::new(&catalog, 0, 0).evaluate(&evaluator).is_ok());
        let err = Sampler::new(&catalog, 0, 1).evaluate(&evaluator).unwrap_err();
        assert_eq!(
            err,
            ResolveError::NonFinite {
                evaluator: "linear",
                value: f64::INFINITY
            }
        );
    }

    #[test]
    fn test_unknown_global() {
        let catalog = Catalog::default();
        let err = Sampler::new(&catalog, 0, 0)
            .evaluate(&Evaluator::GlobalRef("missing".into()))
            .unwrap_err();
        assert_eq!(err, ResolveError::UnknownGlobalEvaluator("missing".into()));
    }

    #[test]
    fn test_selection_from_unknown_library() {
        let catalog = Catalog::default();
        let err = Sampler::new(&catalog, 0, 0)
            .evaluate(&Evaluator::SelectionWildcard {
                library: "Trees".into(),
                pattern: "*".into(),
            })
            .unwrap_err();
        assert_eq!(err, ResolveError::UnknownLibrary("Trees".into()));
    }
}
