//! Logistic scorer over a weighted sum of named features.

use crate::domain::error::PipelineError;
use crate::domain::feature::is_feature_name;
use crate::domain::signal::FeatureVector;
use crate::ports::config_port::ConfigPort;
use crate::ports::scorer_port::ScorerPort;

#[derive(Debug, Clone, PartialEq)]
pub struct LinearScorer {
    intercept: f64,
    weights: Vec<(String, f64)>,
}

impl LinearScorer {
    pub fn new(intercept: f64, weights: Vec<(String, f64)>) -> Self {
        Self { intercept, weights }
    }

    /// Reads `[model] intercept` and `[model] weights = name:weight,...`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PipelineError> {
        let intercept = config.get_double("model", "intercept", 0.0);
        let mut weights = Vec::new();
        for entry in config.get_list("model", "weights") {
            let (name, weight) = entry
                .rsplit_once(':')
                .ok_or_else(|| PipelineError::config_invalid("model", "weights", format!("'{entry}' is not name:weight")))?;
            let name = name.trim();
            if !is_feature_name(name) {
                return Err(PipelineError::config_invalid(
                    "model",
                    "weights",
                    format!("unknown feature '{name}'"),
                ));
            }
            let weight: f64 = weight.trim().parse().map_err(|_| {
                PipelineError::config_invalid("model", "weights", format!("weight for '{name}' is not a number"))
            })?;
            weights.push((name.to_string(), weight));
        }
        if weights.is_empty() {
            return Err(PipelineError::ConfigMissing {
                section: "model".into(),
                key: "weights".into(),
            });
        }
        Ok(Self::new(intercept, weights))
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.weights.iter().map(|(n, _)| n.clone()).collect()
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl ScorerPort for LinearScorer {
    fn score(&self, features: &FeatureVector) -> Result<f64, PipelineError> {
        let mut z = self.intercept;
        for (name, weight) in &self.weights {
            let value = features.get(name).ok_or_else(|| PipelineError::Scorer {
                reason: format!("feature '{name}' missing from vector"),
            })?;
            z += weight * value;
        }
        Ok(logistic(z))
    }
}
