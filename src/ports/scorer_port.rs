//! Predictive scorer port.

use crate::domain::error::PipelineError;
use crate::domain::signal::FeatureVector;

pub trait ScorerPort {
    /// Score in [0, 1]; compared against the buy and sell thresholds.
    fn score(&self, features: &FeatureVector) -> Result<f64, PipelineError>;
}
