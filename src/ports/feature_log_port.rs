//! Append-only sink for feature rows.

use crate::domain::error::PipelineError;
use crate::domain::feature_row::FeatureRow;

pub trait FeatureLogPort {
    fn append(&mut self, row: &FeatureRow) -> Result<(), PipelineError>;

    fn flush(&mut self) -> Result<(), PipelineError>;
}
