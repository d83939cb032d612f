//! Market data port trait.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::error::PipelineError;

pub trait MarketDataPort {
    /// All bars for one instrument and timeframe, oldest first.
    fn fetch_bars(&self, instrument: &str, timeframe: Timeframe) -> Result<Vec<Bar>, PipelineError>;

    /// Instruments for which any data exists.
    fn list_instruments(&self) -> Result<Vec<String>, PipelineError>;
}
