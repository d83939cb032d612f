//! Best-effort order notification port.

use serde::Serialize;

use crate::domain::error::PipelineError;
use crate::domain::signal::Direction;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderNotice {
    pub instrument: String,
    pub side: Direction,
    pub price: f64,
    pub quantity: i64,
}

pub trait NotifyPort {
    /// Must return promptly; delivery may happen later or not at all.
    fn notify(&self, notice: &OrderNotice) -> Result<(), PipelineError>;
}
