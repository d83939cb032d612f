//! Holdings provider and order sink ports.
//!
//! The portfolio itself lives outside the pipeline; it is only read through
//! [`HoldingsPort`] and changed through [`OrderPort`].

use crate::domain::error::PipelineError;
use crate::domain::position::Holding;

pub trait HoldingsPort {
    fn holding(&self, instrument: &str) -> Option<Holding>;

    /// Every holding, including flat ones the provider still tracks.
    fn holdings(&self) -> Vec<Holding>;

    /// Cash plus the marked value of every position.
    fn total_value(&self) -> f64;

    /// Latest known market price, if any.
    fn market_price(&self, instrument: &str) -> Option<f64>;
}

pub trait OrderPort {
    /// Positive quantity buys, negative sells.
    fn submit_order(&mut self, instrument: &str, quantity: i64) -> Result<(), PipelineError>;
}

/// Both halves of a broker, so one object can be handed to the coordinator.
pub trait BrokerPort: HoldingsPort + OrderPort {}

impl<T: HoldingsPort + OrderPort + ?Sized> BrokerPort for T {}
