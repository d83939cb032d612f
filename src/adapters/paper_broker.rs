//! In-process paper broker for replays.
//!
//! Fills every accepted order at the latest mark. Buys that exceed cash and
//! sells that exceed the held quantity are rejected.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::error::PipelineError;
use crate::domain::position::Holding;
use crate::ports::broker_port::{HoldingsPort, OrderPort};

#[derive(Debug, Clone, PartialEq)]
struct PaperPosition {
    quantity: i64,
    average_price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub timestamp: Option<DateTime<Utc>>,
    pub instrument: String,
    /// Positive for buys.
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaperBroker {
    cash: f64,
    initial_capital: f64,
    positions: BTreeMap<String, PaperPosition>,
    marks: BTreeMap<String, f64>,
    fills: Vec<Fill>,
    clock: Option<DateTime<Utc>>,
}

impl PaperBroker {
    pub fn new(initial_capital: f64) -> Self {
        PaperBroker {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            marks: BTreeMap::new(),
            fills: Vec::new(),
            clock: None,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    /// Fills recorded after this call are stamped with `timestamp`.
    pub fn set_clock(&mut self, timestamp: DateTime<Utc>) {
        self.clock = Some(timestamp);
    }

    pub fn mark(&mut self, instrument: &str, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.marks.insert(instrument.to_string(), price);
        }
    }

    fn reject(instrument: &str, reason: String) -> PipelineError {
        PipelineError::OrderRejected {
            instrument: instrument.to_string(),
            reason,
        }
    }
}

impl HoldingsPort for PaperBroker {
    fn holding(&self, instrument: &str) -> Option<Holding> {
        self.positions.get(instrument).map(|p| Holding {
            instrument: instrument.to_string(),
            quantity: p.quantity,
            average_price: p.average_price,
            current_price: self.marks.get(instrument).copied().unwrap_or(p.average_price),
        })
    }

    fn holdings(&self) -> Vec<Holding> {
        self.positions
            .keys()
            .filter_map(|code| self.holding(code))
            .collect()
    }

    fn total_value(&self) -> f64 {
        self.cash
            + self
                .holdings()
                .iter()
                .map(Holding::market_value)
                .sum::<f64>()
    }

    fn market_price(&self, instrument: &str) -> Option<f64> {
        self.marks.get(instrument).copied()
    }
}

impl OrderPort for PaperBroker {
    fn submit_order(&mut self, instrument: &str, quantity: i64) -> Result<(), PipelineError> {
        if quantity == 0 {
            return Err(Self::reject(instrument, "zero quantity".into()));
        }
        let price = self
            .marks
            .get(instrument)
            .copied()
            .ok_or_else(|| Self::reject(instrument, "no market price".into()))?;

        if quantity > 0 {
            let cost = quantity as f64 * price;
            if cost > self.cash {
                return Err(Self::reject(
                    instrument,
                    format!("insufficient cash: need {cost:.2}, have {:.2}", self.cash),
                ));
            }
            self.cash -= cost;
            let pos = self
                .positions
                .entry(instrument.to_string())
                .or_insert(PaperPosition {
                    quantity: 0,
                    average_price: 0.0,
                });
            let new_qty = pos.quantity + quantity;
            pos.average_price =
                (pos.average_price * pos.quantity as f64 + cost) / new_qty as f64;
            pos.quantity = new_qty;
        } else {
            let sell = -quantity;
            let held = self.positions.get(instrument).map(|p| p.quantity).unwrap_or(0);
            if sell > held {
                return Err(Self::reject(
                    instrument,
                    format!("cannot sell {sell}, holding {held}"),
                ));
            }
            self.cash += sell as f64 * price;
            if sell == held {
                self.positions.remove(instrument);
            } else if let Some(pos) = self.positions.get_mut(instrument) {
                pos.quantity -= sell;
            }
        }

        self.fills.push(Fill {
            timestamp: self.clock,
            instrument: instrument.to_string(),
            quantity,
            price,
        });
        Ok(())
    }
}
