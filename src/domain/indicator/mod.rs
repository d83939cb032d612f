//! Incremental technical indicators.
//!
//! This module provides:
//! - `RollingSeries`: bounded history of a scalar with lag access (`series[k]`)
//! - `Indicator`: the one-value-at-a-time update contract
//!
//! Lag access past the retained or observed history reads as 0.0.

pub mod ema;
pub mod macd;
pub mod rsi;

pub use ema::Ema;
pub use macd::Macd;
pub use rsi::Rsi;

use std::collections::VecDeque;
use std::ops::Index;

static ZERO: f64 = 0.0;

/// Rolling history of one scalar, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSeries {
    values: VecDeque<f64>,
    capacity: usize,
    samples: usize,
}

impl RollingSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            samples: 0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_back();
        }
        self.values.push_front(value);
        self.samples += 1;
    }

    /// Value `lag` observations before the latest, or 0.0.
    pub fn get(&self, lag: usize) -> f64 {
        self.values.get(lag).copied().unwrap_or(0.0)
    }

    pub fn current(&self) -> f64 {
        self.get(0)
    }

    /// Total observations ever pushed, not the retained count.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Largest value over lags `from..=to`, or 0.0 when the range is empty.
    pub fn max_over(&self, from: usize, to: usize) -> f64 {
        (from..=to)
            .map(|lag| self.get(lag))
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// Mean of lags `from..=to`.
    pub fn mean_over(&self, from: usize, to: usize) -> f64 {
        if to < from {
            return 0.0;
        }
        let sum: f64 = (from..=to).map(|lag| self.get(lag)).sum();
        sum / (to - from + 1) as f64
    }
}

impl Index<usize> for RollingSeries {
    type Output = f64;

    fn index(&self, lag: usize) -> &f64 {
        self.values.get(lag).unwrap_or(&ZERO)
    }
}

/// One-input-per-step indicator.
pub trait Indicator {
    /// Feed the next input. Returns false when the input was rejected
    /// (non-finite), in which case no state changed.
    fn advance(&mut self, input: f64) -> bool;

    fn is_ready(&self) -> bool;
}
