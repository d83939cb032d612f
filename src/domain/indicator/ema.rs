//! Exponential Moving Average, one input at a time.
//!
//! k = 2/(n+1), seeded with the SMA of the first n inputs, then
//! EMA = x*k + EMA_prev*(1-k).
//! Warmup: the first (n-1) inputs record 0.0 and the indicator is not ready.

use crate::domain::indicator::{Indicator, RollingSeries};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    k: f64,
    seed_sum: f64,
    inputs: usize,
    value: f64,
    series: RollingSeries,
}

impl Ema {
    /// `history` is how many past values stay addressable through [`Ema::series`].
    pub fn new(period: usize, history: usize) -> Self {
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            inputs: 0,
            value: 0.0,
            series: RollingSeries::new(history),
        }
    }

    /// Latest value, 0.0 during warmup.
    pub fn value(&self) -> f64 {
        self.series.current()
    }

    pub fn series(&self) -> &RollingSeries {
        &self.series
    }
}

impl Indicator for Ema {
    fn advance(&mut self, input: f64) -> bool {
        if self.period == 0 || !input.is_finite() {
            return false;
        }
        self.inputs += 1;
        if self.inputs < self.period {
            self.seed_sum += input;
            self.series.push(0.0);
        } else if self.inputs == self.period {
            self.seed_sum += input;
            self.value = self.seed_sum / self.period as f64;
            self.series.push(self.value);
        } else {
            self.value = input * self.k + self.value * (1.0 - self.k);
            self.series.push(self.value);
        }
        true
    }

    fn is_ready(&self) -> bool {
        self.period > 0 && self.inputs >= self.period
    }
}
