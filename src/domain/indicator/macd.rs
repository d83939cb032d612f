//! MACD (Moving Average Convergence Divergence), one input at a time.
//!
//! DIFF (line) = EMA(fast) - EMA(slow)
//! DEA (signal) = EMA(signal) of DIFF, seeded with the SMA of the first
//! `signal` DIFF values
//! Histogram = DIFF - DEA
//!
//! Warmup: max(fast, slow) - 1 + signal - 1 inputs. Before the slow EMA is
//! ready DIFF records 0.0; before DEA is seeded DEA and the histogram record 0.0.

use crate::domain::indicator::{Ema, Indicator, RollingSeries};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal_period: usize,
    signal_k: f64,
    signal_seed_sum: f64,
    signal_value: f64,
    line_values: usize,
    line: RollingSeries,
    signal: RollingSeries,
    histogram: RollingSeries,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, history: usize) -> Self {
        Self {
            fast: Ema::new(fast, 1),
            slow: Ema::new(slow, 1),
            signal_period: signal,
            signal_k: 2.0 / (signal as f64 + 1.0),
            signal_seed_sum: 0.0,
            signal_value: 0.0,
            line_values: 0,
            line: RollingSeries::new(history),
            signal: RollingSeries::new(history),
            histogram: RollingSeries::new(history),
        }
    }

    /// DIFF history.
    pub fn line(&self) -> &RollingSeries {
        &self.line
    }

    /// DEA history.
    pub fn signal(&self) -> &RollingSeries {
        &self.signal
    }

    pub fn histogram(&self) -> &RollingSeries {
        &self.histogram
    }

    /// Number of DIFF values computed with both EMAs ready.
    pub fn line_values(&self) -> usize {
        self.line_values
    }
}

impl Indicator for Macd {
    fn advance(&mut self, input: f64) -> bool {
        if self.signal_period == 0 || !input.is_finite() {
            return false;
        }
        if !self.fast.advance(input) || !self.slow.advance(input) {
            return false;
        }

        if !(self.fast.is_ready() && self.slow.is_ready()) {
            self.line.push(0.0);
            self.signal.push(0.0);
            self.histogram.push(0.0);
            return true;
        }

        let diff = self.fast.value() - self.slow.value();
        self.line_values += 1;
        self.line.push(diff);

        if self.line_values < self.signal_period {
            self.signal_seed_sum += diff;
            self.signal.push(0.0);
            self.histogram.push(0.0);
        } else {
            if self.line_values == self.signal_period {
                self.signal_seed_sum += diff;
                self.signal_value = self.signal_seed_sum / self.signal_period as f64;
            } else {
                self.signal_value =
                    diff * self.signal_k + self.signal_value * (1.0 - self.signal_k);
            }
            self.signal.push(self.signal_value);
            self.histogram.push(diff - self.signal_value);
        }
        true
    }

    fn is_ready(&self) -> bool {
        self.signal_period > 0 && self.line_values >= self.signal_period
    }
}
