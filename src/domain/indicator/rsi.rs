//! RSI (Relative Strength Index), one input at a time.
//!
//! Uses Wilder's smoothing for average gain/loss:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: n price changes (n+1 inputs); 0.0 is recorded until then.

use crate::domain::indicator::{Indicator, RollingSeries};

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_input: Option<f64>,
    changes: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
    series: RollingSeries,
}

impl Rsi {
    pub fn new(period: usize, history: usize) -> Self {
        Self {
            period,
            prev_input: None,
            changes: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            series: RollingSeries::new(history),
        }
    }

    pub fn value(&self) -> f64 {
        self.series.current()
    }

    pub fn series(&self) -> &RollingSeries {
        &self.series
    }

    fn rsi(&self) -> f64 {
        if self.avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + self.avg_gain / self.avg_loss))
        }
    }
}

impl Indicator for Rsi {
    fn advance(&mut self, input: f64) -> bool {
        if self.period == 0 || !input.is_finite() {
            return false;
        }
        let Some(prev) = self.prev_input.replace(input) else {
            self.series.push(0.0);
            return true;
        };

        let change = input - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.changes += 1;
        let n = self.period as f64;

        if self.changes < self.period {
            self.gain_sum += gain;
            self.loss_sum += loss;
            self.series.push(0.0);
            return true;
        }

        if self.changes == self.period {
            self.avg_gain = (self.gain_sum + gain) / n;
            self.avg_loss = (self.loss_sum + loss) / n;
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }
        let rsi = self.rsi();
        self.series.push(rsi);
        true
    }

    fn is_ready(&self) -> bool {
        self.period > 0 && self.changes >= self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(period: usize, prices: &[f64]) -> Rsi {
        let mut rsi = Rsi::new(period, 4);
        for &p in prices {
            rsi.advance(p);
        }
        rsi
    }

    #[test]
    fn rsi_warmup_needs_period_changes() {
        let rsi = run(3, &[10.0, 11.0, 12.0]);
        assert!(!rsi.is_ready());
        assert_eq!(rsi.value(), 0.0);

        let rsi = run(3, &[10.0, 11.0, 12.0, 13.0]);
        assert!(rsi.is_ready());
    }

    #[test]
    fn rsi_all_gains_is_100() {
        let rsi = run(3, &[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert!((rsi.value() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_is_0() {
        let rsi = run(3, &[14.0, 13.0, 12.0, 11.0, 10.0]);
        assert!(rsi.value().abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_first_value_uses_simple_means() {
        // changes: +2, -1, +1 -> avg_gain 1.0, avg_loss 1/3
        let rsi = run(3, &[10.0, 12.0, 11.0, 12.0]);
        let expected = 100.0 - 100.0 / (1.0 + 1.0 / (1.0 / 3.0));
        assert!((rsi.value() - expected).abs() < 1e-10);
    }

    #[test]
    fn rsi_wilder_smoothing_after_seed() {
        // seed: changes +2, -1, +1; then -2
        let rsi = run(3, &[10.0, 12.0, 11.0, 12.0, 10.0]);
        let avg_gain = (1.0 * 2.0 + 0.0) / 3.0;
        let avg_loss = ((1.0 / 3.0) * 2.0 + 2.0) / 3.0;
        let expected = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        assert!((rsi.value() - expected).abs() < 1e-10);
    }

    #[test]
    fn rsi_stays_in_range() {
        let prices = [44.0, 44.3, 44.1, 43.6, 44.3, 44.8, 45.1, 45.4, 45.8, 46.1, 45.9];
        let mut rsi = Rsi::new(6, 2);
        for p in prices {
            rsi.advance(p);
            assert!((0.0..=100.0).contains(&rsi.value()));
        }
    }

    #[test]
    fn rsi_period_0_rejects_input() {
        let mut rsi = Rsi::new(0, 2);
        assert!(!rsi.advance(10.0));
        assert!(!rsi.is_ready());
    }
}
