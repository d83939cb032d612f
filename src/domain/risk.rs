//! Stop-loss / take-profit overlay on live holdings.

use std::fmt;

use crate::domain::position::Holding;
use crate::domain::signal::Direction;

pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.02;
pub const DEFAULT_TAKE_PROFIT_PCT: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskAction {
    StopLoss,
    TakeProfit,
}

impl RiskAction {
    /// Also the reason text a merged signal carries.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskAction::StopLoss => "StopLoss",
            RiskAction::TakeProfit => "TakeProfit",
        }
    }
}

impl fmt::Display for RiskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskSignal {
    pub instrument: String,
    pub direction: Direction,
    pub action: RiskAction,
    pub trigger_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            take_profit_pct: DEFAULT_TAKE_PROFIT_PCT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskMonitor {
    config: RiskConfig,
}

impl RiskMonitor {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// At most one signal per non-flat holding, in input order. Stop-loss is
    /// checked first.
    pub fn check_risks(&self, holdings: &[Holding]) -> Vec<RiskSignal> {
        holdings
            .iter()
            .filter(|h| !h.is_flat())
            .filter_map(|h| {
                let profit = h.profit_ratio();
                let action = if profit <= -self.config.stop_loss_pct {
                    RiskAction::StopLoss
                } else if profit >= self.config.take_profit_pct {
                    RiskAction::TakeProfit
                } else {
                    return None;
                };
                Some(RiskSignal {
                    instrument: h.instrument.clone(),
                    direction: Direction::Sell,
                    action,
                    trigger_price: h.current_price,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holding(code: &str, qty: i64, avg: f64, cur: f64) -> Holding {
        Holding {
            instrument: code.into(),
            quantity: qty,
            average_price: avg,
            current_price: cur,
        }
    }

    #[test]
    fn stop_loss_at_threshold() {
        let monitor = RiskMonitor::new(RiskConfig::default());
        let risks = monitor.check_risks(&[holding("SH.600000", 100, 10.0, 9.7)]);
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].action, RiskAction::StopLoss);
        assert_eq!(risks[0].direction, Direction::Sell);
        assert!((risks[0].trigger_price - 9.7).abs() < f64::EPSILON);
    }

    #[test]
    fn take_profit_at_threshold() {
        let monitor = RiskMonitor::new(RiskConfig::default());
        let risks = monitor.check_risks(&[holding("SH.600000", 100, 10.0, 12.0)]);
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].action, RiskAction::TakeProfit);
    }

    #[test]
    fn inside_band_emits_nothing() {
        let monitor = RiskMonitor::new(RiskConfig::default());
        let risks = monitor.check_risks(&[
            holding("SH.600000", 100, 10.0, 9.9),
            holding("SZ.000001", 100, 10.0, 10.5),
        ]);
        assert!(risks.is_empty());
    }

    #[test]
    fn flat_and_zero_cost_holdings_are_skipped() {
        let monitor = RiskMonitor::new(RiskConfig::default());
        let risks = monitor.check_risks(&[
            holding("SH.600000", 0, 10.0, 5.0),
            holding("SZ.000001", 100, 0.0, 5.0),
        ]);
        assert!(risks.is_empty());
    }

    #[test]
    fn repeated_checks_are_identical() {
        let monitor = RiskMonitor::new(RiskConfig {
            stop_loss_pct: 0.05,
            take_profit_pct: 0.2,
        });
        let holdings = vec![
            holding("SH.600000", 100, 10.0, 9.0),
            holding("SZ.000001", 200, 10.0, 12.5),
            holding("SZ.300750", 300, 10.0, 10.1),
        ];
        let first = monitor.check_risks(&holdings);
        let second = monitor.check_risks(&holdings);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn action_names() {
        assert_eq!(RiskAction::StopLoss.to_string(), "StopLoss");
        assert_eq!(RiskAction::TakeProfit.as_str(), "TakeProfit");
    }
}
