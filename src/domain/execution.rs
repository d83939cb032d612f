//! Order execution: merges trading and risk signals and applies the
//! per-instrument entry/exit policy.
//!
//! The only state kept across ticks is [`ExecutionState`]: the last executed
//! buy per instrument. An instrument with a recorded buy is Holding, any other
//! instrument is Flat.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use tracing::{debug, error, info, warn};

use crate::domain::risk::{RiskAction, RiskSignal};
use crate::domain::signal::{DEFAULT_WEIGHT, Direction, TradingSignal};
use crate::ports::broker_port::BrokerPort;
use crate::ports::notify_port::{NotifyPort, OrderNotice};

pub const DEFAULT_LOT_SIZE: i64 = 100;

pub fn default_sell_cutoff() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 55, 0).unwrap_or(NaiveTime::MIN)
}

/// What a Buy does when the instrument is already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PyramidPolicy {
    /// Ignore the buy.
    #[default]
    NoPyramiding,
    /// Buy the positive difference between the target and the held quantity.
    PyramidToTarget,
}

impl fmt::Display for PyramidPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyramidPolicy::NoPyramiding => f.write_str("none"),
            PyramidPolicy::PyramidToTarget => f.write_str("target"),
        }
    }
}

impl FromStr for PyramidPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "no" | "off" => Ok(PyramidPolicy::NoPyramiding),
            "target" | "pyramid" => Ok(PyramidPolicy::PyramidToTarget),
            other => Err(format!("unknown pyramiding policy '{other}' (expected none or target)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Used when a signal carries no positive weight.
    pub default_weight: f64,
    pub lot_size: i64,
    /// Take-profit exits only run at this exact hour and minute.
    pub sell_cutoff: NaiveTime,
    pub pyramiding: PyramidPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            default_weight: DEFAULT_WEIGHT,
            lot_size: DEFAULT_LOT_SIZE,
            sell_cutoff: default_sell_cutoff(),
            pyramiding: PyramidPolicy::NoPyramiding,
        }
    }
}

/// Sizing price: the holding's current price when positive, else the market
/// price, floored to 1.
pub fn sizing_price(holding_price: f64, market_price: f64) -> f64 {
    let price = if holding_price > 0.0 { holding_price } else { market_price };
    if price > 0.0 && price.is_finite() { price } else { 1.0 }
}

/// floor(portfolio_value * weight / price / lot_size) * lot_size
pub fn target_quantity(portfolio_value: f64, weight: f64, price: f64, lot_size: i64) -> i64 {
    if lot_size <= 0 || price <= 0.0 {
        return 0;
    }
    let lots = (portfolio_value * weight / price / lot_size as f64).floor();
    if !lots.is_finite() || lots <= 0.0 {
        return 0;
    }
    lots as i64 * lot_size
}

/// True when `time` has the same hour and minute as `cutoff`.
pub fn at_cutoff(time: NaiveTime, cutoff: NaiveTime) -> bool {
    time.hour() == cutoff.hour() && time.minute() == cutoff.minute()
}

/// Combines signals with risks: one entry per instrument (first signal wins),
/// and a risk for an instrument already present overrides its direction and
/// reason. Risks for instruments without a signal are dropped.
pub fn merge_signals(signals: &[TradingSignal], risks: &[RiskSignal]) -> Vec<TradingSignal> {
    let mut merged: BTreeMap<&str, TradingSignal> = BTreeMap::new();
    for signal in signals {
        merged
            .entry(signal.instrument.as_str())
            .or_insert_with(|| signal.clone());
    }
    for risk in risks {
        if let Some(signal) = merged.get_mut(risk.instrument.as_str()) {
            signal.direction = risk.direction;
            signal.reason = risk.action.as_str().to_string();
        }
    }
    merged.into_values().collect()
}

/// Last executed buy per instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionState {
    last_buy: HashMap<String, TradingSignal>,
}

impl ExecutionState {
    pub fn last_buy(&self, instrument: &str) -> Option<&TradingSignal> {
        self.last_buy.get(instrument)
    }

    pub fn is_holding(&self, instrument: &str) -> bool {
        self.last_buy.contains_key(instrument)
    }

    pub fn len(&self) -> usize {
        self.last_buy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_buy.is_empty()
    }

    fn record_buy(&mut self, signal: TradingSignal) {
        self.last_buy.insert(signal.instrument.clone(), signal);
    }

    fn clear(&mut self, instrument: &str) {
        self.last_buy.remove(instrument);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Buy while holding under [`PyramidPolicy::NoPyramiding`].
    AlreadyHolding,
    /// Target size rounds to zero lots, or the position is already at target.
    ZeroQuantity,
    /// Sell on the same exchange date as the recorded buy.
    SameDay,
    /// Sell for an instrument this pipeline never bought.
    NoEntry,
    /// Sell while the broker shows no position.
    NotInvested,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Submitted {
        instrument: String,
        direction: Direction,
        quantity: i64,
        price: f64,
    },
    Ignored {
        instrument: String,
        direction: Direction,
        reason: SkipReason,
    },
    /// Take-profit waiting for the cutoff time.
    Deferred { instrument: String },
    Rejected {
        instrument: String,
        direction: Direction,
        reason: String,
    },
}

pub struct ExecutionCoordinator {
    config: ExecutionConfig,
    state: ExecutionState,
    notifier: Option<Box<dyn NotifyPort>>,
}

impl ExecutionCoordinator {
    pub fn new(config: ExecutionConfig) -> Self {
        Self {
            config,
            state: ExecutionState::default(),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn NotifyPort>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Merge and execute one tick's decisions against the broker.
    ///
    /// An empty signal list is a no-op: risks alone never trade.
    pub fn execute(
        &mut self,
        signals: &[TradingSignal],
        risks: &[RiskSignal],
        broker: &mut dyn BrokerPort,
    ) -> Vec<ExecutionOutcome> {
        if signals.is_empty() {
            return Vec::new();
        }
        merge_signals(signals, risks)
            .into_iter()
            .filter_map(|signal| match signal.direction {
                Direction::Buy => Some(self.handle_buy(signal, broker)),
                Direction::Sell => Some(self.handle_sell(signal, broker)),
                Direction::Hold => None,
            })
            .collect()
    }

    /// Open (or top up) a position.
    ///
    /// Steps:
    /// 1. Resolve the sizing price from the holding or the market
    /// 2. target = floor(total value * weight / price / lot) * lot
    /// 3. Apply the pyramiding policy to get the order quantity
    /// 4. Submit, then record the buy and notify
    fn handle_buy(&mut self, signal: TradingSignal, broker: &mut dyn BrokerPort) -> ExecutionOutcome {
        let instrument = signal.instrument.clone();
        let holding = broker.holding(&instrument);
        let current_qty = holding.as_ref().map(|h| h.quantity).unwrap_or(0);
        let holding_price = holding.as_ref().map(|h| h.current_price).unwrap_or(0.0);
        let market_price = broker
            .market_price(&instrument)
            .unwrap_or(signal.suggested_price);
        let price = sizing_price(holding_price, market_price);
        let weight = if signal.weight > 0.0 {
            signal.weight
        } else {
            self.config.default_weight
        };
        let target = target_quantity(broker.total_value(), weight, price, self.config.lot_size);

        let holding_now = current_qty != 0 || self.state.is_holding(&instrument);
        let quantity = match self.config.pyramiding {
            PyramidPolicy::NoPyramiding if holding_now => {
                debug!(instrument = %instrument, current_qty, "already holding, buy ignored");
                return ExecutionOutcome::Ignored {
                    instrument,
                    direction: Direction::Buy,
                    reason: SkipReason::AlreadyHolding,
                };
            }
            PyramidPolicy::NoPyramiding => target,
            PyramidPolicy::PyramidToTarget => target - current_qty,
        };
        if quantity <= 0 {
            debug!(instrument = %instrument, target, current_qty, "nothing to buy");
            return ExecutionOutcome::Ignored {
                instrument,
                direction: Direction::Buy,
                reason: SkipReason::ZeroQuantity,
            };
        }

        if let Err(e) = broker.submit_order(&instrument, quantity) {
            error!(instrument = %instrument, quantity, error = %e, "buy order rejected");
            return ExecutionOutcome::Rejected {
                instrument,
                direction: Direction::Buy,
                reason: e.to_string(),
            };
        }
        info!(instrument = %instrument, quantity, price, reason = %signal.reason, "buy submitted");
        self.state.record_buy(signal);
        self.notify(&instrument, Direction::Buy, price, quantity);
        ExecutionOutcome::Submitted {
            instrument,
            direction: Direction::Buy,
            quantity,
            price,
        }
    }

    /// Close the whole position.
    ///
    /// Steps:
    /// 1. Require a recorded buy, on an earlier exchange date
    /// 2. Take-profit waits for the cutoff time; every other reason runs now
    /// 3. Liquidate the broker quantity, clear the state, notify
    fn handle_sell(&mut self, signal: TradingSignal, broker: &mut dyn BrokerPort) -> ExecutionOutcome {
        let instrument = signal.instrument.clone();
        let Some(entry) = self.state.last_buy(&instrument) else {
            debug!(instrument = %instrument, "sell without a recorded buy ignored");
            return ExecutionOutcome::Ignored {
                instrument,
                direction: Direction::Sell,
                reason: SkipReason::NoEntry,
            };
        };
        if entry.timestamp.date() == signal.timestamp.date() {
            debug!(instrument = %instrument, date = %signal.timestamp.date(), "same-day sell ignored");
            return ExecutionOutcome::Ignored {
                instrument,
                direction: Direction::Sell,
                reason: SkipReason::SameDay,
            };
        }
        if signal.reason == RiskAction::TakeProfit.as_str()
            && !at_cutoff(signal.timestamp.time(), self.config.sell_cutoff)
        {
            info!(
                instrument = %instrument,
                time = %signal.timestamp.time(),
                cutoff = %self.config.sell_cutoff,
                "take-profit deferred until cutoff"
            );
            return ExecutionOutcome::Deferred { instrument };
        }

        let quantity = broker
            .holding(&instrument)
            .map(|h| h.quantity)
            .unwrap_or(0);
        if quantity <= 0 {
            warn!(instrument = %instrument, "recorded buy but broker shows no position, clearing");
            self.state.clear(&instrument);
            return ExecutionOutcome::Ignored {
                instrument,
                direction: Direction::Sell,
                reason: SkipReason::NotInvested,
            };
        }

        if let Err(e) = broker.submit_order(&instrument, -quantity) {
            error!(instrument = %instrument, quantity, error = %e, "sell order rejected");
            return ExecutionOutcome::Rejected {
                instrument,
                direction: Direction::Sell,
                reason: e.to_string(),
            };
        }
        let price = broker
            .market_price(&instrument)
            .unwrap_or(signal.suggested_price);
        info!(instrument = %instrument, quantity, price, reason = %signal.reason, "position liquidated");
        self.state.clear(&instrument);
        self.notify(&instrument, Direction::Sell, price, quantity);
        ExecutionOutcome::Submitted {
            instrument,
            direction: Direction::Sell,
            quantity,
            price,
        }
    }

    fn notify(&self, instrument: &str, side: Direction, price: f64, quantity: i64) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let notice = OrderNotice {
            instrument: instrument.to_string(),
            side,
            price,
            quantity,
        };
        if let Err(e) = notifier.notify(&notice) {
            warn!(instrument, error = %e, "order notification failed");
        }
    }
}
