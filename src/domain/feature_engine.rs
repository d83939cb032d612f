//! Incremental multi-timeframe feature engine.
//!
//! Each registered instrument owns a daily and an intraday indicator group; the
//! benchmark close series is shared. Bars are applied with [`FeatureEngine::advance`],
//! which only moves series forward, and [`FeatureEngine::recompute`] derives the
//! whole [`FeatureSnapshot`] from the current series state in one pass.
//!
//! Failure isolation: [`FeatureEngine::apply_tick`] logs and skips instruments whose
//! bars or features fail, and keeps processing the rest of the tick.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::domain::bar::{Bar, Tick, Timeframe};
use crate::domain::error::PipelineError;
use crate::domain::feature::{Divergence, FeatureSnapshot, MacdTrend, ratio, ret};
use crate::domain::indicator::{Ema, Indicator, Macd, RollingSeries, Rsi};
use crate::domain::strategy_tag::StrategyTagMap;

pub const DEFAULT_BREAKOUT_LOOKBACK: usize = 6;
pub const DEFAULT_MACD_TREND_THRESHOLD: f64 = 0.2;
pub const DEFAULT_BUY_STRATEGY_TAG: f64 = 1.0;
pub const DEFAULT_RSI_PERIOD: usize = 6;

const TAG_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl MacdParams {
    pub const DAILY: MacdParams = MacdParams {
        fast: 12,
        slow: 26,
        signal: 9,
    };
    pub const INTRADAY: MacdParams = MacdParams {
        fast: 6,
        slow: 13,
        signal: 4,
    };

    fn build(self, history: usize) -> Macd {
        Macd::new(self.fast, self.slow, self.signal, history)
    }
}

#[derive(Debug, Clone)]
pub struct FeatureConfig {
    /// Prior intraday closes the breakout compares against.
    pub breakout_lookback: usize,
    pub macd_trend_threshold: f64,
    /// Mapped strategy tag that, together with a breakout, makes a buy candidate.
    pub buy_strategy_tag: f64,
    pub daily_macd: MacdParams,
    pub intraday_macd: MacdParams,
    pub rsi_period: usize,
    pub strategy_tags: StrategyTagMap,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            breakout_lookback: DEFAULT_BREAKOUT_LOOKBACK,
            macd_trend_threshold: DEFAULT_MACD_TREND_THRESHOLD,
            buy_strategy_tag: DEFAULT_BUY_STRATEGY_TAG,
            daily_macd: MacdParams::DAILY,
            intraday_macd: MacdParams::INTRADAY,
            rsi_period: DEFAULT_RSI_PERIOD,
            strategy_tags: StrategyTagMap::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct DailyGroup {
    close: RollingSeries,
    volume: RollingSeries,
    macd: Macd,
    next_open: RollingSeries,
    next_close: RollingSeries,
    next2_close: RollingSeries,
    next5_close: RollingSeries,
    strategy_tag: RollingSeries,
}

impl DailyGroup {
    fn new(config: &FeatureConfig) -> Self {
        Self {
            close: RollingSeries::new(6),
            volume: RollingSeries::new(4),
            macd: config.daily_macd.build(1),
            next_open: RollingSeries::new(3),
            next_close: RollingSeries::new(1),
            next2_close: RollingSeries::new(1),
            next5_close: RollingSeries::new(1),
            strategy_tag: RollingSeries::new(1),
        }
    }

    fn advance(&mut self, bar: &Bar, tags: &StrategyTagMap) -> bool {
        if !self.macd.advance(bar.close) {
            return false;
        }
        self.close.push(bar.close);
        self.volume.push(bar.volume);
        let labels = bar.labels.clone().unwrap_or_default();
        self.next_open.push(labels.next_open);
        self.next_close.push(labels.next_close);
        self.next2_close.push(labels.next2_close);
        self.next5_close.push(labels.next5_close);
        self.strategy_tag.push(tags.encode(&labels.strategy_tag));
        true
    }
}

#[derive(Debug, Clone)]
struct IntradayGroup {
    close: RollingSeries,
    open: RollingSeries,
    volume: RollingSeries,
    macd: Macd,
    ema3: Ema,
    ema10: Ema,
    ema20: Ema,
    ema60: Ema,
    rsi: Rsi,
    last_timestamp: Option<DateTime<Utc>>,
}

impl IntradayGroup {
    fn new(config: &FeatureConfig) -> Self {
        // breakout reads lags 1..=lookback+1; previous returns read up to lag 4
        let close_history = (config.breakout_lookback + 2).max(5);
        Self {
            close: RollingSeries::new(close_history),
            open: RollingSeries::new(1),
            volume: RollingSeries::new(4),
            macd: config.intraday_macd.build(2),
            ema3: Ema::new(3, 2),
            ema10: Ema::new(10, 1),
            ema20: Ema::new(20, 1),
            ema60: Ema::new(60, 1),
            rsi: Rsi::new(config.rsi_period, 1),
            last_timestamp: None,
        }
    }

    fn advance(&mut self, bar: &Bar) -> bool {
        if !self.macd.advance(bar.close) {
            return false;
        }
        self.close.push(bar.close);
        self.open.push(bar.open);
        self.volume.push(bar.volume);
        self.ema3.advance(bar.close);
        self.ema10.advance(bar.close);
        self.ema20.advance(bar.close);
        self.ema60.advance(bar.close);
        self.rsi.advance(bar.close);
        self.last_timestamp = Some(bar.timestamp);
        true
    }
}

#[derive(Debug, Clone)]
struct InstrumentState {
    daily: DailyGroup,
    intraday: IntradayGroup,
    snapshot: FeatureSnapshot,
}

pub struct FeatureEngine {
    config: FeatureConfig,
    benchmark: RollingSeries,
    instruments: BTreeMap<String, InstrumentState>,
}

impl FeatureEngine {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            benchmark: RollingSeries::new(2),
            instruments: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn register(&mut self, instrument: &str) {
        if !self.instruments.contains_key(instrument) {
            let state = InstrumentState {
                daily: DailyGroup::new(&self.config),
                intraday: IntradayGroup::new(&self.config),
                snapshot: FeatureSnapshot::default(),
            };
            self.instruments.insert(instrument.to_string(), state);
        }
    }

    pub fn is_registered(&self, instrument: &str) -> bool {
        self.instruments.contains_key(instrument)
    }

    /// Registered instruments in ascending order.
    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    pub fn snapshot(&self, instrument: &str) -> Option<&FeatureSnapshot> {
        self.instruments.get(instrument).map(|s| &s.snapshot)
    }

    /// Applies one bar to its series without recomputing features.
    ///
    /// Benchmark bars feed the shared benchmark series regardless of their
    /// instrument code. Returns whether any series changed.
    pub fn advance(&mut self, bar: &Bar) -> Result<bool, PipelineError> {
        bar.validate()?;
        match bar.timeframe {
            Timeframe::Benchmark => {
                self.benchmark.push(bar.close);
                Ok(true)
            }
            Timeframe::Daily => {
                let tags = &self.config.strategy_tags;
                let state = self
                    .instruments
                    .get_mut(&bar.instrument)
                    .ok_or_else(|| PipelineError::UnknownInstrument(bar.instrument.clone()))?;
                Ok(state.daily.advance(bar, tags))
            }
            Timeframe::Intraday => {
                let state = self
                    .instruments
                    .get_mut(&bar.instrument)
                    .ok_or_else(|| PipelineError::UnknownInstrument(bar.instrument.clone()))?;
                Ok(state.intraday.advance(bar))
            }
        }
    }

    /// Rebuilds the instrument's snapshot from its current series.
    pub fn recompute(&mut self, instrument: &str) -> Result<&FeatureSnapshot, PipelineError> {
        let state = self
            .instruments
            .get(instrument)
            .ok_or_else(|| PipelineError::UnknownInstrument(instrument.to_string()))?;
        let snapshot = compute_snapshot(&self.config, &self.benchmark, state);
        if let Some(field) = snapshot.first_non_finite() {
            return Err(PipelineError::NonFiniteFeature {
                instrument: instrument.to_string(),
                field: field.to_string(),
            });
        }
        let state = self
            .instruments
            .get_mut(instrument)
            .ok_or_else(|| PipelineError::UnknownInstrument(instrument.to_string()))?;
        state.snapshot = snapshot;
        Ok(&state.snapshot)
    }

    /// Advances every bar in the tick, then recomputes each affected
    /// instrument once. Returns the instruments whose snapshot was refreshed.
    pub fn apply_tick(&mut self, tick: &Tick) -> Vec<String> {
        let mut affected = BTreeSet::new();
        let mut failed = BTreeSet::new();

        for bar in &tick.bars {
            match self.advance(bar) {
                Ok(true) if bar.timeframe == Timeframe::Benchmark => {
                    affected.extend(self.instruments.keys().cloned());
                }
                Ok(true) => {
                    affected.insert(bar.instrument.clone());
                }
                Ok(false) => {
                    debug!(instrument = %bar.instrument, timeframe = %bar.timeframe, "bar did not advance any series");
                }
                Err(PipelineError::UnknownInstrument(code)) => {
                    debug!(instrument = %code, "bar for unregistered instrument skipped");
                }
                Err(e) => {
                    warn!(instrument = %bar.instrument, error = %e, "bar rejected");
                    failed.insert(bar.instrument.clone());
                }
            }
        }

        let mut refreshed = Vec::with_capacity(affected.len());
        for instrument in affected.difference(&failed) {
            match self.recompute(instrument) {
                Ok(_) => refreshed.push(instrument.clone()),
                Err(e) => warn!(instrument = %instrument, error = %e, "feature recompute failed"),
            }
        }
        refreshed
    }
}

/// Opening gap style return where a missing (zero) forward open means "no value".
fn forward_ret(forward: f64, base: f64) -> f64 {
    if forward == 0.0 { 0.0 } else { ret(forward, base) }
}

fn compute_snapshot(
    config: &FeatureConfig,
    benchmark: &RollingSeries,
    state: &InstrumentState,
) -> FeatureSnapshot {
    let d = &state.daily;
    let m = &state.intraday;
    let close = m.close[0];
    let day_close = d.close[0];

    let mut s = FeatureSnapshot {
        timestamp: m.last_timestamp,
        close,
        open: m.open[0],
        ready: m.macd.is_ready() && d.close.samples() > 0,
        ..Default::default()
    };

    s.benchmark_return = ret(benchmark[0], benchmark[1]);

    // daily
    s.day_return = ret(day_close, d.close[1]);
    s.day_return_5 = ret(d.close[1], d.close[5]);
    s.day_volume_ratio = ratio(d.volume[0], d.volume[1]);
    if d.volume.samples() > 3 {
        s.day_volume_ratio_3 = ratio(d.volume[0], d.volume.mean_over(1, 3));
    }
    if d.macd.is_ready() {
        s.day_diff = d.macd.line()[0];
        s.day_dea = d.macd.signal()[0];
        s.day_macd = 2.0 * (s.day_diff - s.day_dea);
        s.day_macd_trend =
            MacdTrend::classify(s.day_diff, s.day_dea, config.macd_trend_threshold);
    }

    s.open_return = forward_ret(d.next_open[0], day_close);
    s.prev_open_return_1 = forward_ret(d.next_open[1], d.close[1]);
    s.prev_open_return_2 = forward_ret(d.next_open[2], d.close[2]);

    // intraday returns
    s.intraday_return = ret(close, m.close[1]);
    s.intraday_return_5day = ret(close, d.close[5]);
    s.prev_intraday_return_1 = ret(m.close[1], m.close[2]);
    s.prev_intraday_return_2 = ret(m.close[2], m.close[3]);
    s.prev_intraday_return_3 = ret(m.close[3], m.close[4]);
    s.intraday_return_from_prev_close = ret(close, day_close);

    // breakout: the current close clears the prior window while the previous
    // close had not cleared its own window
    let lookback = config.breakout_lookback;
    if lookback > 0 && m.close.samples() > lookback + 1 {
        let max_prev = m.close.max_over(1, lookback);
        let max_before_prev = m.close.max_over(2, lookback + 1);
        s.breakout = close > max_prev && m.close[1] <= max_before_prev;
    }

    if m.ema60.is_ready() {
        let (e3, e10, e20, e60) = (
            m.ema3.value(),
            m.ema10.value(),
            m.ema20.value(),
            m.ema60.value(),
        );
        let open = s.open;
        s.breakout_ema = close > e3
            && close > e10
            && close > e20
            && close > e60
            && open < e3
            && open < e10
            && open < e20;
    }
    s.weak_to_strong = s.breakout && s.breakout_ema;

    s.intraday_volume_ratio = ratio(m.volume[0], m.volume[1]);
    if m.volume.samples() > 3 {
        s.intraday_volume_ratio_3 = ratio(m.volume[0], m.volume.mean_over(1, 3));
    }
    s.ema_slope = ratio(m.ema3.series()[0] - m.ema3.series()[1], m.ema3.series()[1]);

    if m.macd.line_values() > 1 && m.close.samples() > 1 {
        s.macd_divergence =
            Divergence::classify(close, m.close[1], m.macd.line()[0], m.macd.line()[1]);
    }
    if m.rsi.is_ready() {
        s.rsi = m.rsi.value();
    }
    if m.macd.is_ready() {
        s.intraday_diff = m.macd.line()[0];
        s.intraday_dea = m.macd.signal()[0];
        s.intraday_macd = 2.0 * (s.intraday_diff - s.intraday_dea);
    }

    if d.strategy_tag.samples() > 0 {
        s.strategy_tag = d.strategy_tag[0];
    }
    s.buy_candidate = s.breakout
        && d.strategy_tag.samples() > 0
        && (s.strategy_tag - config.buy_strategy_tag).abs() < TAG_TOLERANCE;

    // forward labels
    s.day_return_label = forward_ret(d.next_close[0], close);
    s.next_day_return_label = forward_ret(d.next2_close[0], close);
    s.five_day_return_label = forward_ret(d.next5_close[0], close);

    s
}
