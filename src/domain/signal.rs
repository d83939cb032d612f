//! Signal generation: feature snapshot -> Buy / Sell / Hold.
//!
//! Scoring is selected by [`ScoringMode`]:
//! - `Breakout`: the feature engine's buy candidate flag yields Buy directly.
//! - `OpenGap`: fixed rule score, `gap_score` when the opening gap exceeds
//!   `open_gap_threshold`, otherwise `baseline_score`.
//! - `Model`: an injected [`ScorerPort`] scores a named feature vector; when the
//!   scorer is missing or fails, the `OpenGap` rule score is used instead.
//!
//! Scores map to directions as `score > buy_threshold` -> Buy,
//! `score < sell_threshold` -> Sell, otherwise Hold.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::bar::Tick;
use crate::domain::error::PipelineError;
use crate::domain::feature::FeatureSnapshot;
use crate::domain::feature_engine::FeatureEngine;
use crate::ports::scorer_port::ScorerPort;

pub const DEFAULT_WEIGHT: f64 = 0.1;
pub const DEFAULT_BUY_THRESHOLD: f64 = 0.9;
pub const DEFAULT_SELL_THRESHOLD: f64 = 0.2;
pub const DEFAULT_OPEN_GAP_THRESHOLD: f64 = 0.05;
pub const DEFAULT_GAP_SCORE: f64 = 0.92;
pub const DEFAULT_BASELINE_SCORE: f64 = 0.78;
pub const DEFAULT_EXCHANGE_TZ: Tz = chrono_tz::Asia::Shanghai;

/// Model inputs used when none are configured.
pub const CANONICAL_MODEL_FEATURES: [&str; 8] = [
    "prev_intraday_return_3",
    "open_return",
    "prev_intraday_return_2",
    "prev_intraday_return_1",
    "intraday_return",
    "intraday_return_from_prev_close",
    "breakout",
    "breakout_ema",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Buy => "Buy",
            Direction::Sell => "Sell",
            Direction::Hold => "Hold",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingSignal {
    pub instrument: String,
    pub direction: Direction,
    pub reason: String,
    pub suggested_price: f64,
    /// Exchange-local wall clock time.
    pub timestamp: NaiveDateTime,
    /// Target fraction of portfolio value.
    pub weight: f64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    Breakout,
    OpenGap,
    Model,
}

impl ScoringMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMode::Breakout => "breakout",
            ScoringMode::OpenGap => "open_gap",
            ScoringMode::Model => "model",
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakout" => Ok(ScoringMode::Breakout),
            "open_gap" | "rule" => Ok(ScoringMode::OpenGap),
            "model" => Ok(ScoringMode::Model),
            other => Err(format!(
                "unknown scoring mode '{other}' (expected breakout, open_gap or model)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalConfig {
    pub scoring: ScoringMode,
    pub default_weight: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub open_gap_threshold: f64,
    pub gap_score: f64,
    pub baseline_score: f64,
    pub model_features: Vec<String>,
    pub exchange_tz: Tz,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringMode::Breakout,
            default_weight: DEFAULT_WEIGHT,
            buy_threshold: DEFAULT_BUY_THRESHOLD,
            sell_threshold: DEFAULT_SELL_THRESHOLD,
            open_gap_threshold: DEFAULT_OPEN_GAP_THRESHOLD,
            gap_score: DEFAULT_GAP_SCORE,
            baseline_score: DEFAULT_BASELINE_SCORE,
            model_features: CANONICAL_MODEL_FEATURES.iter().map(|s| s.to_string()).collect(),
            exchange_tz: DEFAULT_EXCHANGE_TZ,
        }
    }
}

pub fn direction_for_score(score: f64, buy_threshold: f64, sell_threshold: f64) -> Direction {
    if score > buy_threshold {
        Direction::Buy
    } else if score < sell_threshold {
        Direction::Sell
    } else {
        Direction::Hold
    }
}

pub fn to_exchange_time(timestamp: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    timestamp.with_timezone(&tz).naive_local()
}

/// Named model inputs in a fixed order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, f64)>,
}

impl FeatureVector {
    pub fn new(entries: Vec<(String, f64)>) -> Self {
        Self { entries }
    }

    pub fn from_snapshot(snapshot: &FeatureSnapshot, names: &[String]) -> Result<Self, PipelineError> {
        let entries = names
            .iter()
            .map(|name| {
                snapshot
                    .feature(name)
                    .map(|v| (name.clone(), v))
                    .ok_or_else(|| PipelineError::Scorer {
                        reason: format!("unknown feature '{name}'"),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct Evaluation {
    direction: Direction,
    reason: String,
    score: Option<f64>,
}

pub struct SignalGenerator {
    config: SignalConfig,
    scorer: Option<Box<dyn ScorerPort>>,
    history: HashMap<String, Vec<TradingSignal>>,
}

impl SignalGenerator {
    pub fn new(config: SignalConfig) -> Self {
        Self {
            config,
            scorer: None,
            history: HashMap::new(),
        }
    }

    pub fn with_scorer(mut self, scorer: Box<dyn ScorerPort>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// One signal per registered instrument that has an intraday bar in `tick`
    /// and a ready snapshot built from that bar. Holds are returned but not
    /// recorded in the history.
    pub fn generate(&mut self, tick: &Tick, engine: &FeatureEngine) -> Vec<TradingSignal> {
        let mut signals = Vec::new();
        for instrument in engine.instruments() {
            let Some(bar) = tick.intraday_bar(instrument) else {
                continue;
            };
            let Some(snapshot) = engine.snapshot(instrument) else {
                continue;
            };
            if snapshot.timestamp != Some(bar.timestamp) {
                debug!(instrument, "snapshot not built from this tick's bar, skipping");
                continue;
            }
            if !snapshot.ready {
                debug!(instrument, "features not ready");
                continue;
            }

            let evaluation = self.evaluate(instrument, snapshot);
            let signal = TradingSignal {
                instrument: instrument.to_string(),
                direction: evaluation.direction,
                reason: evaluation.reason,
                suggested_price: bar.close,
                timestamp: to_exchange_time(bar.timestamp, self.config.exchange_tz),
                weight: self.config.default_weight,
                score: evaluation.score,
            };
            if signal.direction != Direction::Hold {
                debug!(instrument, direction = %signal.direction, reason = %signal.reason, "signal");
                self.history
                    .entry(signal.instrument.clone())
                    .or_default()
                    .push(signal.clone());
            }
            signals.push(signal);
        }
        signals
    }

    /// Non-Hold signals emitted for `instrument`, oldest first.
    pub fn history(&self, instrument: &str) -> &[TradingSignal] {
        self.history
            .get(instrument)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn evaluate(&self, instrument: &str, snapshot: &FeatureSnapshot) -> Evaluation {
        match self.config.scoring {
            ScoringMode::Breakout => {
                if snapshot.buy_candidate {
                    Evaluation {
                        direction: Direction::Buy,
                        reason: "breakout on tagged setup".into(),
                        score: None,
                    }
                } else {
                    Evaluation {
                        direction: Direction::Hold,
                        reason: String::new(),
                        score: None,
                    }
                }
            }
            ScoringMode::OpenGap => self.rule_score(snapshot),
            ScoringMode::Model => match self.model_score(snapshot) {
                Ok(score) => Evaluation {
                    direction: self.direction(score),
                    reason: format!("model score {score:.4}"),
                    score: Some(score),
                },
                Err(e) => {
                    warn!(instrument, error = %e, "model score unavailable, using rule score");
                    self.rule_score(snapshot)
                }
            },
        }
    }

    fn model_score(&self, snapshot: &FeatureSnapshot) -> Result<f64, PipelineError> {
        let scorer = self.scorer.as_ref().ok_or_else(|| PipelineError::Scorer {
            reason: "no scorer configured".into(),
        })?;
        let vector = FeatureVector::from_snapshot(snapshot, &self.config.model_features)?;
        let score = scorer.score(&vector)?;
        if !score.is_finite() {
            return Err(PipelineError::Scorer {
                reason: format!("non-finite score {score}"),
            });
        }
        Ok(score)
    }

    fn rule_score(&self, snapshot: &FeatureSnapshot) -> Evaluation {
        let (score, reason) = if snapshot.open_return > self.config.open_gap_threshold {
            (self.config.gap_score, "gap-up open")
        } else {
            (self.config.baseline_score, "baseline")
        };
        Evaluation {
            direction: self.direction(score),
            reason: reason.into(),
            score: Some(score),
        }
    }

    fn direction(&self, score: f64) -> Direction {
        direction_for_score(score, self.config.buy_threshold, self.config.sell_threshold)
    }
}
