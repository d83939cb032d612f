//! Typed pipeline configuration built from a [`ConfigPort`].
//!
//! A named [`Profile`] is a preset: it picks the scoring strategy along with
//! its thresholds, position weight and pyramiding policy. Every key of the
//! `[features]`, `[signal]`, `[risk]` and `[execution]` sections then
//! overrides the preset individually.
//!
//! | profile    | buy / sell | weight | pyramiding |
//! |------------|------------|--------|------------|
//! | `breakout` | 0.9 / 0.2  | 0.1    | none       |
//! | `open_gap` | 0.9 / 0.2  | 0.05   | target     |
//! | `model`    | 0.85 / 0.3 | 0.1    | none       |

use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::domain::error::PipelineError;
use crate::domain::execution::{ExecutionConfig, PyramidPolicy};
use crate::domain::feature::is_feature_name;
use crate::domain::feature_engine::FeatureConfig;
use crate::domain::risk::RiskConfig;
use crate::domain::signal::{ScoringMode, SignalConfig};
use crate::domain::strategy_tag::StrategyTagMap;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    #[default]
    Breakout,
    OpenGap,
    Model,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Breakout => "breakout",
            Profile::OpenGap => "open_gap",
            Profile::Model => "model",
        }
    }

    pub fn scoring(&self) -> ScoringMode {
        match self {
            Profile::Breakout => ScoringMode::Breakout,
            Profile::OpenGap => ScoringMode::OpenGap,
            Profile::Model => ScoringMode::Model,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakout" => Ok(Profile::Breakout),
            "open_gap" | "opengap" => Ok(Profile::OpenGap),
            "model" => Ok(Profile::Model),
            other => Err(format!(
                "unknown profile '{other}' (expected breakout, open_gap or model)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub profile: Profile,
    pub features: FeatureConfig,
    pub signal: SignalConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
}

impl PipelineConfig {
    /// Defaults of a profile before any per-key override.
    pub fn for_profile(profile: Profile) -> Self {
        let base = SignalConfig::default();
        let signal = match profile {
            Profile::Breakout => SignalConfig {
                scoring: ScoringMode::Breakout,
                ..base
            },
            // Gap days are bought in smaller slices and topped up while
            // the gap keeps scoring.
            Profile::OpenGap => SignalConfig {
                scoring: ScoringMode::OpenGap,
                default_weight: 0.05,
                open_gap_threshold: 0.05,
                gap_score: 0.92,
                baseline_score: 0.78,
                ..base
            },
            // Rule fallback scores must land between the thresholds.
            Profile::Model => SignalConfig {
                scoring: ScoringMode::Model,
                buy_threshold: 0.85,
                sell_threshold: 0.3,
                ..base
            },
        };
        let pyramiding = match profile {
            Profile::OpenGap => PyramidPolicy::PyramidToTarget,
            Profile::Breakout | Profile::Model => PyramidPolicy::NoPyramiding,
        };
        let execution = ExecutionConfig {
            default_weight: signal.default_weight,
            pyramiding,
            ..ExecutionConfig::default()
        };
        Self {
            profile,
            features: FeatureConfig::default(),
            signal,
            risk: RiskConfig::default(),
            execution,
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PipelineError> {
        let profile = parse_key(config, "pipeline", "profile")?.unwrap_or_default();
        let mut out = Self::for_profile(profile);

        if let Some(tz) = config.get_string("pipeline", "exchange_timezone") {
            out.signal.exchange_tz = tz
                .trim()
                .parse::<Tz>()
                .map_err(|e| PipelineError::config_invalid("pipeline", "exchange_timezone", e.to_string()))?;
        }

        let f = &mut out.features;
        f.breakout_lookback =
            config.get_int("features", "breakout_lookback", f.breakout_lookback as i64).max(0) as usize;
        f.macd_trend_threshold =
            config.get_double("features", "macd_trend_threshold", f.macd_trend_threshold);
        f.buy_strategy_tag = config.get_double("features", "buy_strategy_tag", f.buy_strategy_tag);
        if let Some(tags) = config.get_string("features", "strategy_tags") {
            let extra = StrategyTagMap::parse(&tags)
                .map_err(|e| PipelineError::config_invalid("features", "strategy_tags", e.to_string()))?;
            f.strategy_tags.merge(extra);
        }

        let s = &mut out.signal;
        if let Some(scoring) = parse_key(config, "signal", "scoring")? {
            s.scoring = scoring;
        }
        s.default_weight = config.get_double("signal", "default_weight", s.default_weight);
        s.buy_threshold = config.get_double("signal", "buy_threshold", s.buy_threshold);
        s.sell_threshold = config.get_double("signal", "sell_threshold", s.sell_threshold);
        s.open_gap_threshold =
            config.get_double("signal", "open_gap_threshold", s.open_gap_threshold);
        s.gap_score = config.get_double("signal", "gap_score", s.gap_score);
        s.baseline_score = config.get_double("signal", "baseline_score", s.baseline_score);
        let names = config.get_list("signal", "model_features");
        if !names.is_empty() {
            if let Some(unknown) = names.iter().find(|n| !is_feature_name(n)) {
                return Err(PipelineError::config_invalid(
                    "signal",
                    "model_features",
                    format!("unknown feature '{unknown}'"),
                ));
            }
            s.model_features = names;
        }

        out.risk.stop_loss_pct = config.get_double("risk", "stop_loss_pct", out.risk.stop_loss_pct);
        out.risk.take_profit_pct =
            config.get_double("risk", "take_profit_pct", out.risk.take_profit_pct);

        let e = &mut out.execution;
        e.default_weight = out.signal.default_weight;
        e.lot_size = config.get_int("execution", "lot_size", e.lot_size);
        if let Some(cutoff) = config.get_string("execution", "sell_cutoff") {
            e.sell_cutoff = parse_time(&cutoff)
                .ok_or_else(|| PipelineError::config_invalid("execution", "sell_cutoff", "expected HH:MM"))?;
        }
        if let Some(policy) = parse_key::<PyramidPolicy>(config, "execution", "pyramiding")? {
            e.pyramiding = policy;
        }

        Ok(out)
    }
}

/// `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn parse_key<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<T>, PipelineError>
where
    T: FromStr<Err = String>,
{
    config
        .get_string(section, key)
        .map(|v| v.parse::<T>().map_err(|e| PipelineError::config_invalid(section, key, e)))
        .transpose()
}
