//! Feature snapshot: the derived quantities of one instrument at one point in time.

use chrono::{DateTime, Utc};

/// Three-state MACD trend of the daily series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacdTrend {
    Down = -1,
    #[default]
    Flat = 0,
    Up = 1,
}

impl MacdTrend {
    /// histogram = 2 * (DIFF - DEA); the sign of DIFF - DEA and the histogram
    /// magnitude against `threshold` decide the state.
    pub fn classify(diff: f64, dea: f64, threshold: f64) -> Self {
        let histogram = 2.0 * (diff - dea);
        if diff > dea && histogram > threshold {
            MacdTrend::Up
        } else if diff < dea && histogram < -threshold {
            MacdTrend::Down
        } else {
            MacdTrend::Flat
        }
    }

    pub fn value(self) -> f64 {
        self as i8 as f64
    }
}

/// Price vs MACD line disagreement against the prior bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Divergence {
    /// Price fell while the MACD line rose.
    Bullish = -1,
    #[default]
    None = 0,
    /// Price rose while the MACD line fell.
    Bearish = 1,
}

impl Divergence {
    pub fn classify(close: f64, prev_close: f64, line: f64, prev_line: f64) -> Self {
        if close > prev_close && line < prev_line {
            Divergence::Bearish
        } else if close < prev_close && line > prev_line {
            Divergence::Bullish
        } else {
            Divergence::None
        }
    }

    pub fn value(self) -> f64 {
        self as i8 as f64
    }
}

/// `cur / prev - 1`, or 0 when `prev` is zero or either side is unusable.
pub fn ret(cur: f64, prev: f64) -> f64 {
    if prev == 0.0 || !prev.is_finite() || !cur.is_finite() {
        return 0.0;
    }
    finite_or_zero(cur / prev - 1.0)
}

/// `num / den`, or 0 when `den` is zero or the result is not finite.
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() {
        return 0.0;
    }
    finite_or_zero(num / den)
}

pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() { x } else { 0.0 }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Stable names of every numeric field, in feature-log column order.
pub const FEATURE_NAMES: [&str; 34] = [
    "benchmark_return",
    "day_return",
    "day_return_5",
    "day_volume_ratio",
    "day_volume_ratio_3",
    "day_diff",
    "day_dea",
    "day_macd",
    "day_macd_trend",
    "open_return",
    "prev_open_return_1",
    "prev_open_return_2",
    "intraday_return",
    "intraday_return_5day",
    "prev_intraday_return_1",
    "prev_intraday_return_2",
    "prev_intraday_return_3",
    "intraday_return_from_prev_close",
    "breakout",
    "breakout_ema",
    "weak_to_strong",
    "intraday_volume_ratio",
    "intraday_volume_ratio_3",
    "ema_slope",
    "macd_divergence",
    "rsi",
    "intraday_diff",
    "intraday_dea",
    "intraday_macd",
    "strategy_tag",
    "buy_candidate",
    "day_return_label",
    "next_day_return_label",
    "five_day_return_label",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSnapshot {
    /// Timestamp of the latest intraday bar, if any.
    pub timestamp: Option<DateTime<Utc>>,
    pub close: f64,
    pub open: f64,
    /// Intraday MACD warmed up and at least one daily close observed.
    pub ready: bool,

    pub benchmark_return: f64,

    pub day_return: f64,
    pub day_return_5: f64,
    pub day_volume_ratio: f64,
    pub day_volume_ratio_3: f64,
    pub day_diff: f64,
    pub day_dea: f64,
    pub day_macd: f64,
    pub day_macd_trend: MacdTrend,

    pub open_return: f64,
    pub prev_open_return_1: f64,
    pub prev_open_return_2: f64,

    pub intraday_return: f64,
    pub intraday_return_5day: f64,
    pub prev_intraday_return_1: f64,
    pub prev_intraday_return_2: f64,
    pub prev_intraday_return_3: f64,
    pub intraday_return_from_prev_close: f64,

    pub breakout: bool,
    pub breakout_ema: bool,
    pub weak_to_strong: bool,

    pub intraday_volume_ratio: f64,
    pub intraday_volume_ratio_3: f64,
    pub ema_slope: f64,
    pub macd_divergence: Divergence,
    pub rsi: f64,
    pub intraday_diff: f64,
    pub intraday_dea: f64,
    pub intraday_macd: f64,

    pub strategy_tag: f64,
    pub buy_candidate: bool,

    pub day_return_label: f64,
    pub next_day_return_label: f64,
    pub five_day_return_label: f64,
}

impl FeatureSnapshot {
    /// Every numeric field paired with its stable name, in [`FEATURE_NAMES`] order.
    pub fn fields(&self) -> [(&'static str, f64); 34] {
        [
            ("benchmark_return", self.benchmark_return),
            ("day_return", self.day_return),
            ("day_return_5", self.day_return_5),
            ("day_volume_ratio", self.day_volume_ratio),
            ("day_volume_ratio_3", self.day_volume_ratio_3),
            ("day_diff", self.day_diff),
            ("day_dea", self.day_dea),
            ("day_macd", self.day_macd),
            ("day_macd_trend", self.day_macd_trend.value()),
            ("open_return", self.open_return),
            ("prev_open_return_1", self.prev_open_return_1),
            ("prev_open_return_2", self.prev_open_return_2),
            ("intraday_return", self.intraday_return),
            ("intraday_return_5day", self.intraday_return_5day),
            ("prev_intraday_return_1", self.prev_intraday_return_1),
            ("prev_intraday_return_2", self.prev_intraday_return_2),
            ("prev_intraday_return_3", self.prev_intraday_return_3),
            (
                "intraday_return_from_prev_close",
                self.intraday_return_from_prev_close,
            ),
            ("breakout", flag(self.breakout)),
            ("breakout_ema", flag(self.breakout_ema)),
            ("weak_to_strong", flag(self.weak_to_strong)),
            ("intraday_volume_ratio", self.intraday_volume_ratio),
            ("intraday_volume_ratio_3", self.intraday_volume_ratio_3),
            ("ema_slope", self.ema_slope),
            ("macd_divergence", self.macd_divergence.value()),
            ("rsi", self.rsi),
            ("intraday_diff", self.intraday_diff),
            ("intraday_dea", self.intraday_dea),
            ("intraday_macd", self.intraday_macd),
            ("strategy_tag", self.strategy_tag),
            ("buy_candidate", flag(self.buy_candidate)),
            ("day_return_label", self.day_return_label),
            ("next_day_return_label", self.next_day_return_label),
            ("five_day_return_label", self.five_day_return_label),
        ]
    }

    pub fn feature(&self, name: &str) -> Option<f64> {
        self.fields()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// Name of the first field that is NaN or infinite.
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.fields()
            .into_iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(n, _)| n)
    }
}

pub fn is_feature_name(name: &str) -> bool {
    FEATURE_NAMES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_up_requires_histogram_above_threshold() {
        assert_eq!(MacdTrend::classify(1.0, 0.8, 0.2), MacdTrend::Up);
        // histogram 0.2 is not strictly above
        assert_eq!(MacdTrend::classify(1.0, 0.9, 0.2), MacdTrend::Flat);
    }

    #[test]
    fn trend_down_mirrors_up() {
        assert_eq!(MacdTrend::classify(0.5, 0.7, 0.2), MacdTrend::Down);
        assert_eq!(MacdTrend::classify(0.5, 0.55, 0.2), MacdTrend::Flat);
        assert_eq!(MacdTrend::Down.value(), -1.0);
    }

    #[test]
    fn divergence_states() {
        assert_eq!(Divergence::classify(11.0, 10.0, 0.4, 0.5), Divergence::Bearish);
        assert_eq!(Divergence::classify(9.0, 10.0, 0.6, 0.5), Divergence::Bullish);
        assert_eq!(Divergence::classify(11.0, 10.0, 0.6, 0.5), Divergence::None);
        assert_eq!(Divergence::Bearish.value(), 1.0);
        assert_eq!(Divergence::Bullish.value(), -1.0);
    }

    #[test]
    fn ret_guards_zero_denominator() {
        assert_eq!(ret(10.0, 0.0), 0.0);
        assert!((ret(11.0, 10.0) - 0.1).abs() < 1e-12);
        assert_eq!(ret(f64::NAN, 10.0), 0.0);
    }

    #[test]
    fn ratio_guards_zero_and_overflow() {
        assert_eq!(ratio(5.0, 0.0), 0.0);
        assert_eq!(ratio(f64::MAX, f64::MIN_POSITIVE), 0.0);
        assert!((ratio(3.0, 2.0) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn field_names_match_constant() {
        let snapshot = FeatureSnapshot::default();
        let names: Vec<&str> = snapshot.fields().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, FEATURE_NAMES.to_vec());
    }

    #[test]
    fn feature_lookup_by_name() {
        let snapshot = FeatureSnapshot {
            open_return: 0.06,
            breakout: true,
            ..Default::default()
        };
        assert_eq!(snapshot.feature("open_return"), Some(0.06));
        assert_eq!(snapshot.feature("breakout"), Some(1.0));
        assert_eq!(snapshot.feature("no_such_feature"), None);
        assert!(is_feature_name("rsi"));
        assert!(!is_feature_name("close"));
    }

    #[test]
    fn default_snapshot_is_finite() {
        assert_eq!(FeatureSnapshot::default().first_non_finite(), None);
        let bad = FeatureSnapshot {
            ema_slope: f64::INFINITY,
            ..Default::default()
        };
        assert_eq!(bad.first_non_finite(), Some("ema_slope"));
    }
}
