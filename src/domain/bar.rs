//! Bar representation for the intraday, daily and benchmark feeds.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

use super::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timeframe {
    Intraday,
    Daily,
    Benchmark,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Timeframe::Intraday, Timeframe::Daily, Timeframe::Benchmark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Intraday => "intraday",
            Timeframe::Daily => "daily",
            Timeframe::Benchmark => "benchmark",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "intraday" | "minute" => Ok(Timeframe::Intraday),
            "daily" | "day" => Ok(Timeframe::Daily),
            "benchmark" | "index" => Ok(Timeframe::Benchmark),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}

/// Externally supplied fields carried on daily rows.
///
/// `next_open` is the open of the session following the row, which is how the
/// opening gap of the live session is observed. The remaining forward closes are
/// only used as training labels. Absent values are 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyLabels {
    pub strategy_tag: String,
    pub next_open: f64,
    pub next_close: f64,
    pub next2_open: f64,
    pub next2_close: f64,
    pub next5_close: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    pub labels: Option<DailyLabels>,
}

impl Bar {
    /// Rejects bars whose prices or volume cannot feed the indicators.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
            ("amount", self.amount),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(PipelineError::InvalidBar {
                    instrument: self.instrument.clone(),
                    reason: format!("{name} is not finite at {}", self.timestamp),
                });
            }
        }
        if self.close < 0.0 || self.volume < 0.0 {
            return Err(PipelineError::InvalidBar {
                instrument: self.instrument.clone(),
                reason: format!("negative close or volume at {}", self.timestamp),
            });
        }
        Ok(())
    }
}

/// Bars that share one feed timestamp: at most one per (instrument, timeframe).
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bars: Vec<Bar>,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, bars: Vec<Bar>) -> Self {
        Self { timestamp, bars }
    }

    /// The intraday bar for `instrument`, which is what counts as fresh data.
    pub fn intraday_bar(&self, instrument: &str) -> Option<&Bar> {
        self.bars
            .iter()
            .find(|b| b.timeframe == Timeframe::Intraday && b.instrument == instrument)
    }

    pub fn has_fresh_data(&self, instrument: &str) -> bool {
        self.intraday_bar(instrument).is_some()
    }
}
