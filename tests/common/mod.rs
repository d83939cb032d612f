#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tradepipe::domain::bar::{Bar, DailyLabels, Tick, Timeframe};
use tradepipe::domain::error::PipelineError;
use tradepipe::domain::feature_row::FeatureRow;
use tradepipe::domain::position::Holding;
use tradepipe::domain::signal::FeatureVector;
use tradepipe::ports::broker_port::{HoldingsPort, OrderPort};
use tradepipe::ports::feature_log_port::FeatureLogPort;
use tradepipe::ports::notify_port::{NotifyPort, OrderNotice};
use tradepipe::ports::scorer_port::ScorerPort;

pub const CODE: &str = "SH.600000";
pub const OTHER: &str = "SZ.000001";
pub const BENCHMARK: &str = "SH.000300";

pub fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
}

/// 09:30 Shanghai on 2024-03-04.
pub fn session_open() -> DateTime<Utc> {
    utc(2024, 3, 4, 1, 30)
}

pub fn intraday_bar(code: &str, ts: DateTime<Utc>, open: f64, close: f64) -> Bar {
    Bar {
        instrument: code.to_string(),
        timeframe: Timeframe::Intraday,
        timestamp: ts,
        open,
        high: open.max(close),
        low: open.min(close),
        close,
        volume: 1000.0,
        amount: 1000.0 * close,
        labels: None,
    }
}

pub fn daily_bar(code: &str, ts: DateTime<Utc>, close: f64, tag: &str) -> Bar {
    Bar {
        instrument: code.to_string(),
        timeframe: Timeframe::Daily,
        timestamp: ts,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1_000_000.0,
        amount: 1_000_000.0 * close,
        labels: Some(DailyLabels {
            strategy_tag: tag.to_string(),
            ..DailyLabels::default()
        }),
    }
}

pub fn benchmark_bar(ts: DateTime<Utc>, close: f64) -> Bar {
    Bar {
        instrument: BENCHMARK.to_string(),
        timeframe: Timeframe::Benchmark,
        timestamp: ts,
        open: close,
        high: close,
        low: close,
        close,
        volume: 0.0,
        amount: 0.0,
        labels: None,
    }
}

/// One tick per close, one minute apart from `start`.
pub fn minute_ticks(code: &str, start: DateTime<Utc>, closes: &[f64]) -> Vec<Tick> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let ts = start + Duration::minutes(i as i64);
            Tick::new(ts, vec![intraday_bar(code, ts, c, c)])
        })
        .collect()
}

#[derive(Default)]
pub struct MockBroker {
    pub total_value: f64,
    pub holdings: HashMap<String, Holding>,
    pub prices: HashMap<String, f64>,
    pub orders: Vec<(String, i64)>,
    pub reject: bool,
}

impl MockBroker {
    pub fn new(total_value: f64) -> Self {
        Self {
            total_value,
            ..Default::default()
        }
    }

    pub fn hold(&mut self, code: &str, quantity: i64, average: f64, current: f64) {
        self.holdings.insert(
            code.to_string(),
            Holding {
                instrument: code.to_string(),
                quantity,
                average_price: average,
                current_price: current,
            },
        );
    }
}

impl HoldingsPort for MockBroker {
    fn holding(&self, instrument: &str) -> Option<Holding> {
        self.holdings.get(instrument).cloned()
    }

    fn holdings(&self) -> Vec<Holding> {
        let mut all: Vec<Holding> = self.holdings.values().cloned().collect();
        all.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        all
    }

    fn total_value(&self) -> f64 {
        self.total_value
    }

    fn market_price(&self, instrument: &str) -> Option<f64> {
        self.prices.get(instrument).copied()
    }
}

impl OrderPort for MockBroker {
    fn submit_order(&mut self, instrument: &str, quantity: i64) -> Result<(), PipelineError> {
        if self.reject {
            return Err(PipelineError::OrderRejected {
                instrument: instrument.to_string(),
                reason: "rejected by mock".into(),
            });
        }
        self.orders.push((instrument.to_string(), quantity));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub notices: Rc<RefCell<Vec<OrderNotice>>>,
    pub fail: bool,
}

impl NotifyPort for RecordingNotifier {
    fn notify(&self, notice: &OrderNotice) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::Notify {
                reason: "unreachable".into(),
            });
        }
        self.notices.borrow_mut().push(notice.clone());
        Ok(())
    }
}

pub struct FixedScorer(pub f64);

impl ScorerPort for FixedScorer {
    fn score(&self, _features: &FeatureVector) -> Result<f64, PipelineError> {
        Ok(self.0)
    }
}

pub struct FailingScorer;

impl ScorerPort for FailingScorer {
    fn score(&self, _features: &FeatureVector) -> Result<f64, PipelineError> {
        Err(PipelineError::Scorer {
            reason: "model offline".into(),
        })
    }
}

#[derive(Clone, Default)]
pub struct MemoryFeatureLog {
    pub rows: Rc<RefCell<Vec<FeatureRow>>>,
    pub flushed: Rc<RefCell<bool>>,
    pub fail: bool,
}

impl FeatureLogPort for MemoryFeatureLog {
    fn append(&mut self, row: &FeatureRow) -> Result<(), PipelineError> {
        if self.fail {
            return Err(PipelineError::FeatureLog {
                reason: "disk full".into(),
            });
        }
        self.rows.borrow_mut().push(row.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        *self.flushed.borrow_mut() = true;
        Ok(())
    }
}
