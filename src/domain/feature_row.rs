//! Flat, versioned record of one snapshot for the feature log.

use serde_json::{Map, Value};

use crate::domain::feature::{FEATURE_NAMES, FeatureSnapshot};
use crate::domain::signal::{Direction, TradingSignal};

/// Bumped whenever columns are added, removed or reordered.
pub const SCHEMA_VERSION: u32 = 1;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LEADING_COLUMNS: [&str; 6] = [
    "schema_version",
    "instrument",
    "timestamp",
    "price",
    "direction",
    "score",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub schema_version: u32,
    pub instrument: String,
    /// Exchange-local time.
    pub timestamp: String,
    pub price: f64,
    pub direction: Direction,
    pub score: Option<f64>,
    pub features: Vec<(&'static str, f64)>,
}

impl FeatureRow {
    pub fn new(signal: &TradingSignal, snapshot: &FeatureSnapshot) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            instrument: signal.instrument.clone(),
            timestamp: signal.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            price: signal.suggested_price,
            direction: signal.direction,
            score: signal.score,
            features: snapshot.fields().to_vec(),
        }
    }

    pub fn header() -> Vec<&'static str> {
        LEADING_COLUMNS
            .iter()
            .chain(FEATURE_NAMES.iter())
            .copied()
            .collect()
    }

    /// Values in [`FeatureRow::header`] order; a missing score is empty.
    pub fn record(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(LEADING_COLUMNS.len() + self.features.len());
        out.push(self.schema_version.to_string());
        out.push(self.instrument.clone());
        out.push(self.timestamp.clone());
        out.push(self.price.to_string());
        out.push(self.direction.to_string());
        out.push(self.score.map(|s| s.to_string()).unwrap_or_default());
        out.extend(self.features.iter().map(|(_, v)| v.to_string()));
        out
    }

    /// Feature values keyed by name, plus price, direction and score.
    pub fn payload(&self) -> Value {
        let mut map = Map::new();
        map.insert("price".into(), Value::from(self.price));
        map.insert("direction".into(), Value::from(self.direction.to_string()));
        map.insert(
            "score".into(),
            self.score.map(Value::from).unwrap_or(Value::Null),
        );
        for (name, value) in &self.features {
            map.insert((*name).to_string(), Value::from(*value));
        }
        Value::Object(map)
    }
}
