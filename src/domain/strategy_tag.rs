//! Mapping of the daily strategy label onto a decimal.
//!
//! Daily rows carry a categorical label naming the screen that selected the
//! instrument. Features compare it numerically, so each label is encoded as:
//! exact table match, else the label parsed as a number, else 0.
//!
//! The default table holds the five screens the daily feed labels with;
//! `[features] strategy_tags` entries are layered on top of it.

use std::collections::HashMap;

/// Screen labels of the daily feed and their codes.
pub const BUILTIN_TAGS: [(&str, f64); 5] = [
    ("长上影试盘战法", 1.0),
    ("潜龙出水，温和放量", 2.0),
    ("上升通道修整", 3.0),
    ("BOLL突破，均线共振", 4.0),
    ("回踩支撑，趋势向上", 5.0),
];

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyTagMap {
    entries: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyTagError {
    #[error("tag entry '{0}' is not in label:value form")]
    MalformedEntry(String),

    #[error("tag value for '{label}' is not a number: {value}")]
    InvalidValue { label: String, value: String },

    #[error("duplicate tag label: {0}")]
    DuplicateLabel(String),
}

impl Default for StrategyTagMap {
    fn default() -> Self {
        let mut map = Self::new();
        for (label, value) in BUILTIN_TAGS {
            map.insert(label, value);
        }
        map
    }
}

impl StrategyTagMap {
    /// A map with no table entries.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Parses `label:value,label:value`. An empty string gives an empty map.
    pub fn parse(input: &str) -> Result<Self, StrategyTagError> {
        let mut map = Self::new();
        for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (label, value) = token
                .rsplit_once(':')
                .ok_or_else(|| StrategyTagError::MalformedEntry(token.to_string()))?;
            let label = label.trim();
            if label.is_empty() {
                return Err(StrategyTagError::MalformedEntry(token.to_string()));
            }
            let value: f64 = value.trim().parse().map_err(|_| StrategyTagError::InvalidValue {
                label: label.to_string(),
                value: value.trim().to_string(),
            })?;
            if map.entries.insert(label.to_string(), value).is_some() {
                return Err(StrategyTagError::DuplicateLabel(label.to_string()));
            }
        }
        Ok(map)
    }

    pub fn insert(&mut self, label: &str, value: f64) {
        self.entries.insert(label.to_string(), value);
    }

    /// Adds `other`'s entries, replacing labels already present.
    pub fn merge(&mut self, other: StrategyTagMap) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self, label: &str) -> f64 {
        let label = label.trim();
        if let Some(&value) = self.entries.get(label) {
            return value;
        }
        match label.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => 0.0,
        }
    }
}
