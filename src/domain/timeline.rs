//! Merging per-instrument bar lists into an ordered tick sequence.

use crate::domain::bar::{Bar, Tick};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Groups bars by timestamp, oldest first. Within a tick, bars keep their
/// input order, so callers that load benchmark and daily data before intraday
/// data get those series advanced first.
pub fn build_ticks(bars: Vec<Bar>) -> Vec<Tick> {
    let mut grouped: BTreeMap<DateTime<Utc>, Vec<Bar>> = BTreeMap::new();
    for bar in bars {
        grouped.entry(bar.timestamp).or_default().push(bar);
    }
    grouped
        .into_iter()
        .map(|(timestamp, bars)| Tick::new(timestamp, bars))
        .collect()
}

/// First and last timestamp plus count, or `None` for an empty list.
pub fn data_range(bars: &[Bar]) -> Option<(DateTime<Utc>, DateTime<Utc>, usize)> {
    let first = bars.iter().map(|b| b.timestamp).min()?;
    let last = bars.iter().map(|b| b.timestamp).max()?;
    Some((first, last, bars.len()))
}
