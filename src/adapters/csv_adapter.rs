//! CSV bar feed: one file per instrument and timeframe, `{code}_{timeframe}.csv`.
//!
//! Columns are matched by header name: `timestamp,open,high,low,close,volume`
//! are required; `amount` and the daily label columns (`strategy_tag`,
//! `next_open`, `next_close`, `next2_open`, `next2_close`, `next5_close`)
//! are optional. Timestamps are UTC, `%Y-%m-%d %H:%M:%S` or a bare date.

use crate::domain::bar::{Bar, DailyLabels, Timeframe};
use crate::domain::error::PipelineError;
use crate::ports::data_port::MarketDataPort;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    strategy_tag: Option<String>,
    #[serde(default)]
    next_open: Option<f64>,
    #[serde(default)]
    next_close: Option<f64>,
    #[serde(default)]
    next2_open: Option<f64>,
    #[serde(default)]
    next2_close: Option<f64>,
    #[serde(default)]
    next5_close: Option<f64>,
}

impl BarRow {
    fn has_labels(&self) -> bool {
        self.strategy_tag.is_some()
            || self.next_open.is_some()
            || self.next_close.is_some()
            || self.next2_open.is_some()
            || self.next2_close.is_some()
            || self.next5_close.is_some()
    }

    fn into_bar(self, instrument: &str, timeframe: Timeframe) -> Result<Bar, PipelineError> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| PipelineError::Data {
            instrument: instrument.to_string(),
            reason: format!("invalid timestamp '{}'", self.timestamp),
        })?;
        let labels = self.has_labels().then(|| DailyLabels {
            strategy_tag: self.strategy_tag.clone().unwrap_or_default(),
            next_open: self.next_open.unwrap_or(0.0),
            next_close: self.next_close.unwrap_or(0.0),
            next2_open: self.next2_open.unwrap_or(0.0),
            next2_close: self.next2_close.unwrap_or(0.0),
            next5_close: self.next5_close.unwrap_or(0.0),
        });
        Ok(Bar {
            instrument: instrument.to_string(),
            timeframe,
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            amount: self.amount.unwrap_or(0.0),
            labels,
        })
    }
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .ok()
        .map(|dt| dt.and_utc())
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", code, timeframe))
    }
}

impl MarketDataPort for CsvAdapter {
    fn fetch_bars(&self, instrument: &str, timeframe: Timeframe) -> Result<Vec<Bar>, PipelineError> {
        let path = self.csv_path(instrument, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| PipelineError::Data {
            instrument: instrument.to_string(),
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for result in rdr.deserialize::<BarRow>() {
            let row = result.map_err(|e| PipelineError::Data {
                instrument: instrument.to_string(),
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;
            bars.push(row.into_bar(instrument, timeframe)?);
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn list_instruments(&self) -> Result<Vec<String>, PipelineError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| PipelineError::Data {
            instrument: "*".into(),
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            let Some((code, timeframe)) = stem.rsplit_once('_') else {
                continue;
            };
            if timeframe.parse::<Timeframe>().is_ok() && !codes.iter().any(|c| c == code) {
                codes.push(code.to_string());
            }
        }

        codes.sort();
        Ok(codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        fs::write(
            path.join("SH.600000_intraday.csv"),
            "timestamp,open,high,low,close,volume,amount\n\
             2024-03-04 01:35:00,10.1,10.2,10.0,10.15,12000,121800\n\
             2024-03-04 01:30:00,10.0,10.1,9.9,10.05,10000,100500\n",
        )
        .unwrap();
        fs::write(
            path.join("SH.600000_daily.csv"),
            "timestamp,open,high,low,close,volume,strategy_tag,next_open,next_close\n\
             2024-03-01 07:00:00,9.8,10.0,9.7,9.95,1500000,trend,10.0,\n",
        )
        .unwrap();
        fs::write(
            path.join("SH.000300_benchmark.csv"),
            "timestamp,open,high,low,close,volume\n2024-03-04,3500,3520,3490,3510,0\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    #[test]
    fn fetch_intraday_sorted_by_timestamp() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let bars = adapter.fetch_bars("SH.600000", Timeframe::Intraday).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 4, 1, 30, 0).unwrap());
        assert_eq!(bars[0].close, 10.05);
        assert_eq!(bars[1].amount, 121800.0);
        assert_eq!(bars[0].timeframe, Timeframe::Intraday);
        assert!(bars[0].labels.is_none());
    }

    #[test]
    fn daily_labels_default_to_zero() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let bars = adapter.fetch_bars("SH.600000", Timeframe::Daily).unwrap();

        let labels = bars[0].labels.as_ref().unwrap();
        assert_eq!(labels.strategy_tag, "trend");
        assert_eq!(labels.next_open, 10.0);
        assert_eq!(labels.next_close, 0.0);
        assert_eq!(labels.next5_close, 0.0);
        assert_eq!(bars[0].amount, 0.0);
    }

    #[test]
    fn bare_date_is_midnight_utc() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let bars = adapter.fetch_bars("SH.000300", Timeframe::Benchmark).unwrap();
        assert_eq!(bars[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn missing_file_is_data_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        let err = adapter.fetch_bars("SZ.000001", Timeframe::Intraday).unwrap_err();
        assert!(matches!(err, PipelineError::Data { ref instrument, .. } if instrument == "SZ.000001"));
    }

    #[test]
    fn bad_timestamp_is_data_error() {
        let (_dir, path) = setup_test_data();
        fs::write(
            path.join("SZ.000001_intraday.csv"),
            "timestamp,open,high,low,close,volume\n03/04/2024,1,1,1,1,1\n",
        )
        .unwrap();
        let adapter = CsvAdapter::new(path);
        assert!(adapter.fetch_bars("SZ.000001", Timeframe::Intraday).is_err());
    }

    #[test]
    fn list_instruments_scans_known_timeframes() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_instruments().unwrap(), vec!["SH.000300", "SH.600000"]);
    }
}
