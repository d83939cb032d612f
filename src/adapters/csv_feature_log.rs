//! CSV feature log: a header row, then one row per logged snapshot.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::domain::error::PipelineError;
use crate::domain::feature_row::{FeatureRow, SCHEMA_VERSION};
use crate::ports::feature_log_port::FeatureLogPort;

pub struct CsvFeatureLog {
    writer: csv::Writer<File>,
}

fn log_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::FeatureLog {
        reason: e.to_string(),
    }
}

impl CsvFeatureLog {
    /// Appends to `path`, writing the header only when the file is new or empty.
    /// An existing file must carry the current header.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;
        if !is_empty {
            check_header(path)?;
        }
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_empty {
            writer.write_record(FeatureRow::header()).map_err(log_err)?;
        }
        Ok(Self { writer })
    }
}

fn check_header(path: &Path) -> Result<(), PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(log_err)?;
    let found = reader.headers().map_err(log_err)?;
    if found.iter().ne(FeatureRow::header()) {
        return Err(PipelineError::FeatureLog {
            reason: format!(
                "{} has a header from another schema (expected version {SCHEMA_VERSION})",
                path.display()
            ),
        });
    }
    Ok(())
}

impl FeatureLogPort for CsvFeatureLog {
    fn append(&mut self, row: &FeatureRow) -> Result<(), PipelineError> {
        self.writer.write_record(row.record()).map_err(log_err)
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        self.writer.flush()?;
        Ok(())
    }
}
