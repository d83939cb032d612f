//! SQLite feature log.
//!
//! Rows are buffered and written in batches, each batch inside one
//! transaction. Feature values are stored as a JSON payload so the table
//! survives schema version bumps. A batch that fails to write is dropped,
//! so the buffer never holds more than one batch.

use crate::domain::error::PipelineError;
use crate::domain::feature_row::FeatureRow;
use crate::ports::feature_log_port::FeatureLogPort;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::warn;

pub const DEFAULT_BATCH_SIZE: usize = 256;

pub struct SqliteFeatureLog {
    pool: Pool<SqliteConnectionManager>,
    pending: Vec<FeatureRow>,
    batch_size: usize,
}

fn db_err(e: r2d2::Error) -> PipelineError {
    PipelineError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PipelineError {
    PipelineError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteFeatureLog {
    pub fn open(path: &str, batch_size: usize) -> Result<Self, PipelineError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(2).build(manager).map_err(db_err)?;
        Self::with_pool(pool, batch_size)
    }

    pub fn in_memory() -> Result<Self, PipelineError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;
        Self::with_pool(pool, DEFAULT_BATCH_SIZE)
    }

    fn with_pool(pool: Pool<SqliteConnectionManager>, batch_size: usize) -> Result<Self, PipelineError> {
        let log = Self {
            pool,
            pending: Vec::new(),
            batch_size: batch_size.max(1),
        };
        log.initialize_schema()?;
        Ok(log)
    }

    fn initialize_schema(&self) -> Result<(), PipelineError> {
        let conn = self.pool.get().map_err(db_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS feature_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                schema_version INTEGER NOT NULL,
                instrument TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                payload TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_feature_rows_instrument ON feature_rows(instrument, timestamp);",
        )
        .map_err(query_err)
    }

    fn write_pending(&mut self) -> Result<(), PipelineError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        self.insert_batch(&batch).inspect_err(|e| {
            warn!(rows = batch.len(), error = %e, "feature log batch dropped");
        })
    }

    fn insert_batch(&self, batch: &[FeatureRow]) -> Result<(), PipelineError> {
        let mut conn = self.pool.get().map_err(db_err)?;
        let tx = conn.transaction().map_err(query_err)?;
        for row in batch {
            tx.execute(
                "INSERT INTO feature_rows (schema_version, instrument, timestamp, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    row.schema_version,
                    row.instrument,
                    row.timestamp,
                    row.payload().to_string()
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    pub fn row_count(&self, instrument: &str) -> Result<usize, PipelineError> {
        let conn = self.pool.get().map_err(db_err)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM feature_rows WHERE instrument = ?1",
                params![instrument],
                |row| row.get(0),
            )
            .map_err(query_err)?;
        Ok(count as usize)
    }

    /// Payloads for `instrument`, oldest first.
    pub fn payloads(&self, instrument: &str) -> Result<Vec<serde_json::Value>, PipelineError> {
        let conn = self.pool.get().map_err(db_err)?;
        let mut stmt = conn
            .prepare("SELECT payload FROM feature_rows WHERE instrument = ?1 ORDER BY id ASC")
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![instrument], |row| row.get::<_, String>(0))
            .map_err(query_err)?;

        let mut out = Vec::new();
        for row in rows {
            let text = row.map_err(query_err)?;
            let value = serde_json::from_str(&text).map_err(|e| PipelineError::FeatureLog {
                reason: e.to_string(),
            })?;
            out.push(value);
        }
        Ok(out)
    }
}

impl FeatureLogPort for SqliteFeatureLog {
    fn append(&mut self, row: &FeatureRow) -> Result<(), PipelineError> {
        self.pending.push(row.clone());
        if self.pending.len() >= self.batch_size {
            self.write_pending()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PipelineError> {
        self.write_pending()
    }
}
