//! Domain error types.

/// Top-level error type for tradepipe.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error for {instrument}: {reason}")]
    Data { instrument: String, reason: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error("invalid bar for {instrument}: {reason}")]
    InvalidBar { instrument: String, reason: String },

    #[error("unknown instrument {0}")]
    UnknownInstrument(String),

    #[error("non-finite feature {field} for {instrument}")]
    NonFiniteFeature { instrument: String, field: String },

    #[error("scorer error: {reason}")]
    Scorer { reason: String },

    #[error("order rejected for {instrument}: {reason}")]
    OrderRejected { instrument: String, reason: String },

    #[error("notification failed: {reason}")]
    Notify { reason: String },

    #[error("feature log error: {reason}")]
    FeatureLog { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        PipelineError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<&PipelineError> for std::process::ExitCode {
    fn from(err: &PipelineError) -> Self {
        let code: u8 = match err {
            PipelineError::Io(_) => 1,
            PipelineError::ConfigParse { .. }
            | PipelineError::ConfigMissing { .. }
            | PipelineError::ConfigInvalid { .. } => 2,
            PipelineError::Data { .. }
            | PipelineError::NoData { .. }
            | PipelineError::InvalidBar { .. }
            | PipelineError::UnknownInstrument(_)
            | PipelineError::NonFiniteFeature { .. } => 3,
            PipelineError::Scorer { .. }
            | PipelineError::OrderRejected { .. }
            | PipelineError::Notify { .. } => 4,
            PipelineError::Database { .. }
            | PipelineError::DatabaseQuery { .. }
            | PipelineError::FeatureLog { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_invalid_helper_fills_fields() {
        let err = PipelineError::config_invalid("risk", "stop_loss_pct", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid config value [risk] stop_loss_pct: must be positive"
        );
    }

    #[test]
    fn exit_codes_group_by_family() {
        let config = PipelineError::ConfigMissing {
            section: "replay".into(),
            key: "data_dir".into(),
        };
        let data = PipelineError::NoData {
            instrument: "SH.600000".into(),
        };
        let db = PipelineError::Database {
            reason: "locked".into(),
        };
        assert_eq!(
            format!("{:?}", std::process::ExitCode::from(&config)),
            format!("{:?}", std::process::ExitCode::from(2))
        );
        assert_eq!(
            format!("{:?}", std::process::ExitCode::from(&data)),
            format!("{:?}", std::process::ExitCode::from(3))
        );
        assert_eq!(
            format!("{:?}", std::process::ExitCode::from(&db)),
            format!("{:?}", std::process::ExitCode::from(5))
        );
    }
}
