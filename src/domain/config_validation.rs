//! Configuration validation.
//!
//! Checks value ranges before a run; parsing into typed configuration happens
//! in [`crate::domain::config`].

use crate::domain::config::{PipelineConfig, Profile};
use crate::domain::error::PipelineError;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;

pub fn validate_pipeline_config(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    validate_features(config)?;
    validate_signal(config)?;
    validate_risk(config)?;
    validate_execution(config)?;
    validate_notify(config)?;
    validate_feature_log(config)?;
    Ok(())
}

pub fn validate_replay_config(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    require(config, "replay", "data_dir")?;
    require(config, "pipeline", "benchmark")?;
    let codes = require(config, "replay", "codes")?;
    parse_codes(&codes).map_err(|e| PipelineError::config_invalid("replay", "codes", e.to_string()))?;

    let capital = config.get_double("replay", "initial_capital", 10_000_000.0);
    if capital <= 0.0 {
        return Err(PipelineError::config_invalid(
            "replay",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, PipelineError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(PipelineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn validate_features(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    let lookback = config.get_int("features", "breakout_lookback", 6);
    if lookback < 1 {
        return Err(PipelineError::config_invalid(
            "features",
            "breakout_lookback",
            "breakout_lookback must be at least 1",
        ));
    }
    let threshold = config.get_double("features", "macd_trend_threshold", 0.2);
    if threshold < 0.0 {
        return Err(PipelineError::config_invalid(
            "features",
            "macd_trend_threshold",
            "macd_trend_threshold must be non-negative",
        ));
    }
    Ok(())
}

/// Unset keys are checked at the values the selected profile would use.
fn validate_signal(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    let profile = config
        .get_string("pipeline", "profile")
        .and_then(|p| p.parse::<Profile>().ok())
        .unwrap_or_default();
    let preset = PipelineConfig::for_profile(profile).signal;
    let weight = config.get_double("signal", "default_weight", preset.default_weight);
    if weight <= 0.0 || weight > 1.0 {
        return Err(PipelineError::config_invalid(
            "signal",
            "default_weight",
            "default_weight must be between 0 and 1",
        ));
    }
    let buy = config.get_double("signal", "buy_threshold", preset.buy_threshold);
    let sell = config.get_double("signal", "sell_threshold", preset.sell_threshold);
    for (key, value) in [("buy_threshold", buy), ("sell_threshold", sell)] {
        if !(0.0..=1.0).contains(&value) {
            return Err(PipelineError::config_invalid(
                "signal",
                key,
                format!("{key} must be between 0 and 1"),
            ));
        }
    }
    if sell >= buy {
        return Err(PipelineError::config_invalid(
            "signal",
            "sell_threshold",
            "sell_threshold must be below buy_threshold",
        ));
    }
    let gap = config.get_double("signal", "open_gap_threshold", preset.open_gap_threshold);
    if gap < 0.0 {
        return Err(PipelineError::config_invalid(
            "signal",
            "open_gap_threshold",
            "open_gap_threshold must be non-negative",
        ));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    for (key, default) in [("stop_loss_pct", 0.02), ("take_profit_pct", 0.10)] {
        let value = config.get_double("risk", key, default);
        if value <= 0.0 {
            return Err(PipelineError::config_invalid(
                "risk",
                key,
                format!("{key} must be positive"),
            ));
        }
    }
    Ok(())
}

fn validate_execution(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    let lot = config.get_int("execution", "lot_size", 100);
    if lot < 1 {
        return Err(PipelineError::config_invalid(
            "execution",
            "lot_size",
            "lot_size must be at least 1",
        ));
    }
    Ok(())
}

fn validate_notify(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    let Some(url) = config.get_string("notify", "url") else {
        return Ok(());
    };
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(PipelineError::config_invalid(
            "notify",
            "url",
            "url must start with http:// or https://",
        ));
    }
    if config.get_int("notify", "timeout_ms", 500) < 1 {
        return Err(PipelineError::config_invalid(
            "notify",
            "timeout_ms",
            "timeout_ms must be at least 1",
        ));
    }
    if config.get_int("notify", "queue_capacity", 64) < 1 {
        return Err(PipelineError::config_invalid(
            "notify",
            "queue_capacity",
            "queue_capacity must be at least 1",
        ));
    }
    Ok(())
}

fn validate_feature_log(config: &dyn ConfigPort) -> Result<(), PipelineError> {
    let format = config
        .get_string("feature_log", "format")
        .unwrap_or_else(|| "csv".to_string());
    match format.trim().to_lowercase().as_str() {
        "csv" | "sqlite" => Ok(()),
        other => Err(PipelineError::config_invalid(
            "feature_log",
            "format",
            format!("unknown format '{other}' (expected csv or sqlite)"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn empty_config_uses_valid_defaults() {
        assert!(validate_pipeline_config(&make_config("")).is_ok());
    }

    #[test]
    fn full_pipeline_config_passes() {
        let config = make_config(
            r#"
[features]
breakout_lookback = 8
macd_trend_threshold = 0.1

[signal]
default_weight = 0.2
buy_threshold = 0.85
sell_threshold = 0.3

[risk]
stop_loss_pct = 0.03
take_profit_pct = 0.12

[execution]
lot_size = 100

[notify]
url = http://127.0.0.1:9000/orders
timeout_ms = 250

[feature_log]
path = features.db
format = sqlite
"#,
        );
        assert!(validate_pipeline_config(&config).is_ok());
    }

    #[test]
    fn zero_lookback_fails() {
        let err = validate_pipeline_config(&make_config("[features]\nbreakout_lookback = 0\n")).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "breakout_lookback"));
    }

    #[test]
    fn weight_above_one_fails() {
        let err = validate_pipeline_config(&make_config("[signal]\ndefault_weight = 1.5\n")).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "default_weight"));
    }

    #[test]
    fn inverted_thresholds_fail() {
        let err = validate_pipeline_config(&make_config(
            "[signal]\nbuy_threshold = 0.3\nsell_threshold = 0.6\n",
        ))
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "sell_threshold"));
    }

    #[test]
    fn thresholds_compare_against_profile_preset() {
        // below the breakout buy threshold, above the model one
        let config = "[pipeline]\nprofile = model\n[signal]\nsell_threshold = 0.86\n";
        let err = validate_pipeline_config(&make_config(config)).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "sell_threshold"));
        assert!(validate_pipeline_config(&make_config("[signal]\nsell_threshold = 0.86\n")).is_ok());
    }

    #[test]
    fn non_positive_stop_loss_fails() {
        let err = validate_pipeline_config(&make_config("[risk]\nstop_loss_pct = 0\n")).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "stop_loss_pct"));
    }

    #[test]
    fn zero_lot_size_fails() {
        let err = validate_pipeline_config(&make_config("[execution]\nlot_size = 0\n")).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "lot_size"));
    }

    #[test]
    fn notify_limits_checked_only_when_enabled() {
        assert!(validate_pipeline_config(&make_config("[notify]\ntimeout_ms = 0\n")).is_ok());
        let err = validate_pipeline_config(&make_config(
            "[notify]\nurl = http://localhost:9000/orders\nqueue_capacity = 0\n",
        ))
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "queue_capacity"));
    }

    #[test]
    fn notify_url_needs_http_scheme() {
        let err = validate_pipeline_config(&make_config("[notify]\nurl = localhost:9000\n")).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "url"));
    }

    #[test]
    fn unknown_feature_log_format_fails() {
        let err = validate_pipeline_config(&make_config("[feature_log]\nformat = parquet\n")).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "format"));
    }

    #[test]
    fn replay_requires_data_dir_benchmark_and_codes() {
        let err = validate_replay_config(&make_config("[replay]\ncodes = 600000\n")).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigMissing { key, .. } if key == "data_dir"));

        let err = validate_replay_config(&make_config("[replay]\ndata_dir = data\ncodes = 600000\n"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigMissing { key, .. } if key == "benchmark"));

        let err = validate_replay_config(&make_config("[pipeline]\nbenchmark = SH.000300\n[replay]\ndata_dir = data\n"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigMissing { key, .. } if key == "codes"));
    }

    #[test]
    fn replay_rejects_bad_codes_and_capital() {
        let base = "[pipeline]\nbenchmark = SH.000300\n[replay]\ndata_dir = data\n";
        let err = validate_replay_config(&make_config(&format!("{base}codes = 600000,,000001\n"))).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "codes"));

        let err = validate_replay_config(&make_config(&format!(
            "{base}codes = 600000\ninitial_capital = -5\n"
        )))
        .unwrap_err();
        assert!(matches!(err, PipelineError::ConfigInvalid { key, .. } if key == "initial_capital"));

        assert!(validate_replay_config(&make_config(&format!("{base}codes = 600000,000001\n"))).is_ok());
    }
}
