//! Port traits for every external collaborator of the pipeline.

pub mod broker_port;
pub mod config_port;
pub mod data_port;
pub mod feature_log_port;
pub mod notify_port;
pub mod scorer_port;
