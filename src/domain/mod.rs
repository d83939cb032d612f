//! Pure pipeline logic. Nothing in here performs I/O.

pub mod bar;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod feature;
pub mod feature_engine;
pub mod feature_row;
pub mod indicator;
pub mod pipeline;
pub mod position;
pub mod risk;
pub mod signal;
pub mod strategy_tag;
pub mod timeline;
pub mod universe;
