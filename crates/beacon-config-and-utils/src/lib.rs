//! Core configuration and utilities shared by the Beacon crates.

mod config;
mod error;
mod logging;
mod parse;
mod paths;

pub use config::{
    Config, DEFAULT_COLLECTOR_URL, DEFAULT_LOG_LEVEL, FLUSH_INTERVAL_MAX_SECS,
    FLUSH_INTERVAL_MIN_SECS,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level, CentralLogWriter};
pub use parse::{parse_json_array, parse_properties};
pub use paths::Paths;
