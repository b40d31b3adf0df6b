pub mod config;
pub mod logger;

pub use config::{Config, ConfigError};
pub use logger::{parse_log_level, setup_logger};

/*
 * Utility module for VeilDHT
 *
 * Application configuration (JSON file with defaults) and logger setup.
 */
