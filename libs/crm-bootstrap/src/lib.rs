#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Host-process bootstrap: configuration loading, logging, shutdown signals.

pub mod config;
pub mod logging;
pub mod signals;

pub use config::{
    AppConfig, CliOverrides, ConfigError, DatabaseConfig, GrpcConfig, HttpConfig, LoggingConfig,
    ServerConfig,
};
pub use logging::init_logging;
pub use signals::{cancel_on_shutdown, wait_for_shutdown};
