//! Process-level runtime support: layered configuration and logging setup.

pub mod config;
pub mod logging;
mod paths;

pub use config::{
    default_logging_config, AppConfig, CliArgs, ConfigError, LoggingConfig, Section, ServerConfig,
};
