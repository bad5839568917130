//! Command-line tool for the ACC loyalty-point payment network.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with environment variable expansion
//! - [`error`] - Command error type
//! - [`shutdown`] - Signal-driven cancellation
//! - [`watch`] - Task-feed watcher

pub mod config;
pub mod error;
pub mod shutdown;
pub mod watch;

pub use config::CliConfig;
pub use error::CliError;
