//! Configuration module for the aggregator
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! The configuration is read once at startup; changing it requires a restart.
//!
//! # Example
//!
//! ```no_run
//! use livecam_aggregator::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Refreshing every {}s", config.schedule.interval_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, OutputConfig, ResolverConfig, ScheduleConfig, SearchConfig, SearchProfile,
    ServerConfig, UpstreamConfig,
};

// Re-export parser functions
pub use parser::{config_hash, load_config, load_config_with_hash, parse_config};
