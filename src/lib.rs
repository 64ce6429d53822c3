//! Livecam-Aggregator: a self-refreshing playlist of live webcam streams
//!
//! This crate discovers live streams through a paged search API, resolves each one
//! to a directly playable URL with an external tool, and republishes the result as
//! an extended M3U playlist on a fixed cycle.

pub mod category;
pub mod config;
pub mod cycle;
pub mod discovery;
pub mod playlist;
pub mod resolver;
pub mod server;

#[cfg(test)]
mod testing;

use thiserror::Error;

/// Main error type for aggregator operations
#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] discovery::UpstreamError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Missing API key: set `api-key` or the `{0}` environment variable")]
    MissingApiKey(String),
}

/// Result type alias for aggregator operations
pub type Result<T> = std::result::Result<T, AggregatorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use category::{CategoryDirectory, UNCATEGORIZED};
pub use config::Config;
pub use cycle::{CycleRunner, CycleStats};
pub use discovery::{Candidate, QueryClient};
pub use playlist::{PlaylistArtifact, PublicationStore, ResolvedEntry};
pub use resolver::{ResolverPool, StreamResolver};
