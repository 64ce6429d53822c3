//! Stream resolution
//!
//! This module turns candidate ids into directly playable stream URLs:
//! - [`StreamResolver`] is the seam to the external resolution tool
//! - [`CommandResolver`] runs the tool as one subprocess per item
//! - [`ResolverPool`] runs many resolutions with bounded concurrency and memory

mod command;
mod pool;

pub use command::{classify_failure, parse_stream_url, CommandResolver};
pub use pool::{PoolConfig, PoolStats, ResolverPool};

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Maps an item identifier to a playable stream URL
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, video_id: &str) -> Result<String, ResolveError>;
}

/// Why a single item could not be resolved
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("stream is not live: {0}")]
    NotLive(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("malformed: {0}")]
    Malformed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("resolver exited with status {code:?}: {message}")]
    Failed { code: Option<i32>, message: String },

    #[error("failed to start resolver: {0}")]
    Spawn(String),

    #[error("resolver task panicked")]
    Panicked,
}

/// Coarse failure category, used for per-cycle tallies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    NotLive,
    AccessDenied,
    Malformed,
    Timeout,
    Failed,
    Spawn,
    Panicked,
}

impl ResolveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotLive(_) => FailureKind::NotLive,
            Self::AccessDenied(_) => FailureKind::AccessDenied,
            Self::Malformed(_) => FailureKind::Malformed,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Failed { .. } => FailureKind::Failed,
            Self::Spawn(_) => FailureKind::Spawn,
            Self::Panicked => FailureKind::Panicked,
        }
    }
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotLive => "not_live",
            Self::AccessDenied => "access_denied",
            Self::Malformed => "malformed",
            Self::Timeout => "timeout",
            Self::Failed => "failed",
            Self::Spawn => "spawn",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
