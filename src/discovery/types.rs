use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// A discovered live stream pending resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Upstream item identifier (the video id)
    pub video_id: String,

    /// Display title, already cleaned for playlist use
    pub title: String,

    /// Upstream category identifier; empty when upstream did not report one
    pub category_id: String,

    pub channel_id: String,

    pub discovered_at: DateTime<Utc>,

    /// Position in the cycle's discovery order
    pub sequence: usize,
}

/// One search hit as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub video_id: String,
    pub title: String,
    pub category_id: String,
    pub channel_id: String,
}

impl SearchItem {
    /// Overlays per-video details onto a search hit
    ///
    /// Details are authoritative for the title and category. A missing category
    /// leaves the item uncategorised; a missing channel keeps the search one.
    pub fn with_details(mut self, details: VideoDetails) -> Self {
        self.title = details.title;
        self.category_id = details.category_id.unwrap_or_default();
        if let Some(channel_id) = details.channel_id {
            self.channel_id = channel_id;
        }
        self
    }
}

/// Per-video details fetched after a search page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoDetails {
    pub title: String,
    pub category_id: Option<String>,
    pub channel_id: Option<String>,
}

/// A page of search hits plus the continuation token, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub items: Vec<SearchItem>,
    pub next_page_token: Option<String>,
}

/// Parameters for a single page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub query: String,
    pub page_size: u32,
    pub region_code: Option<String>,
    pub page_token: Option<String>,
}

/// Errors reported by the search collaborator
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("credentials rejected (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("request rejected (HTTP {status}): {message}")]
    BadRequest { status: u16, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    /// Returns true if a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Transport(_) | Self::Server { .. } | Self::RateLimited(_)
        )
    }
}

/// Process-lifetime counters for upstream usage
#[derive(Debug, Default)]
pub struct QueryCounters {
    requests: AtomicU64,
    pages: AtomicU64,
    retries: AtomicU64,
    transient_errors: AtomicU64,
    quota_units: AtomicU64,
}

/// Point-in-time copy of [`QueryCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub requests: u64,
    pub pages: u64,
    pub retries: u64,
    pub transient_errors: u64,
    pub quota_units: u64,
}

impl QueryCounters {
    pub fn record_request(&self, quota_cost: u64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.quota_units.fetch_add(quota_cost, Ordering::Relaxed);
    }

    pub fn record_page(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_error(&self) {
        self.transient_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueryStats {
        QueryStats {
            requests: self.requests.load(Ordering::Relaxed),
            pages: self.pages.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            transient_errors: self.transient_errors.load(Ordering::Relaxed),
            quota_units: self.quota_units.load(Ordering::Relaxed),
        }
    }
}

impl QueryStats {
    /// Usage accumulated since an earlier snapshot
    pub fn since(&self, earlier: &QueryStats) -> QueryStats {
        QueryStats {
            requests: self.requests.saturating_sub(earlier.requests),
            pages: self.pages.saturating_sub(earlier.pages),
            retries: self.retries.saturating_sub(earlier.retries),
            transient_errors: self
                .transient_errors
                .saturating_sub(earlier.transient_errors),
            quota_units: self.quota_units.saturating_sub(earlier.quota_units),
        }
    }
}

/// Normalizes a title for playlist use
///
/// Accented letters fold to their base letter (NFKD, then marks dropped), any
/// remaining non-ASCII is removed, control characters become spaces, and
/// whitespace runs collapse to a single space.
pub fn clean_title(title: &str) -> String {
    let ascii: String = title
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c.is_ascii_control() { ' ' } else { c })
        .collect();
    ascii.split_whitespace().collect::<Vec<_>>().join(" ")
}
