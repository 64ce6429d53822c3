//! Discovery of live candidates
//!
//! This module contains the query side of a cycle:
//! - The search backend seam and its YouTube implementation
//! - Exponential backoff for transient upstream failures
//! - The query client that pages through results up to the result cap

mod backend;
mod backoff;
mod client;
mod types;

pub use backend::{build_http_client, classify_status, SearchBackend, YouTubeBackend};
pub use backoff::{retry_transient, BackoffPolicy, Sleeper, TokioSleeper, MAX_RETRIES};
pub use client::{CandidatePager, QueryClient};
pub use types::{
    clean_title, Candidate, PageRequest, QueryCounters, QueryStats, SearchItem, SearchPage,
    UpstreamError, VideoDetails,
};
