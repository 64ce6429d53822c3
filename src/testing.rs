//! Shared fakes for unit tests

use crate::category::CategoryDirectory;
use crate::config::SearchProfile;
use crate::discovery::{
    Candidate, PageRequest, SearchBackend, SearchItem, SearchPage, Sleeper, UpstreamError,
    VideoDetails,
};
use crate::playlist::ResolvedEntry;
use crate::resolver::{ResolveError, StreamResolver};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn item(id: &str) -> SearchItem {
    SearchItem {
        video_id: id.to_string(),
        title: format!("Live {}", id),
        category_id: "19".to_string(),
        channel_id: format!("channel-{}", id),
    }
}

pub fn page(ids: &[&str], next: Option<&str>) -> SearchPage {
    SearchPage {
        items: ids.iter().map(|id| item(id)).collect(),
        next_page_token: next.map(str::to_string),
    }
}

pub fn search_profile(result_cap: usize) -> SearchProfile {
    SearchProfile {
        query: "live webcam".to_string(),
        excluded_categories: BTreeSet::new(),
        result_cap,
        page_size: 50,
        region_code: None,
        concurrency: 4,
        interval: Duration::from_secs(3600),
    }
}

pub fn candidate(id: &str, category_id: &str, sequence: usize) -> Candidate {
    Candidate {
        video_id: id.to_string(),
        title: format!("Live {}", id),
        category_id: category_id.to_string(),
        channel_id: format!("channel-{}", id),
        discovered_at: Utc::now(),
        sequence,
    }
}

pub fn resolved(id: &str, category_id: &str, sequence: usize) -> ResolvedEntry {
    ResolvedEntry::new(
        candidate(id, category_id, sequence),
        format!("https://streams.test/{}.m3u8", id),
        Utc::now(),
        &CategoryDirectory::builtin(),
    )
}

/// Sleeper that returns immediately and records requested delays
#[derive(Default)]
pub struct InstantSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

pub fn details(title: &str, category_id: &str) -> VideoDetails {
    VideoDetails {
        title: title.to_string(),
        category_id: Some(category_id.to_string()),
        channel_id: None,
    }
}

/// Backend that replays a fixed script of page results
///
/// Once the script runs out every further search returns an empty final page
/// and every further details call reports nothing.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<SearchPage, UpstreamError>>>,
    details: Mutex<VecDeque<Result<HashMap<String, VideoDetails>, UpstreamError>>>,
    tokens: Mutex<Vec<Option<String>>>,
    detail_requests: Mutex<Vec<Vec<String>>>,
    categories: Mutex<Result<CategoryDirectory, UpstreamError>>,
    search_cost: u64,
    details_cost: u64,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Result<SearchPage, UpstreamError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            details: Mutex::new(VecDeque::new()),
            tokens: Mutex::new(Vec::new()),
            detail_requests: Mutex::new(Vec::new()),
            categories: Mutex::new(Ok(CategoryDirectory::builtin())),
            search_cost: 0,
            details_cost: 0,
        }
    }

    pub fn with_quota_costs(mut self, search: u64, details: u64) -> Self {
        self.search_cost = search;
        self.details_cost = details;
        self
    }

    /// Queues the answer for the next details call
    pub fn push_details(&self, result: Result<HashMap<String, VideoDetails>, UpstreamError>) {
        self.details.lock().unwrap().push_back(result);
    }

    /// Ids asked for by each details call, in order
    pub fn detail_requests(&self) -> Vec<Vec<String>> {
        self.detail_requests.lock().unwrap().clone()
    }

    pub fn with_categories(self, categories: Result<CategoryDirectory, UpstreamError>) -> Self {
        *self.categories.lock().unwrap() = categories;
        self
    }

    /// Appends more results for a later cycle
    pub fn push(&self, result: Result<SearchPage, UpstreamError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search_page(&self, request: &PageRequest) -> Result<SearchPage, UpstreamError> {
        self.tokens.lock().unwrap().push(request.page_token.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::default()))
    }

    async fn video_details(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, VideoDetails>, UpstreamError> {
        self.detail_requests.lock().unwrap().push(ids.to_vec());
        self.details
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(HashMap::new()))
    }

    async fn categories(
        &self,
        _region_code: Option<&str>,
    ) -> Result<CategoryDirectory, UpstreamError> {
        self.categories.lock().unwrap().clone()
    }

    fn search_quota_cost(&self) -> u64 {
        self.search_cost
    }

    fn details_quota_cost(&self) -> u64 {
        self.details_cost
    }
}

/// Resolver that answers from memory, with per-id failure modes
#[derive(Default)]
pub struct FakeResolver {
    latency: Duration,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    panicking: HashSet<String>,
    current: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Ids that resolve as "not live"
    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    /// Ids that never complete
    pub fn hanging(mut self, id: &str) -> Self {
        self.hanging.insert(id.to_string());
        self
    }

    pub fn panicking(mut self, id: &str) -> Self {
        self.panicking.insert(id.to_string());
        self
    }

    /// Highest number of resolutions observed running at once
    pub fn max_concurrent(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StreamResolver for FakeResolver {
    async fn resolve(&self, video_id: &str) -> Result<String, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.current);

        if self.panicking.contains(video_id) {
            panic!("resolver exploded on {}", video_id);
        }
        if self.hanging.contains(video_id) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.contains(video_id) {
            return Err(ResolveError::NotLive(format!("{} is offline", video_id)));
        }

        Ok(format!("https://streams.test/{}.m3u8", video_id))
    }
}
