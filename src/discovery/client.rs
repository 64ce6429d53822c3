//! Query client: paged discovery of live candidates
//!
//! Pages are requested one at a time and only while the result cap has not been
//! reached, so a small cap never costs more quota than it needs.

use crate::category::CategoryDirectory;
use crate::config::SearchProfile;
use crate::discovery::backend::SearchBackend;
use crate::discovery::backoff::{retry_transient, BackoffPolicy, Sleeper, TokioSleeper};
use crate::discovery::types::{
    clean_title, Candidate, PageRequest, QueryCounters, QueryStats, UpstreamError,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Discovers live candidates through a [`SearchBackend`]
pub struct QueryClient {
    backend: Arc<dyn SearchBackend>,
    policy: BackoffPolicy,
    sleeper: Arc<dyn Sleeper>,
    counters: QueryCounters,
}

impl QueryClient {
    pub fn new(backend: Arc<dyn SearchBackend>, policy: BackoffPolicy) -> Self {
        Self::with_sleeper(backend, policy, Arc::new(TokioSleeper))
    }

    /// Creates a client whose backoff waits go through `sleeper`
    pub fn with_sleeper(
        backend: Arc<dyn SearchBackend>,
        policy: BackoffPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            backend,
            policy,
            sleeper,
            counters: QueryCounters::default(),
        }
    }

    /// Usage counters accumulated over the client's lifetime
    pub fn stats(&self) -> QueryStats {
        self.counters.snapshot()
    }

    /// Starts a lazy page walk for `profile`
    pub fn pages<'a>(&'a self, profile: &'a SearchProfile) -> CandidatePager<'a> {
        CandidatePager {
            client: self,
            profile,
            next_token: None,
            finished: false,
            seen: HashSet::new(),
            emitted: 0,
        }
    }

    /// Collects deduplicated candidates up to the profile's result cap
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Candidate>)` - Candidates in discovery order, never more than the cap
    /// * `Err(UpstreamError)` - A fatal error, or a transient one that outlasted the retries
    pub async fn discover(&self, profile: &SearchProfile) -> Result<Vec<Candidate>, UpstreamError> {
        let mut pager = self.pages(profile);
        let mut candidates = Vec::new();

        while let Some(batch) = pager.next_batch().await? {
            candidates.extend(batch);
            tracing::info!(
                "Batch fetch complete: total {} candidates (cap {})",
                candidates.len(),
                profile.result_cap
            );
        }

        Ok(candidates)
    }

    /// Fetches the provider's category names with the same retry policy as search
    pub async fn fetch_categories(
        &self,
        region_code: Option<&str>,
    ) -> Result<CategoryDirectory, UpstreamError> {
        retry_transient(
            &self.policy,
            self.sleeper.as_ref(),
            &self.counters,
            "category listing",
            || {
                self.counters.record_request(1);
                self.backend.categories(region_code)
            },
        )
        .await
    }
}

/// Lazy walk over search pages
pub struct CandidatePager<'a> {
    client: &'a QueryClient,
    profile: &'a SearchProfile,
    next_token: Option<String>,
    finished: bool,
    seen: HashSet<String>,
    emitted: usize,
}

impl CandidatePager<'_> {
    /// Fetches the next page and returns its new candidates
    ///
    /// Returns `Ok(None)` once the cap is reached or upstream has no more pages.
    /// Duplicates of already-emitted ids are dropped, so a batch may be empty
    /// while the walk continues.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Candidate>>, UpstreamError> {
        let cap = self.profile.result_cap;
        if self.finished || self.emitted >= cap {
            self.finished = true;
            return Ok(None);
        }

        let request = PageRequest {
            query: self.profile.query.clone(),
            page_size: self.profile.page_size,
            region_code: self.profile.region_code.clone(),
            page_token: self.next_token.clone(),
        };

        let client = self.client;
        let page = retry_transient(
            &client.policy,
            client.sleeper.as_ref(),
            &client.counters,
            "search page",
            || {
                client.counters.record_request(client.backend.search_quota_cost());
                client.backend.search_page(&request)
            },
        )
        .await?;
        client.counters.record_page();

        if page.items.is_empty() {
            tracing::info!("No more results available");
            self.finished = true;
            return Ok(None);
        }

        let mut fresh = Vec::new();
        for item in page.items {
            if self.emitted + fresh.len() >= cap {
                break;
            }
            if !self.seen.insert(item.video_id.clone()) {
                tracing::debug!("Duplicate search hit {} dropped", item.video_id);
                continue;
            }
            fresh.push(item);
        }

        // Retried on its own so a details hiccup never repeats the search call
        let mut details = if fresh.is_empty() {
            HashMap::new()
        } else {
            let ids: Vec<String> = fresh.iter().map(|item| item.video_id.clone()).collect();
            retry_transient(
                &client.policy,
                client.sleeper.as_ref(),
                &client.counters,
                "video details",
                || {
                    client.counters.record_request(client.backend.details_quota_cost());
                    client.backend.video_details(&ids)
                },
            )
            .await?
        };

        let discovered_at = Utc::now();
        let mut batch = Vec::with_capacity(fresh.len());
        for item in fresh {
            let item = match details.remove(&item.video_id) {
                Some(found) => item.with_details(found),
                None => item,
            };

            batch.push(Candidate {
                title: clean_title(&item.title),
                video_id: item.video_id,
                category_id: item.category_id,
                channel_id: item.channel_id,
                discovered_at,
                sequence: self.emitted,
            });
            self.emitted += 1;
        }

        match page.next_page_token {
            // A repeated token would walk the same page forever
            Some(token) if self.next_token.as_deref() != Some(token.as_str()) => {
                self.next_token = Some(token);
            }
            _ => self.finished = true,
        }
        if self.emitted >= cap {
            self.finished = true;
        }

        Ok(Some(batch))
    }
}
