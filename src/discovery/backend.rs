//! Search backends
//!
//! [`SearchBackend`] is the seam between the query client and the search
//! provider. [`YouTubeBackend`] talks to the YouTube Data API v3.

use crate::category::CategoryDirectory;
use crate::config::UpstreamConfig;
use crate::discovery::types::{PageRequest, SearchItem, SearchPage, UpstreamError, VideoDetails};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Quota units charged for one `search.list` call
const SEARCH_QUOTA_COST: u64 = 100;

/// Quota units charged for one `videos.list` call
const DETAILS_QUOTA_COST: u64 = 1;

/// A paged live-stream search service
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Fetches one page of live results
    async fn search_page(&self, request: &PageRequest) -> Result<SearchPage, UpstreamError>;

    /// Fetches details for hits from a search page
    ///
    /// Ids the provider does not report are absent from the map. The default
    /// reports nothing, for backends whose search hits are already complete.
    async fn video_details(
        &self,
        _ids: &[String],
    ) -> Result<HashMap<String, VideoDetails>, UpstreamError> {
        Ok(HashMap::new())
    }

    /// Fetches the provider's category names
    async fn categories(&self, region_code: Option<&str>)
        -> Result<CategoryDirectory, UpstreamError>;

    /// Quota units one `search_page` call consumes
    fn search_quota_cost(&self) -> u64 {
        0
    }

    /// Quota units one `video_details` call consumes
    fn details_quota_cost(&self) -> u64 {
        0
    }
}

/// YouTube Data API v3 backend
pub struct YouTubeBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YouTubeBackend {
    pub fn new(client: Client, base_url: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Builds a backend with a client configured from `config`
    pub fn from_config(config: &UpstreamConfig, api_key: String) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::new(client, &config.api_base_url, api_key))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| UpstreamError::Malformed(format!("{}: {}", endpoint, e)))
    }
}

#[async_trait]
impl SearchBackend for YouTubeBackend {
    async fn search_page(&self, request: &PageRequest) -> Result<SearchPage, UpstreamError> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("type", "video".to_string()),
            ("eventType", "live".to_string()),
            ("order", "date".to_string()),
            ("maxResults", request.page_size.to_string()),
            ("q", request.query.clone()),
        ];
        if let Some(region) = &request.region_code {
            params.push(("regionCode", region.clone()));
        }
        if let Some(token) = &request.page_token {
            params.push(("pageToken", token.clone()));
        }

        let response: SearchListResponse = self.get_json("search", &params).await?;

        // Search hits carry no category; the pager joins it in from `video_details`
        let items = response
            .items
            .into_iter()
            .filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(SearchItem {
                    video_id,
                    title: item.snippet.title,
                    category_id: String::new(),
                    channel_id: item.snippet.channel_id,
                })
            })
            .collect();

        Ok(SearchPage {
            items,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn video_details(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, VideoDetails>, UpstreamError> {
        let params = [("part", "snippet".to_string()), ("id", ids.join(","))];
        let response: VideoListResponse = self.get_json("videos", &params).await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| {
                let details = VideoDetails {
                    title: item.snippet.title,
                    category_id: item.snippet.category_id,
                    channel_id: item.snippet.channel_id,
                };
                (item.id, details)
            })
            .collect())
    }

    async fn categories(
        &self,
        region_code: Option<&str>,
    ) -> Result<CategoryDirectory, UpstreamError> {
        let params = [
            ("part", "snippet".to_string()),
            ("regionCode", region_code.unwrap_or("US").to_string()),
        ];
        let response: CategoryListResponse = self.get_json("videoCategories", &params).await?;

        Ok(CategoryDirectory::from_entries(
            response
                .items
                .into_iter()
                .map(|item| (item.id, item.snippet.title)),
        ))
    }

    fn search_quota_cost(&self) -> u64 {
        SEARCH_QUOTA_COST
    }

    fn details_quota_cost(&self) -> u64 {
        DETAILS_QUOTA_COST
    }
}

/// Builds the HTTP client used for search requests
pub fn build_http_client(config: &UpstreamConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(config.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a reqwest failure (no HTTP status) to an upstream error
fn classify_transport_error(error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::Timeout(error.to_string())
    } else {
        UpstreamError::Transport(error.to_string())
    }
}

/// Maps an HTTP error status and body to an upstream error
///
/// | Condition | Error | Transient |
/// |-----------|-------|-----------|
/// | 429, or reason `rateLimitExceeded` / `userRateLimitExceeded` | RateLimited | yes |
/// | 5xx | Server | yes |
/// | reason `quotaExceeded` / `dailyLimitExceeded` | QuotaExhausted | no |
/// | 401, 403 | Unauthorized | no |
/// | other 4xx | BadRequest | no |
pub fn classify_status(status: u16, body: &str) -> UpstreamError {
    let envelope: Option<ErrorEnvelope> = serde_json::from_str(body).ok();
    let message = envelope
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| body.chars().take(200).collect());
    let reasons: Vec<String> = envelope
        .map(|e| e.error.errors.into_iter().filter_map(|d| d.reason).collect())
        .unwrap_or_default();
    let has_reason = |wanted: &[&str]| reasons.iter().any(|r| wanted.contains(&r.as_str()));

    if status == 429 || has_reason(&["rateLimitExceeded", "userRateLimitExceeded"]) {
        UpstreamError::RateLimited(message)
    } else if status >= 500 {
        UpstreamError::Server { status, message }
    } else if has_reason(&["quotaExceeded", "dailyLimitExceeded"]) {
        UpstreamError::QuotaExhausted(message)
    } else if status == 401 || status == 403 {
        UpstreamError::Unauthorized { status, message }
    } else {
        UpstreamError::BadRequest { status, message }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: SearchResultId,
    snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResultId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    category_id: Option<String>,
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryListResponse {
    #[serde(default)]
    items: Vec<CategoryItem>,
}

#[derive(Debug, Deserialize)]
struct CategoryItem {
    id: String,
    snippet: CategorySnippet,
}

#[derive(Debug, Deserialize)]
struct CategorySnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}
