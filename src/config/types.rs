use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Main configuration structure for the aggregator
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub search: SearchConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// What to search for and what to keep
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Query string, passed to the search provider untouched
    pub query: String,

    /// Category names whose streams are dropped (exact, case-sensitive)
    #[serde(rename = "excluded-categories", default)]
    pub excluded_categories: Vec<String>,

    /// Maximum number of candidates collected per cycle
    #[serde(rename = "result-cap", default = "default_result_cap")]
    pub result_cap: usize,

    /// Results requested per search page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,

    /// Region used for the search and the category listing
    #[serde(rename = "region-code", default)]
    pub region_code: Option<String>,
}

/// Search API connection and retry settings
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(rename = "api-base-url", default = "default_api_base_url")]
    pub api_base_url: String,

    /// Inline API key; takes precedence over `api-key-env`
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(rename = "api-key-env", default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt for transient page failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(rename = "initial-backoff-ms", default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(rename = "max-backoff-ms", default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// External resolution tool settings
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Program to run once per item
    #[serde(default = "default_resolver_program")]
    pub program: String,

    /// Argument template; `{id}` and `{url}` are substituted per item
    #[serde(default = "default_resolver_args")]
    pub args: Vec<String>,

    #[serde(rename = "watch-url-template", default = "default_watch_url_template")]
    pub watch_url_template: String,

    /// Maximum resolutions in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Completed results allowed to wait for the consumer
    #[serde(rename = "max-buffered", default = "default_max_buffered")]
    pub max_buffered: usize,

    #[serde(rename = "timeout-secs", default = "default_resolver_timeout_secs")]
    pub timeout_secs: u64,
}

/// Cycle timing
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(rename = "interval-secs", default = "default_interval_secs")]
    pub interval_secs: u64,

    /// A cycle running longer than `interval * stuck-multiplier` is reported unhealthy
    #[serde(rename = "stuck-multiplier", default = "default_stuck_multiplier")]
    pub stuck_multiplier: u32,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(rename = "bind-address", default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Optional on-disk copy of the published playlist
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(rename = "playlist-path", default)]
    pub playlist_path: Option<String>,
}

/// The immutable view of the configuration a cycle works from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchProfile {
    pub query: String,
    pub excluded_categories: BTreeSet<String>,
    pub result_cap: usize,
    pub page_size: u32,
    pub region_code: Option<String>,
    pub concurrency: usize,
    pub interval: Duration,
}

impl Config {
    /// Builds the search profile used by every cycle
    pub fn profile(&self) -> SearchProfile {
        SearchProfile {
            query: self.search.query.clone(),
            excluded_categories: self.search.excluded_categories.iter().cloned().collect(),
            result_cap: self.search.result_cap,
            page_size: self.search.page_size,
            region_code: self.search.region_code.clone(),
            concurrency: self.resolver.concurrency,
            interval: self.schedule.interval(),
        }
    }
}

impl UpstreamConfig {
    /// Returns the API key, preferring the inline value over the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// How long a single cycle may run before `/health` reports failure
    pub fn stuck_threshold(&self) -> Duration {
        self.interval().saturating_mul(self.stuck_multiplier)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            program: default_resolver_program(),
            args: default_resolver_args(),
            watch_url_template: default_watch_url_template(),
            concurrency: default_concurrency(),
            max_buffered: default_max_buffered(),
            timeout_secs: default_resolver_timeout_secs(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            stuck_multiplier: default_stuck_multiplier(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_result_cap() -> usize {
    500
}

fn default_page_size() -> u32 {
    50
}

fn default_api_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_api_key_env() -> String {
    "YOUTUBE_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_resolver_program() -> String {
    "yt-dlp".to_string()
}

fn default_resolver_args() -> Vec<String> {
    ["-g", "--no-warnings", "-f", "best", "{url}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_watch_url_template() -> String {
    "https://www.youtube.com/watch?v={id}".to_string()
}

fn default_concurrency() -> usize {
    8
}

fn default_max_buffered() -> usize {
    32
}

fn default_resolver_timeout_secs() -> u64 {
    60
}

// Five hours, as the service has always refreshed
fn default_interval_secs() -> u64 {
    5 * 3600
}

fn default_stuck_multiplier() -> u32 {
    3
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}
