use crate::config::types::{
    Config, OutputConfig, ResolverConfig, ScheduleConfig, SearchConfig, ServerConfig,
    UpstreamConfig,
};
use crate::discovery::MAX_RETRIES;
use crate::ConfigError;
use std::net::IpAddr;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_upstream_config(&config.upstream)?;
    validate_resolver_config(&config.resolver)?;
    validate_schedule_config(&config.schedule)?;
    validate_server_config(&config.server)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates search configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.query.trim().is_empty() {
        return Err(ConfigError::Validation("query cannot be empty".to_string()));
    }

    if config.result_cap < 1 {
        return Err(ConfigError::Validation(format!(
            "result_cap must be >= 1, got {}",
            config.result_cap
        )));
    }

    // The search API refuses pages larger than 50
    if config.page_size < 1 || config.page_size > 50 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 50, got {}",
            config.page_size
        )));
    }

    if config.excluded_categories.iter().any(|c| c.is_empty()) {
        return Err(ConfigError::Validation(
            "excluded_categories cannot contain empty names".to_string(),
        ));
    }

    if let Some(region) = &config.region_code {
        if region.len() != 2 || !region.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Validation(format!(
                "region_code must be a two-letter country code, got '{}'",
                region
            )));
        }
    }

    Ok(())
}

/// Validates upstream API configuration
fn validate_upstream_config(config: &UpstreamConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api_base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "api_base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.api_key_env.is_empty() && config.api_key.is_none() {
        return Err(ConfigError::Validation(
            "either api_key or api_key_env must be set".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= {}, got {}",
            MAX_RETRIES, config.max_retries
        )));
    }

    if config.initial_backoff_ms > config.max_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "initial_backoff_ms ({}) cannot exceed max_backoff_ms ({})",
            config.initial_backoff_ms, config.max_backoff_ms
        )));
    }

    Ok(())
}

/// Validates resolution tool configuration
fn validate_resolver_config(config: &ResolverConfig) -> Result<(), ConfigError> {
    if config.program.trim().is_empty() {
        return Err(ConfigError::Validation(
            "resolver program cannot be empty".to_string(),
        ));
    }

    if !config
        .args
        .iter()
        .any(|a| a.contains("{id}") || a.contains("{url}"))
    {
        return Err(ConfigError::Validation(
            "resolver args must reference {id} or {url}".to_string(),
        ));
    }

    if !config.watch_url_template.contains("{id}") {
        return Err(ConfigError::Validation(
            "watch_url_template must contain {id}".to_string(),
        ));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.max_buffered < 1 || config.max_buffered > MAX_BUFFERED {
        return Err(ConfigError::Validation(format!(
            "max_buffered must be between 1 and {}, got {}",
            MAX_BUFFERED, config.max_buffered
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "resolver timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Longest accepted refresh interval
const MAX_INTERVAL_SECS: u64 = 7 * 86_400;

const MAX_STUCK_MULTIPLIER: u32 = 100;

/// Results a resolver pool may hold beyond its workers
const MAX_BUFFERED: usize = 4096;

/// Validates schedule configuration
fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    if config.interval_secs < 60 {
        return Err(ConfigError::Validation(format!(
            "interval_secs must be >= 60, got {}",
            config.interval_secs
        )));
    }

    if config.interval_secs > MAX_INTERVAL_SECS {
        return Err(ConfigError::Validation(format!(
            "interval_secs must be <= {} (one week), got {}",
            MAX_INTERVAL_SECS, config.interval_secs
        )));
    }

    if config.stuck_multiplier < 2 || config.stuck_multiplier > MAX_STUCK_MULTIPLIER {
        return Err(ConfigError::Validation(format!(
            "stuck_multiplier must be between 2 and {}, got {}",
            MAX_STUCK_MULTIPLIER, config.stuck_multiplier
        )));
    }

    Ok(())
}

/// Validates server configuration
fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    config.bind_address.parse::<IpAddr>().map_err(|_| {
        ConfigError::Validation(format!(
            "bind_address must be an IP address, got '{}'",
            config.bind_address
        ))
    })?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.playlist_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "playlist_path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
