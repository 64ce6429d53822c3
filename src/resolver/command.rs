//! Subprocess-backed resolver
//!
//! Each resolution spawns the configured tool, waits for it with a timeout and
//! tears it down on every exit path. The child is spawned with `kill_on_drop`,
//! so dropping the wait future on timeout kills it.

use crate::config::ResolverConfig;
use crate::resolver::{ResolveError, StreamResolver};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use url::Url;

/// Runs an external tool (by default `yt-dlp -g`) once per item
#[derive(Debug, Clone)]
pub struct CommandResolver {
    program: String,
    args: Vec<String>,
    watch_url_template: String,
    timeout: Duration,
}

impl CommandResolver {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        watch_url_template: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            watch_url_template: watch_url_template.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            config.watch_url_template.clone(),
            config.timeout(),
        )
    }

    /// Expands the argument template for one item
    fn build_args(&self, video_id: &str) -> Vec<String> {
        let watch_url = self.watch_url_template.replace("{id}", video_id);
        self.args
            .iter()
            .map(|arg| arg.replace("{url}", &watch_url).replace("{id}", video_id))
            .collect()
    }
}

#[async_trait]
impl StreamResolver for CommandResolver {
    async fn resolve(&self, video_id: &str) -> Result<String, ResolveError> {
        // Ids become argv entries; refuse anything the tool could read as a flag
        if video_id.is_empty()
            || video_id.starts_with('-')
            || video_id.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ResolveError::Malformed(format!(
                "unusable item id {:?}",
                video_id
            )));
        }

        let child = Command::new(&self.program)
            .args(self.build_args(video_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ResolveError::Spawn(format!("{}: {}", self.program, e)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ResolveError::Failed {
                    code: None,
                    message: e.to_string(),
                })
            }
            Err(_) => {
                tracing::debug!("Resolver for {} killed after {:?}", video_id, self.timeout);
                return Err(ResolveError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(output.status.code(), &stderr));
        }

        parse_stream_url(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Picks the stream URL out of the tool's stdout
///
/// The tool may print one URL per selected format; the last one is the best
/// quality, so the last non-empty line that is an absolute http(s) URL wins.
pub fn parse_stream_url(stdout: &str) -> Result<String, ResolveError> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| {
            Url::parse(line)
                .map(|u| u.scheme() == "https" || u.scheme() == "http")
                .unwrap_or(false)
        })
        .map(str::to_string)
        .ok_or_else(|| {
            let preview: String = stdout.trim().chars().take(120).collect();
            ResolveError::Malformed(format!("no stream URL in output {:?}", preview))
        })
}

/// Maps a non-zero exit and its stderr to a failure kind
pub fn classify_failure(code: Option<i32>, stderr: &str) -> ResolveError {
    let lowered = stderr.to_lowercase();
    let message = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .chars()
        .take(300)
        .collect::<String>();

    const NOT_LIVE: &[&str] = &[
        "is not live",
        "not currently live",
        "live event will begin",
        "premieres in",
        "live event has ended",
        "this live stream recording is not available",
    ];
    const ACCESS_DENIED: &[&str] = &[
        "sign in to confirm",
        "private video",
        "members-only",
        "join this channel",
        "confirm your age",
        "not available in your country",
        "http error 403",
        "http error 429",
    ];
    const MALFORMED: &[&str] = &[
        "unsupported url",
        "incomplete youtube id",
        "is not a valid url",
        "video unavailable",
    ];

    if NOT_LIVE.iter().any(|p| lowered.contains(p)) {
        ResolveError::NotLive(message)
    } else if ACCESS_DENIED.iter().any(|p| lowered.contains(p)) {
        ResolveError::AccessDenied(message)
    } else if MALFORMED.iter().any(|p| lowered.contains(p)) {
        ResolveError::Malformed(message)
    } else {
        ResolveError::Failed { code, message }
    }
}
