//! Per-cycle statistics

use crate::discovery::QueryStats;
use crate::resolver::{FailureKind, PoolStats};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new artifact is being served
    Published { entries: usize },

    /// The cycle produced nothing and the prior non-empty artifact was kept
    RetainedPrevious,

    /// Upstream failed before publishing; the store was not touched
    Aborted { reason: String },
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::RetainedPrevious => "retained",
            Self::Aborted { .. } => "aborted",
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }
}

impl Default for CycleOutcome {
    fn default() -> Self {
        Self::Published { entries: 0 }
    }
}

/// Counters for one discovery→resolve→publish pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycle: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,
    pub outcome: CycleOutcome,

    /// Candidates returned by discovery, after deduplication and the cap
    pub candidates_found: usize,

    /// Candidates dropped by the category exclusion set
    pub candidates_excluded: usize,

    pub resolved: usize,
    pub failed: usize,
    pub failures: BTreeMap<FailureKind, usize>,

    /// Resolved entries dropped by the assembler as duplicates
    pub duplicates: usize,

    /// Entries per category in this cycle's playlist, in playlist order
    pub categories: Vec<(String, usize)>,

    pub peak_in_flight: usize,
    pub peak_outstanding: usize,

    /// Peak resident set size in KiB, when the platform reports it
    pub peak_rss_kb: Option<u64>,

    /// Upstream usage attributable to this cycle
    pub upstream: QueryStats,
}

impl CycleStats {
    /// Folds a resolver pool run into these stats
    pub fn record_pool(&mut self, pool: PoolStats) {
        self.resolved = pool.resolved;
        self.failed = pool.failed;
        self.failures = pool.failures;
        self.peak_in_flight = pool.peak_in_flight;
        self.peak_outstanding = pool.peak_outstanding;
    }

    /// Candidates handed to the resolver pool
    pub fn candidates_kept(&self) -> usize {
        self.candidates_found.saturating_sub(self.candidates_excluded)
    }

    /// Failure tallies as `kind=count` pairs
    pub fn failure_summary(&self) -> String {
        if self.failures.is_empty() {
            return "none".to_string();
        }
        self.failures
            .iter()
            .map(|(kind, count)| format!("{}={}", kind, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Category tallies as `name=count` pairs
    pub fn category_summary(&self) -> String {
        self.categories
            .iter()
            .map(|(name, count)| format!("{}={}", name, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Emits the end-of-cycle summary
    pub fn log_summary(&self) {
        match &self.outcome {
            CycleOutcome::Aborted { reason } => {
                tracing::error!(
                    "Cycle {} aborted after {:.1}s: {}",
                    self.cycle,
                    self.elapsed.as_secs_f64(),
                    reason
                );
            }
            outcome => {
                tracing::info!(
                    "Cycle {} {} in {:.1}s: found {}, excluded {}, resolved {} of {}, failed {} ({})",
                    self.cycle,
                    outcome.as_str(),
                    self.elapsed.as_secs_f64(),
                    self.candidates_found,
                    self.candidates_excluded,
                    self.resolved,
                    self.candidates_kept(),
                    self.failed,
                    self.failure_summary()
                );
            }
        }

        if !self.categories.is_empty() {
            tracing::info!("Cycle {} categories: {}", self.cycle, self.category_summary());
        }

        tracing::info!(
            "Cycle {} resources: peak in-flight {}, peak outstanding {}, peak RSS {}, \
             upstream requests {} ({} retries), quota units {}",
            self.cycle,
            self.peak_in_flight,
            self.peak_outstanding,
            self.peak_rss_kb
                .map(|kb| format!("{} KiB", kb))
                .unwrap_or_else(|| "n/a".to_string()),
            self.upstream.requests,
            self.upstream.retries,
            self.upstream.quota_units
        );
    }
}

/// Prints stats to stdout for the `--once` mode
pub fn print_cycle_stats(stats: &CycleStats) {
    println!("=== Cycle {} ===\n", stats.cycle);
    println!("Outcome: {}", stats.outcome.as_str());
    if let CycleOutcome::Aborted { reason } = &stats.outcome {
        println!("  Reason: {}", reason);
    }
    println!("Elapsed: {:.1}s", stats.elapsed.as_secs_f64());
    println!();

    println!("Candidates:");
    println!("  Found: {}", stats.candidates_found);
    println!("  Excluded by category: {}", stats.candidates_excluded);
    println!("  Sent to resolver: {}", stats.candidates_kept());
    println!("  Resolved: {}", stats.resolved);
    println!("  Failed: {}", stats.failed);
    for (kind, count) in &stats.failures {
        println!("    {}: {}", kind, count);
    }
    println!();

    if !stats.categories.is_empty() {
        println!("Categories:");
        for (name, count) in &stats.categories {
            println!("  {}: {}", name, count);
        }
        println!();
    }

    println!("Resources:");
    println!("  Peak in-flight resolutions: {}", stats.peak_in_flight);
    println!("  Peak outstanding items: {}", stats.peak_outstanding);
    match stats.peak_rss_kb {
        Some(kb) => println!("  Peak RSS: {} KiB", kb),
        None => println!("  Peak RSS: n/a"),
    }
    println!();

    println!("Upstream:");
    println!("  Requests: {}", stats.upstream.requests);
    println!("  Pages: {}", stats.upstream.pages);
    println!("  Retries: {}", stats.upstream.retries);
    println!("  Quota units: {}", stats.upstream.quota_units);
}

/// Samples the process's peak resident set size
pub fn sample_peak_rss_kb() -> Option<u64> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status_field_kb(&status, "VmHWM").or_else(|| status_field_kb(&status, "VmRSS"))
}

/// Extracts a `Key:   1234 kB` field from a procfs status file
fn status_field_kb(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        rest.split_whitespace().next()?.parse().ok()
    })
}
