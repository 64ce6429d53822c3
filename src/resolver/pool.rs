//! Bounded-concurrency resolution pool
//!
//! Two semaphores shape the pool:
//! - `in_flight` admits at most `concurrency` running resolutions
//! - `outstanding` admits at most `concurrency + max_buffered` items between
//!   admission and consumption, so completed results waiting for the consumer
//!   count against the same ceiling and the producer stalls once it is reached
//!
//! Results are handed to the caller's sink as they complete; the pool keeps no
//! entries of its own, only counters.

use crate::category::CategoryDirectory;
use crate::config::ResolverConfig;
use crate::discovery::Candidate;
use crate::playlist::ResolvedEntry;
use crate::resolver::{FailureKind, ResolveError, StreamResolver};
use chrono::Utc;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

/// Limits applied to one pool run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum resolutions running at once
    pub concurrency: usize,

    /// Completed results allowed to wait for the consumer
    pub max_buffered: usize,

    /// Per-item deadline, enforced regardless of the resolver implementation
    pub item_timeout: Duration,
}

impl PoolConfig {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            max_buffered: config.max_buffered.max(1),
            item_timeout: config.timeout(),
        }
    }

    /// Ceiling on in-flight plus completed-but-unconsumed items
    pub fn outstanding_limit(&self) -> usize {
        self.concurrency + self.max_buffered
    }
}

/// Counters for one pool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub submitted: usize,
    pub resolved: usize,
    pub failed: usize,
    pub failures: BTreeMap<FailureKind, usize>,
    pub peak_in_flight: usize,
    pub peak_outstanding: usize,
}

impl PoolStats {
    fn record_failure(&mut self, error: &ResolveError) {
        self.failed += 1;
        *self.failures.entry(error.kind()).or_insert(0) += 1;
    }
}

/// Runs a [`StreamResolver`] over many candidates with bounded concurrency
pub struct ResolverPool {
    resolver: Arc<dyn StreamResolver>,
    config: PoolConfig,
}

/// A finished resolution travelling back to the consumer
struct Completed {
    candidate: Candidate,
    outcome: Result<String, ResolveError>,
    _slot: Slot,
}

/// A semaphore permit that also maintains a current/peak gauge
struct Slot {
    _permit: OwnedSemaphorePermit,
    gauge: Arc<Gauge>,
}

#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Slot {
    fn new(permit: OwnedSemaphorePermit, gauge: Arc<Gauge>) -> Self {
        let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(now, Ordering::SeqCst);
        Self {
            _permit: permit,
            gauge,
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ResolverPool {
    pub fn new(resolver: Arc<dyn StreamResolver>, config: PoolConfig) -> Self {
        Self { resolver, config }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Resolves every candidate, passing each success to `on_resolved`
    ///
    /// Failures are counted and logged, never retried, and never reach the sink.
    /// Output order follows completion order, not input order.
    ///
    /// # Arguments
    ///
    /// * `candidates` - Filtered candidates for this cycle
    /// * `directory` - Category names used to label each resolved entry
    /// * `on_resolved` - Sink for successful entries, called on the caller's task
    pub async fn run<F>(
        &self,
        candidates: Vec<Candidate>,
        directory: &CategoryDirectory,
        mut on_resolved: F,
    ) -> PoolStats
    where
        F: FnMut(ResolvedEntry),
    {
        let mut stats = PoolStats {
            submitted: candidates.len(),
            ..PoolStats::default()
        };
        if candidates.is_empty() {
            return stats;
        }

        let in_flight_gauge = Arc::new(Gauge::default());
        let outstanding_gauge = Arc::new(Gauge::default());
        let (tx, mut rx) = mpsc::channel(self.config.outstanding_limit());

        let producer = tokio::spawn(produce(
            candidates,
            Arc::clone(&self.resolver),
            self.config,
            Arc::clone(&in_flight_gauge),
            Arc::clone(&outstanding_gauge),
            tx,
        ));

        while let Some(done) = rx.recv().await {
            let Completed {
                candidate, outcome, ..
            } = done;

            match outcome {
                Ok(url) => {
                    stats.resolved += 1;
                    tracing::debug!("Resolved {}: {}", candidate.video_id, candidate.title);
                    on_resolved(ResolvedEntry::new(candidate, url, Utc::now(), directory));
                }
                Err(e) => {
                    tracing::debug!("Stream extraction failed for {}: {}", candidate.video_id, e);
                    stats.record_failure(&e);
                }
            }
        }

        if let Err(e) = producer.await {
            tracing::error!("Resolver producer task failed: {}", e);
        }

        stats.peak_in_flight = in_flight_gauge.peak();
        stats.peak_outstanding = outstanding_gauge.peak();
        stats
    }
}

/// Admits candidates one by one under both ceilings and spawns their resolutions
async fn produce(
    candidates: Vec<Candidate>,
    resolver: Arc<dyn StreamResolver>,
    config: PoolConfig,
    in_flight_gauge: Arc<Gauge>,
    outstanding_gauge: Arc<Gauge>,
    tx: mpsc::Sender<Completed>,
) {
    let in_flight = Arc::new(Semaphore::new(config.concurrency));
    let outstanding = Arc::new(Semaphore::new(config.outstanding_limit()));

    for candidate in candidates {
        // Semaphores are never closed, so acquisition only fails on a bug
        let Ok(outstanding_permit) = Arc::clone(&outstanding).acquire_owned().await else {
            break;
        };
        let slot = Slot::new(outstanding_permit, Arc::clone(&outstanding_gauge));

        let Ok(running_permit) = Arc::clone(&in_flight).acquire_owned().await else {
            break;
        };
        let running = Slot::new(running_permit, Arc::clone(&in_flight_gauge));

        let resolver = Arc::clone(&resolver);
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome =
                resolve_one(resolver.as_ref(), &candidate.video_id, config.item_timeout).await;
            drop(running);
            // The receiver only closes if the consumer is gone; nothing to deliver to then
            let _ = tx
                .send(Completed {
                    candidate,
                    outcome,
                    _slot: slot,
                })
                .await;
        });
    }
}

/// One resolution with a deadline; a panic becomes a failure for this item only
async fn resolve_one(
    resolver: &dyn StreamResolver,
    video_id: &str,
    timeout: Duration,
) -> Result<String, ResolveError> {
    let attempt = AssertUnwindSafe(resolver.resolve(video_id)).catch_unwind();

    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(ResolveError::Panicked),
        Err(_) => Err(ResolveError::Timeout(timeout)),
    }
}
