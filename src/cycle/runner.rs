//! One discovery→resolve→publish pass
//!
//! A cycle runs its stages in a fixed order: category refresh, discovery,
//! category filtering, resolution, assembly, publication. Everything a cycle
//! builds lives in locals of [`CycleRunner::run_cycle`] and is dropped when it
//! returns; only the published artifact outlives the cycle.

use crate::category::{filter_candidates, CategoryDirectory};
use crate::config::SearchProfile;
use crate::cycle::stats::{sample_peak_rss_kb, CycleOutcome, CycleStats};
use crate::cycle::tracker::{CyclePhase, CycleTracker};
use crate::discovery::QueryClient;
use crate::playlist::{PlaylistBuilder, PublicationStore, PublishOutcome};
use crate::resolver::ResolverPool;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Drives cycles against a fixed set of collaborators
pub struct CycleRunner {
    client: QueryClient,
    pool: ResolverPool,
    store: PublicationStore,
    tracker: Arc<CycleTracker>,
    profile: SearchProfile,
    base_directory: CategoryDirectory,
    playlist_path: Option<PathBuf>,
}

impl CycleRunner {
    pub fn new(
        client: QueryClient,
        pool: ResolverPool,
        store: PublicationStore,
        tracker: Arc<CycleTracker>,
        profile: SearchProfile,
    ) -> Self {
        Self {
            client,
            pool,
            store,
            tracker,
            profile,
            base_directory: CategoryDirectory::builtin(),
            playlist_path: None,
        }
    }

    /// Also writes each published playlist to `path`
    pub fn with_playlist_path(mut self, path: Option<PathBuf>) -> Self {
        self.playlist_path = path;
        self
    }

    pub fn store(&self) -> &PublicationStore {
        &self.store
    }

    pub fn tracker(&self) -> &Arc<CycleTracker> {
        &self.tracker
    }

    pub fn profile(&self) -> &SearchProfile {
        &self.profile
    }

    /// Runs one full cycle and reports what happened
    ///
    /// Upstream failures abort the cycle and leave the store untouched; they
    /// are reported through the returned stats, never as an error.
    pub async fn run_cycle(&self) -> CycleStats {
        let started = Instant::now();
        let mut stats = CycleStats {
            cycle: self.tracker.begin_cycle(),
            started_at: Some(Utc::now()),
            ..CycleStats::default()
        };
        let upstream_before = self.client.stats();

        tracing::info!(
            "Cycle {} started: query {:?}, cap {}",
            stats.cycle,
            self.profile.query,
            self.profile.result_cap
        );

        stats.outcome = self.run_stages(&mut stats).await;

        stats.elapsed = started.elapsed();
        stats.upstream = self.client.stats().since(&upstream_before);
        stats.peak_rss_kb = sample_peak_rss_kb();
        self.tracker.finish(&stats);
        stats.log_summary();
        stats
    }

    async fn run_stages(&self, stats: &mut CycleStats) -> CycleOutcome {
        let directory = self.refresh_categories().await;

        let candidates = match self.client.discover(&self.profile).await {
            Ok(candidates) => candidates,
            Err(e) => {
                return CycleOutcome::Aborted {
                    reason: e.to_string(),
                }
            }
        };
        stats.candidates_found = candidates.len();

        let (kept, excluded) =
            filter_candidates(candidates, &self.profile.excluded_categories, &directory);
        stats.candidates_excluded = excluded;
        tracing::info!(
            "Resolving {} candidates with {} workers ({} excluded by category)",
            kept.len(),
            self.pool.config().concurrency,
            excluded
        );

        let mut builder = PlaylistBuilder::new();
        let pool_stats = self
            .pool
            .run(kept, &directory, |entry| {
                builder.add(entry);
            })
            .await;
        stats.record_pool(pool_stats);
        stats.duplicates = builder.duplicates();

        let artifact = builder.build(Utc::now());
        let entries = artifact.entry_count();
        stats.categories = artifact
            .category_counts()
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();

        self.tracker.enter_phase(CyclePhase::Publishing);
        match self.store.publish(artifact) {
            PublishOutcome::Published => {
                self.write_playlist_file().await;
                CycleOutcome::Published { entries }
            }
            PublishOutcome::RetainedPrevious => {
                tracing::warn!("Cycle produced no entries; keeping the previous playlist");
                CycleOutcome::RetainedPrevious
            }
        }
    }

    /// Builtin names overlaid with the provider's current list
    async fn refresh_categories(&self) -> CategoryDirectory {
        match self
            .client
            .fetch_categories(self.profile.region_code.as_deref())
            .await
        {
            Ok(fetched) => {
                tracing::debug!("Fetched {} category names", fetched.len());
                self.base_directory.merged_with(&fetched)
            }
            Err(e) => {
                tracing::warn!("Category refresh failed, using builtin names: {}", e);
                self.base_directory.clone()
            }
        }
    }

    async fn write_playlist_file(&self) {
        let (Some(path), Some(artifact)) = (&self.playlist_path, self.store.get()) else {
            return;
        };

        match write_atomically(path, artifact.text.as_bytes()).await {
            Ok(()) => tracing::info!(
                "Playlist saved: {} ({} entries)",
                path.display(),
                artifact.entry_count()
            ),
            Err(e) => tracing::warn!("Failed to write playlist to {}: {}", path.display(), e),
        }
    }
}

/// Writes `contents` to a temporary sibling of `path`, then renames it into place
pub async fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    tokio::fs::write(&temp_path, contents).await?;
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}
