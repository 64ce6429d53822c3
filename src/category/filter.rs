//! Exclusion of candidates by category name

use crate::category::CategoryDirectory;
use crate::discovery::Candidate;
use std::collections::BTreeSet;

/// Decides whether a candidate survives the category exclusion set
///
/// Matching is exact and case-sensitive against the directory name. A candidate
/// whose category id is unknown to the directory is kept.
pub fn should_keep(
    candidate: &Candidate,
    excluded: &BTreeSet<String>,
    directory: &CategoryDirectory,
) -> bool {
    match directory.name(&candidate.category_id) {
        Some(name) => !excluded.contains(name),
        None => true,
    }
}

/// Applies [`should_keep`] to a whole batch, returning the survivors and the
/// number dropped
pub fn filter_candidates(
    candidates: Vec<Candidate>,
    excluded: &BTreeSet<String>,
    directory: &CategoryDirectory,
) -> (Vec<Candidate>, usize) {
    let before = candidates.len();
    let kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| {
            let keep = should_keep(c, excluded, directory);
            if !keep {
                tracing::debug!(
                    "Skipped {} ({}): excluded category {}",
                    c.video_id,
                    c.title,
                    directory.display_name(&c.category_id)
                );
            }
            keep
        })
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
