use crate::category::CategoryDirectory;
use crate::discovery::Candidate;
use chrono::{DateTime, Utc};

/// MIME type served for the playlist
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// A candidate that resolved to a playable stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub candidate: Candidate,

    /// Directly playable stream URL; ephemeral on the provider side
    pub stream_url: String,

    pub resolved_at: DateTime<Utc>,

    /// Directory name for the candidate's category, or the uncategorized bucket
    pub category_name: String,
}

impl ResolvedEntry {
    pub fn new(
        candidate: Candidate,
        stream_url: String,
        resolved_at: DateTime<Utc>,
        directory: &CategoryDirectory,
    ) -> Self {
        let category_name = directory.display_name(&candidate.category_id).to_string();
        Self {
            candidate,
            stream_url,
            resolved_at,
            category_name,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.candidate.video_id
    }
}

/// A complete, immutable playlist as published for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistArtifact {
    /// Entries in playlist order: category name, then discovery order
    pub entries: Vec<ResolvedEntry>,

    /// Serialized extended M3U text
    pub text: String,

    pub generated_at: DateTime<Utc>,
}

impl PlaylistArtifact {
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Category names with their entry counts, in playlist order
    pub fn category_counts(&self) -> Vec<(&str, usize)> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for entry in &self.entries {
            match counts.last_mut() {
                Some((name, count)) if *name == entry.category_name => *count += 1,
                _ => counts.push((entry.category_name.as_str(), 1)),
            }
        }
        counts
    }
}
