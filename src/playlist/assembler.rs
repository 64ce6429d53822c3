//! Playlist assembly and extended M3U serialization
//!
//! Entries arrive in resolution-completion order, which varies run to run, so
//! the builder sorts before rendering: category name ascending, then discovery
//! sequence, then video id. Identical entry sets therefore render to identical
//! bytes.

use crate::playlist::artifact::{PlaylistArtifact, ResolvedEntry};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// First line of every playlist
pub const PLAYLIST_HEADER: &str = "#EXTM3U";

/// Accumulates resolved entries for one cycle
#[derive(Debug, Default)]
pub struct PlaylistBuilder {
    entries: Vec<ResolvedEntry>,
    seen: HashSet<String>,
    duplicates: usize,
}

impl PlaylistBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry; returns false and drops it if its video id is already present
    pub fn add(&mut self, entry: ResolvedEntry) -> bool {
        if !self.seen.insert(entry.video_id().to_string()) {
            tracing::debug!("Duplicate resolved entry {} dropped", entry.video_id());
            self.duplicates += 1;
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries rejected as duplicates so far
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Sorts, renders, and freezes the playlist
    pub fn build(self, generated_at: DateTime<Utc>) -> PlaylistArtifact {
        let mut entries = self.entries;
        entries.sort_by(|a, b| {
            a.category_name
                .cmp(&b.category_name)
                .then_with(|| a.candidate.sequence.cmp(&b.candidate.sequence))
                .then_with(|| a.candidate.video_id.cmp(&b.candidate.video_id))
        });

        let text = render(&entries);
        PlaylistArtifact {
            entries,
            text,
            generated_at,
        }
    }
}

/// Builds an artifact from any collection of entries
pub fn assemble<I>(entries: I, generated_at: DateTime<Utc>) -> PlaylistArtifact
where
    I: IntoIterator<Item = ResolvedEntry>,
{
    let mut builder = PlaylistBuilder::new();
    for entry in entries {
        builder.add(entry);
    }
    builder.build(generated_at)
}

/// Renders entries, already in playlist order, as extended M3U
pub fn render(entries: &[ResolvedEntry]) -> String {
    let mut out = String::with_capacity(16 + entries.len() * 160);
    out.push_str(PLAYLIST_HEADER);
    out.push('\n');

    for entry in entries {
        let title = display_title(entry);
        out.push_str(&format!(
            "#EXTINF:-1 group-title=\"{}\",{}\n",
            group_label(&entry.category_name),
            title
        ));
        out.push_str(single_line(&entry.stream_url).trim());
        out.push('\n');
    }

    out
}

/// Category label safe to embed in a quoted attribute
fn group_label(category: &str) -> String {
    single_line(category).replace('"', "'")
}

/// Title with commas and line breaks flattened to single spaces
fn display_title(entry: &ResolvedEntry) -> String {
    let flattened = single_line(&entry.candidate.title).replace(',', " ");
    let title = flattened.split_whitespace().collect::<Vec<_>>().join(" ");
    if title.is_empty() {
        entry.candidate.video_id.clone()
    } else {
        title
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
