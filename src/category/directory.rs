//! Category id to display name lookup

use std::collections::HashMap;

/// Bucket used for entries whose category id is not in the directory
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Category table published by the search provider for the US region
const BUILTIN_CATEGORIES: &[(&str, &str)] = &[
    ("1", "Film & Animation"),
    ("2", "Autos & Vehicles"),
    ("10", "Music"),
    ("15", "Pets & Animals"),
    ("17", "Sports"),
    ("18", "Short Movies"),
    ("19", "Travel & Events"),
    ("20", "Gaming"),
    ("21", "Videoblogging"),
    ("22", "People & Blogs"),
    ("23", "Comedy"),
    ("24", "Entertainment"),
    ("25", "News & Politics"),
    ("26", "Howto & Style"),
    ("27", "Education"),
    ("28", "Science & Technology"),
    ("29", "Nonprofits & Activism"),
    ("30", "Movies"),
    ("31", "Anime/Animation"),
    ("32", "Action/Adventure"),
    ("33", "Classics"),
    ("34", "Comedy"),
    ("35", "Documentary"),
    ("36", "Drama"),
    ("37", "Family"),
    ("38", "Foreign"),
    ("39", "Horror"),
    ("40", "Sci-Fi/Fantasy"),
    ("41", "Thriller"),
    ("42", "Shorts"),
    ("43", "Shows"),
    ("44", "Trailers"),
];

/// Static mapping from upstream category identifiers to human-readable names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryDirectory {
    names: HashMap<String, String>,
}

impl CategoryDirectory {
    /// Directory backed by the built-in category table
    pub fn builtin() -> Self {
        Self::from_entries(
            BUILTIN_CATEGORIES
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string())),
        )
    }

    /// Builds a directory from `(id, name)` pairs; later pairs win on duplicate ids
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            names: entries.into_iter().collect(),
        }
    }

    /// Returns a copy of this directory with `other`'s names layered on top
    pub fn merged_with(&self, other: &CategoryDirectory) -> Self {
        let mut names = self.names.clone();
        names.extend(
            other
                .names
                .iter()
                .map(|(id, name)| (id.clone(), name.clone())),
        );
        Self { names }
    }

    /// Looks up a category name; `None` for unknown ids
    pub fn name(&self, category_id: &str) -> Option<&str> {
        self.names.get(category_id).map(String::as_str)
    }

    /// Looks up a category name, falling back to [`UNCATEGORIZED`]
    pub fn display_name(&self, category_id: &str) -> &str {
        self.name(category_id).unwrap_or(UNCATEGORIZED)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for CategoryDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}
