//! Category naming and exclusion
//!
//! The directory maps upstream category ids to display names; the filter drops
//! candidates whose category is excluded by the search profile.

mod directory;
mod filter;

pub use directory::{CategoryDirectory, UNCATEGORIZED};
pub use filter::{filter_candidates, should_keep};
