//! Playlist assembly and publication
//!
//! The assembler turns one cycle's resolved entries into an immutable artifact;
//! the publication store holds the artifact consumers are currently served.

mod artifact;
mod assembler;
mod store;

pub use artifact::{PlaylistArtifact, ResolvedEntry, PLAYLIST_CONTENT_TYPE};
pub use assembler::{assemble, render, PlaylistBuilder, PLAYLIST_HEADER};
pub use store::{PublicationStore, PublishOutcome};
