//! Publication store for the current playlist
//!
//! Backed by a `tokio::sync::watch` channel holding an `Arc` to an immutable
//! artifact. Readers clone the `Arc` and never see a half-replaced value; the
//! writer swaps the pointer.

use crate::playlist::artifact::PlaylistArtifact;
use std::sync::Arc;
use tokio::sync::watch;

/// What happened to an artifact handed to [`PublicationStore::publish`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The artifact is now current
    Published,
    /// The artifact was empty and a non-empty one was already current; kept the old one
    RetainedPrevious,
}

/// Holds the currently published playlist, shared between the cycle driver and
/// the HTTP front door
#[derive(Debug, Clone)]
pub struct PublicationStore {
    current: Arc<watch::Sender<Option<Arc<PlaylistArtifact>>>>,
}

impl PublicationStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            current: Arc::new(tx),
        }
    }

    /// The current artifact, or `None` before anything has been published
    pub fn get(&self) -> Option<Arc<PlaylistArtifact>> {
        self.current.borrow().clone()
    }

    /// Unconditionally replaces the current artifact
    pub fn set(&self, artifact: PlaylistArtifact) {
        self.current.send_replace(Some(Arc::new(artifact)));
    }

    /// Replaces the current artifact unless that would blank out a non-empty one
    ///
    /// The check and the swap happen under the channel's write lock, so a
    /// concurrent `get` sees either the old or the new artifact.
    pub fn publish(&self, artifact: PlaylistArtifact) -> PublishOutcome {
        let incoming = Arc::new(artifact);
        let mut outcome = PublishOutcome::Published;

        self.current.send_if_modified(|current| {
            let blanks_out = incoming.is_empty()
                && current.as_ref().is_some_and(|prior| !prior.is_empty());
            if blanks_out {
                outcome = PublishOutcome::RetainedPrevious;
                false
            } else {
                *current = Some(Arc::clone(&incoming));
                true
            }
        });

        outcome
    }
}

impl Default for PublicationStore {
    fn default() -> Self {
        Self::new()
    }
}
