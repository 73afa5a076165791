//! Per-artifact lifecycle tracking shared by the watcher, scanner and workers.
//!
//! ```text
//! unseen → Settling → Queued → Processing → Processed
//!            │          │                      │
//!            └── forget ┘                      └── release_processed
//! ```
//!
//! `forget` covers artifacts that were unstable, vanished, or rejected by a
//! full queue. `release_processed` runs once the source has been deleted.
//!
//! Every transition is a check-and-set under one lock, so concurrent
//! discovery by the filesystem watcher and the periodic scanner admits an
//! artifact at most once, and with several workers at most one claims it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Where an artifact is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Discovered; waiting for its size to stop changing.
    Settling,
    /// Handed to the work queue.
    Queued,
    /// Owned by a worker.
    Processing,
    /// Done (successfully or not). Never admitted again while the source
    /// file exists.
    Processed,
}

/// Synchronized artifact state map. Paths absent from the map are unseen.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    entries: Mutex<HashMap<PathBuf, ArtifactState>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<PathBuf, ArtifactState>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `unseen → Settling`. Returns `false` if the artifact is already known
    /// in any state, in which case the caller must drop it.
    pub fn begin_settling(&self, path: &Path) -> bool {
        let mut entries = self.entries();
        if entries.contains_key(path) {
            return false;
        }
        entries.insert(path.to_path_buf(), ArtifactState::Settling);
        true
    }

    /// `Settling → Queued`. Returns `false` for any other starting state.
    pub fn mark_queued(&self, path: &Path) -> bool {
        self.transition(path, ArtifactState::Settling, ArtifactState::Queued)
    }

    /// `Queued → Processing`, or `unseen → Processing` for artifacts handed
    /// directly to a worker. Returns `false` if another worker already owns
    /// the artifact or it was processed before.
    pub fn claim(&self, path: &Path) -> bool {
        let mut entries = self.entries();
        match entries.get(path) {
            None | Some(ArtifactState::Queued) => {
                entries.insert(path.to_path_buf(), ArtifactState::Processing);
                true
            }
            Some(_) => false,
        }
    }

    /// Marks the artifact processed regardless of its current state.
    pub fn mark_processed(&self, path: &Path) {
        self.entries()
            .insert(path.to_path_buf(), ArtifactState::Processed);
    }

    /// Returns the artifact to `unseen` so a later discovery can retry it.
    /// Processed artifacts are never forgotten.
    pub fn forget(&self, path: &Path) {
        let mut entries = self.entries();
        if entries.get(path) != Some(&ArtifactState::Processed) {
            entries.remove(path);
        }
    }

    /// Drops a processed artifact whose source has been deleted. Any other
    /// state is left alone.
    pub fn release_processed(&self, path: &Path) -> bool {
        let mut entries = self.entries();
        if entries.get(path) == Some(&ArtifactState::Processed) {
            entries.remove(path);
            true
        } else {
            false
        }
    }

    pub fn state(&self, path: &Path) -> Option<ArtifactState> {
        self.entries().get(path).copied()
    }

    pub fn is_processed(&self, path: &Path) -> bool {
        self.state(path) == Some(ArtifactState::Processed)
    }

    pub fn processed_count(&self) -> usize {
        self.entries()
            .values()
            .filter(|state| **state == ArtifactState::Processed)
            .count()
    }

    fn transition(&self, path: &Path, from: ArtifactState, to: ArtifactState) -> bool {
        let mut entries = self.entries();
        match entries.get_mut(path) {
            Some(state) if *state == from => {
                *state = to;
                true
            }
            _ => false,
        }
    }
}
