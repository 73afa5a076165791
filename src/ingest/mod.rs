//! Artifact discovery: filesystem events plus a periodic directory scan.
//!
//! Both paths funnel through [`admit`], which consults the shared
//! [`ArtifactRegistry`] so an artifact seen by both is queued once.

pub mod registry;
pub mod scanner;
pub mod settle;
pub mod watcher;

use crate::defaults;
use crate::queue::WorkQueue;
use crate::worker::Artifact;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

pub use registry::{ArtifactRegistry, ArtifactState};
pub use scanner::{PeriodicScanner, scan_once, sweep};
pub use settle::{SettleConfig, SettleOutcome, settle_with, wait_for_stable_size};
pub use watcher::{ArtifactWatcher, is_audio_artifact};

/// Discovery tuning shared by the watcher and scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Artifact file extension, without the dot.
    pub extension: String,
    pub settle: SettleConfig,
    pub scan_interval: Duration,
    /// How many of the most recently modified artifacts each scan inspects.
    pub scan_recent: usize,
    /// Minimum age of the last modification before a scan admits a file.
    pub quiescence: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extension: defaults::ARTIFACT_EXTENSION.to_string(),
            settle: SettleConfig::default(),
            scan_interval: defaults::SCAN_INTERVAL,
            scan_recent: defaults::SCAN_RECENT,
            quiescence: defaults::QUIESCENCE,
        }
    }
}

/// What happened to a discovered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// Already known to the registry.
    Duplicate,
    /// Size never stabilized.
    Unstable,
    /// Vanished or unreadable.
    Missing,
    /// The work queue was full or closed.
    Rejected,
}

/// Moves an artifact from unseen to queued.
///
/// With `settle`, waits for the file size to stabilize first. Anything
/// other than [`Admission::Queued`] or [`Admission::Duplicate`] releases the
/// registry entry so a later scan can retry.
pub fn admit(
    path: &Path,
    registry: &ArtifactRegistry,
    queue: &WorkQueue,
    settle: Option<&SettleConfig>,
) -> Admission {
    if !registry.begin_settling(path) {
        return Admission::Duplicate;
    }

    if let Some(settle) = settle {
        match wait_for_stable_size(path, settle) {
            SettleOutcome::Stable(_) => {}
            SettleOutcome::Unstable => {
                log::warn!("{} did not settle, skipping", path.display());
                registry.forget(path);
                return Admission::Unstable;
            }
            SettleOutcome::Missing => {
                log::debug!("{} vanished while settling", path.display());
                registry.forget(path);
                return Admission::Missing;
            }
        }
    }

    let artifact = match Artifact::from_path(path) {
        Ok(artifact) => artifact,
        Err(e) => {
            log::debug!("{}: {e}", path.display());
            registry.forget(path);
            return Admission::Missing;
        }
    };

    registry.mark_queued(path);
    match queue.try_enqueue(artifact) {
        Ok(()) => {
            log::info!("queued {}", path.display());
            Admission::Queued
        }
        Err(e) => {
            log::warn!("{} not queued: {e}", path.display());
            registry.forget(path);
            Admission::Rejected
        }
    }
}

/// Sleeps up to `duration`, waking early once `running` is cleared.
/// Returns whether still running.
pub(crate) fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    const STEP: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + duration;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(STEP.min(deadline - now));
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fast_settle() -> SettleConfig {
        SettleConfig {
            window: Duration::from_millis(200),
            poll: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_admit_queues_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        fs::write(&path, [1u8; 64]).unwrap();
        let registry = ArtifactRegistry::new();
        let queue = WorkQueue::bounded(4);

        assert_eq!(
            admit(&path, &registry, &queue, Some(&fast_settle())),
            Admission::Queued
        );
        assert_eq!(admit(&path, &registry, &queue, None), Admission::Duplicate);
        assert_eq!(queue.len(), 1);
        assert_eq!(registry.state(&path), Some(ArtifactState::Queued));
    }

    #[test]
    fn test_admit_empty_file_is_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        fs::write(&path, b"").unwrap();
        let registry = ArtifactRegistry::new();
        let queue = WorkQueue::bounded(4);

        assert_eq!(
            admit(&path, &registry, &queue, Some(&fast_settle())),
            Admission::Unstable
        );
        assert_eq!(registry.state(&path), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_admit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ArtifactRegistry::new();
        let queue = WorkQueue::bounded(4);

        assert_eq!(
            admit(&dir.path().join("gone.wav"), &registry, &queue, None),
            Admission::Missing
        );
    }

    #[test]
    fn test_admit_full_queue_releases_entry() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("1.wav");
        let second = dir.path().join("2.wav");
        fs::write(&first, [1u8; 8]).unwrap();
        fs::write(&second, [1u8; 8]).unwrap();
        let registry = ArtifactRegistry::new();
        let queue = WorkQueue::bounded(1);

        assert_eq!(admit(&first, &registry, &queue, None), Admission::Queued);
        assert_eq!(admit(&second, &registry, &queue, None), Admission::Rejected);
        assert_eq!(registry.state(&second), None);

        queue.dequeue_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(admit(&second, &registry, &queue, None), Admission::Queued);
    }

    #[test]
    fn test_sleep_while_running_wakes_on_stop() {
        let running = AtomicBool::new(false);
        let start = Instant::now();
        assert!(!sleep_while_running(&running, Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));

        let running = AtomicBool::new(true);
        assert!(sleep_while_running(&running, Duration::from_millis(20)));
    }
}
