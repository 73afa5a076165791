//! Delayed, idempotent deletion of processed source artifacts.

use crate::ingest::ArtifactRegistry;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Removes `path`, treating "already gone" as success. Returns whether this
/// call deleted the file.
pub fn remove_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Deletes scheduled files once their grace period has passed.
///
/// One background thread holds a FIFO of `(path, due)` pairs. Since every
/// entry uses the same grace, FIFO order is due order. Dropping the last
/// scheduler handle flushes the remaining deletions immediately and ends
/// the thread, so at shutdown a source may be deleted before its grace
/// period has elapsed.
///
/// With a registry attached, each deleted path is released from it so the
/// registry only holds artifacts that still exist on disk.
#[derive(Debug, Clone)]
pub struct CleanupScheduler {
    tx: Sender<PathBuf>,
    grace: Duration,
    registry: Option<Arc<ArtifactRegistry>>,
}

impl CleanupScheduler {
    pub fn spawn(grace: Duration) -> (Self, JoinHandle<()>) {
        Self::spawn_with_registry(grace, None)
    }

    pub fn spawn_with_registry(
        grace: Duration,
        registry: Option<Arc<ArtifactRegistry>>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let thread_registry = registry.clone();
        let handle = thread::spawn(move || run(rx, grace, thread_registry.as_deref()));
        (Self { tx, grace, registry }, handle)
    }

    /// Queues `path` for deletion after the grace period.
    pub fn schedule(&self, path: &Path) {
        if self.tx.send(path.to_path_buf()).is_err() {
            log::warn!(
                "cleanup thread gone, deleting {} immediately",
                path.display()
            );
            remove_logged(path, self.registry.as_deref());
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }
}

/// Deletes `path` and, once it is gone, releases it from `registry`. A file
/// that could not be deleted stays registered so it is not admitted again.
fn remove_logged(path: &Path, registry: Option<&ArtifactRegistry>) {
    match remove_if_exists(path) {
        Ok(true) => log::debug!("deleted {}", path.display()),
        Ok(false) => {}
        Err(e) => {
            log::warn!("failed to delete {}: {e}", path.display());
            return;
        }
    }
    if let Some(registry) = registry {
        registry.release_processed(path);
    }
}

fn run(rx: Receiver<PathBuf>, grace: Duration, registry: Option<&ArtifactRegistry>) {
    let mut pending: VecDeque<(PathBuf, Instant)> = VecDeque::new();
    loop {
        let now = Instant::now();
        while pending.front().is_some_and(|(_, due)| *due <= now) {
            if let Some((path, _)) = pending.pop_front() {
                remove_logged(&path, registry);
            }
        }

        let received = match pending.front() {
            Some((_, due)) => rx.recv_timeout(due.saturating_duration_since(now)),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok(path) => pending.push_back((path, Instant::now() + grace)),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    for (path, _) in pending {
        remove_logged(&path, registry);
    }
    log::debug!("cleanup thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_if_exists_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        fs::write(&path, b"x").unwrap();

        assert!(remove_if_exists(&path).unwrap());
        assert!(!remove_if_exists(&path).unwrap());
    }

    #[test]
    fn test_deletes_after_grace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        fs::write(&path, b"x").unwrap();

        let (scheduler, handle) = CleanupScheduler::spawn(Duration::from_millis(100));
        scheduler.schedule(&path);

        thread::sleep(Duration::from_millis(30));
        assert!(path.exists(), "deleted before grace elapsed");
        thread::sleep(Duration::from_millis(250));
        assert!(!path.exists());

        drop(scheduler);
        handle.join().unwrap();
    }

    #[test]
    fn test_already_deleted_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let (scheduler, handle) = CleanupScheduler::spawn(Duration::from_millis(1));
        scheduler.schedule(&dir.path().join("never-existed.wav"));
        drop(scheduler);
        handle.join().unwrap();
    }

    #[test]
    fn test_drop_flushes_pending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        fs::write(&path, b"x").unwrap();

        let (scheduler, handle) = CleanupScheduler::spawn(Duration::from_secs(60));
        scheduler.schedule(&path);
        drop(scheduler);
        handle.join().unwrap();

        assert!(!path.exists());
    }

    #[test]
    fn test_deletion_releases_processed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        fs::write(&path, b"x").unwrap();
        let registry = Arc::new(ArtifactRegistry::new());
        registry.mark_processed(&path);

        let (scheduler, handle) =
            CleanupScheduler::spawn_with_registry(Duration::from_millis(1), Some(registry.clone()));
        scheduler.schedule(&path);
        drop(scheduler);
        handle.join().unwrap();

        assert!(!path.exists());
        assert_eq!(registry.state(&path), None);
        assert_eq!(registry.processed_count(), 0);
    }

    #[test]
    fn test_undeletable_artifact_stays_processed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be removed with remove_file.
        let path = dir.path().join("stuck.wav");
        fs::create_dir(&path).unwrap();
        let registry = Arc::new(ArtifactRegistry::new());
        registry.mark_processed(&path);

        let (scheduler, handle) =
            CleanupScheduler::spawn_with_registry(Duration::from_millis(1), Some(registry.clone()));
        scheduler.schedule(&path);
        drop(scheduler);
        handle.join().unwrap();

        assert!(path.exists());
        assert!(registry.is_processed(&path));
    }
}
