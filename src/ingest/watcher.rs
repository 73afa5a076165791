//! Filesystem-event discovery.

use crate::error::Result;
use crate::ingest::{ArtifactRegistry, IngestConfig, admit};
use crate::queue::WorkQueue;
use crossbeam_channel::RecvTimeoutError;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// True if `path` names a visible file with the artifact extension
/// (case-insensitive).
pub fn is_audio_artifact(path: &Path, extension: &str) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_none_or(|n| n.starts_with('.'));
    !hidden
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn is_write_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

/// Watches one directory and admits artifacts as they are written.
///
/// Dropping the watcher (or calling [`stop`](Self::stop)) closes the event
/// stream, which ends the admission thread.
pub struct ArtifactWatcher {
    watcher: RecommendedWatcher,
    thread: JoinHandle<()>,
}

impl ArtifactWatcher {
    pub fn spawn(
        dir: &Path,
        registry: Arc<ArtifactRegistry>,
        queue: WorkQueue,
        config: IngestConfig,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |event| {
            // Receiver is gone once the admission thread has exited.
            if let Err(e) = tx.send(event) {
                log::trace!("watch event dropped: {e}");
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        log::info!("watching {} for *.{}", dir.display(), config.extension);

        let thread = thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                let event = match rx.recv_timeout(Duration::from_millis(100)) {
                    Ok(Ok(event)) => event,
                    Ok(Err(e)) => {
                        log::warn!("watch error: {e}");
                        continue;
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };
                if !is_write_event(&event.kind) {
                    continue;
                }
                for path in artifact_paths(event.paths, &config.extension) {
                    admit(&path, &registry, &queue, Some(&config.settle));
                }
            }
            log::debug!("watcher thread exiting");
        });

        Ok(Self { watcher, thread })
    }

    /// Stops receiving events and returns the admission thread for joining.
    pub fn stop(self) -> JoinHandle<()> {
        drop(self.watcher);
        self.thread
    }
}

fn artifact_paths(paths: Vec<PathBuf>, extension: &str) -> impl Iterator<Item = PathBuf> + '_ {
    paths
        .into_iter()
        .filter(move |p| is_audio_artifact(p, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ArtifactState, SettleConfig};
    use std::fs;
    use std::time::Instant;

    #[test]
    fn test_is_audio_artifact() {
        assert!(is_audio_artifact(Path::new("/a/upload_1.wav"), "wav"));
        assert!(is_audio_artifact(Path::new("/a/REC.WAV"), "wav"));
        assert!(!is_audio_artifact(Path::new("/a/notes.txt"), "wav"));
        assert!(!is_audio_artifact(Path::new("/a/.partial.wav"), "wav"));
        assert!(!is_audio_artifact(Path::new("/a/wav"), "wav"));
    }

    #[test]
    fn test_write_event_kinds() {
        use notify::event::{CreateKind, ModifyKind, RemoveKind};
        assert!(is_write_event(&EventKind::Create(CreateKind::File)));
        assert!(is_write_event(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_write_event(&EventKind::Access(AccessKind::Close(
            AccessMode::Write
        ))));
        assert!(!is_write_event(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_write_event(&EventKind::Access(AccessKind::Read)));
    }

    #[test]
    fn test_watcher_queues_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ArtifactRegistry::new());
        let queue = WorkQueue::bounded(4);
        let running = Arc::new(AtomicBool::new(true));
        let config = IngestConfig {
            settle: SettleConfig {
                window: Duration::from_millis(500),
                poll: Duration::from_millis(10),
            },
            ..Default::default()
        };

        let watcher = ArtifactWatcher::spawn(
            dir.path(),
            Arc::clone(&registry),
            queue.clone(),
            config,
            Arc::clone(&running),
        )
        .unwrap();

        let path = dir.path().join("fresh.wav");
        fs::write(&path, [7u8; 128]).unwrap();
        fs::write(dir.path().join("ignored.txt"), b"x").unwrap();

        let artifact = queue.dequeue_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(artifact.request_id, "fresh");
        assert_eq!(registry.state(&artifact.path), Some(ArtifactState::Queued));

        running.store(false, Ordering::SeqCst);
        let start = Instant::now();
        watcher.stop().join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(queue.is_empty());
    }
}
