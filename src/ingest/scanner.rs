//! Periodic directory scan, the redundancy path for missed filesystem events.

use crate::defaults;
use crate::error::Result;
use crate::ingest::{
    Admission, ArtifactRegistry, IngestConfig, admit, is_audio_artifact, sleep_while_running,
};
use crate::queue::WorkQueue;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

struct Candidate {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Artifacts in `dir`, newest first.
fn list_artifacts(dir: &Path, extension: &str) -> Result<Vec<Candidate>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !is_audio_artifact(&path, extension) {
            continue;
        }
        // Entries can disappear between listing and stat.
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        found.push(Candidate {
            path,
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }
    found.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(found)
}

fn admit_candidates(
    candidates: Vec<Candidate>,
    registry: &ArtifactRegistry,
    queue: &WorkQueue,
    quiescence: Duration,
) -> usize {
    let now = SystemTime::now();
    let mut queued = 0;
    // Oldest first, so queue order follows arrival order.
    for candidate in candidates.into_iter().rev() {
        if candidate.size == 0 || registry.state(&candidate.path).is_some() {
            continue;
        }
        let age = now.duration_since(candidate.modified).unwrap_or_default();
        if age < quiescence {
            continue;
        }
        if admit(&candidate.path, registry, queue, None) == Admission::Queued {
            queued += 1;
        }
    }
    queued
}

/// One scan pass over the `scan_recent` most recently modified artifacts.
/// Returns how many were queued.
pub fn scan_once(
    dir: &Path,
    registry: &ArtifactRegistry,
    queue: &WorkQueue,
    config: &IngestConfig,
) -> Result<usize> {
    let mut candidates = list_artifacts(dir, &config.extension)?;
    candidates.truncate(config.scan_recent);
    Ok(admit_candidates(candidates, registry, queue, config.quiescence))
}

/// Startup pass over every artifact already in `dir`.
pub fn sweep(
    dir: &Path,
    registry: &ArtifactRegistry,
    queue: &WorkQueue,
    config: &IngestConfig,
) -> Result<usize> {
    let candidates = list_artifacts(dir, &config.extension)?;
    let queued = admit_candidates(candidates, registry, queue, config.quiescence);
    if queued > 0 {
        log::info!("startup sweep queued {queued} existing artifact(s)");
    }
    Ok(queued)
}

/// Background thread running [`scan_once`] every `scan_interval`.
pub struct PeriodicScanner;

impl PeriodicScanner {
    pub fn spawn(
        dir: PathBuf,
        registry: Arc<ArtifactRegistry>,
        queue: WorkQueue,
        config: IngestConfig,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut pause = config.scan_interval;
            while sleep_while_running(&running, pause) {
                pause = match scan_once(&dir, &registry, &queue, &config) {
                    Ok(queued) => {
                        if queued > 0 {
                            log::info!("scan recovered {queued} artifact(s)");
                        }
                        config.scan_interval
                    }
                    Err(e) => {
                        log::warn!("scan of {} failed: {e}", dir.display());
                        defaults::SCAN_ERROR_BACKOFF
                    }
                };
            }
            log::debug!("scanner thread exiting");
        })
    }
}
