//! Process wiring: watcher, scanner, queue, workers and cleanup from startup
//! until shutdown.

use crate::cleanup::CleanupScheduler;
use crate::config::Config;
use crate::defaults;
use crate::dispatch::{CancelFlag, panic_message};
use crate::error::{Result, VoxbridgeError};
use crate::ingest::{ArtifactRegistry, ArtifactWatcher, PeriodicScanner, sweep};
use crate::queue::WorkQueue;
use crate::stage::Providers;
use crate::status::{MESSAGE_RECEIVED, RequestStatus, StatusStore};
use crate::worker::{Artifact, PipelineWorker, UPLOAD_PREFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long `stop` lets in-flight jobs finish before cancelling them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// How long `stop` waits after cancelling before detaching threads.
const CANCEL_GRACE: Duration = Duration::from_secs(1);

/// Receives errors from background components that have no caller to
/// return them to.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, component: &str, error: &VoxbridgeError);
}

/// Reports through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, component: &str, error: &VoxbridgeError) {
        log::error!("[{component}] {error}");
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    running: Arc<AtomicBool>,
    cancel: CancelFlag,
    threads: Vec<(&'static str, JoinHandle<()>)>,
    watcher: Option<ArtifactWatcher>,
    cleanup: Option<(CleanupScheduler, JoinHandle<()>)>,
    status: Arc<StatusStore>,
    registry: Arc<ArtifactRegistry>,
    watch_dir: PathBuf,
    extension: String,
    reporter: Arc<dyn ErrorReporter>,
}

impl PipelineHandle {
    /// Stores uploaded audio as a new artifact and returns its request id.
    ///
    /// The file is written under a hidden temporary name and renamed into
    /// place, so discovery never sees a partial upload.
    pub fn submit(&self, audio: &[u8]) -> Result<String> {
        publish_upload(&self.watch_dir, &self.extension, &self.status, audio, |id, _| {
            log::info!("[{id}] received {} bytes", audio.len());
        })
    }

    /// Current status of a request, `None` if unknown.
    pub fn status(&self, request_id: &str) -> Option<RequestStatus> {
        self.status.get(request_id)
    }

    pub fn registry(&self) -> &Arc<ArtifactRegistry> {
        &self.registry
    }

    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }

    /// Stops discovery and workers.
    ///
    /// Workers finish their current job for up to 5s; after that in-flight
    /// dispatches are cancelled and, 1s later, remaining threads are
    /// detached. Queued but unstarted artifacts are abandoned. Returns the
    /// number of detached threads.
    pub fn stop(mut self) -> usize {
        self.running.store(false, Ordering::SeqCst);

        if let Some(watcher) = self.watcher.take() {
            self.threads.push(("watcher", watcher.stop()));
        }

        let mut threads = std::mem::take(&mut self.threads);
        threads = self.join_until(threads, Instant::now() + SHUTDOWN_GRACE);
        if !threads.is_empty() {
            log::warn!(
                "{} thread(s) still busy after {:?}, cancelling in-flight work",
                threads.len(),
                SHUTDOWN_GRACE
            );
            self.cancel.cancel();
            threads = self.join_until(threads, Instant::now() + CANCEL_GRACE);
        }

        let detached = threads.len();
        if detached > 0 {
            log::warn!("shutdown timeout: {detached} thread(s) still running, detaching");
            // Dropping JoinHandles detaches threads; they die with the process.
        }

        if let Some((scheduler, handle)) = self.cleanup.take() {
            drop(scheduler);
            // Detached workers still hold scheduler clones; its thread would
            // never see the channel close.
            if detached == 0 {
                self.join_until(vec![("cleanup", handle)], Instant::now() + CANCEL_GRACE);
            }
        }

        log::info!("pipeline stopped");
        detached
    }

    /// Joins finished threads until all are done or `deadline` passes,
    /// returning the ones still running.
    fn join_until(
        &self,
        mut threads: Vec<(&'static str, JoinHandle<()>)>,
        deadline: Instant,
    ) -> Vec<(&'static str, JoinHandle<()>)> {
        let poll_interval = Duration::from_millis(50);

        loop {
            let mut remaining = Vec::new();
            for (name, handle) in threads.drain(..) {
                if handle.is_finished() {
                    if let Err(panic_info) = handle.join() {
                        let message = panic_message(panic_info.as_ref());
                        self.reporter.report(
                            name,
                            &VoxbridgeError::Other(format!("thread panicked: {message}")),
                        );
                    }
                } else {
                    remaining.push((name, handle));
                }
            }
            threads = remaining;

            if threads.is_empty() || Instant::now() >= deadline {
                return threads;
            }
            thread::sleep(poll_interval);
        }
    }
}

/// Watch directory → queue → workers → status store.
pub struct Pipeline {
    config: Config,
    providers: Providers,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Pipeline {
    pub fn new(config: Config, providers: Providers) -> Self {
        Self {
            config,
            providers,
            error_reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts every background thread and returns the handle that stops them.
    ///
    /// Artifacts already in the watch directory are queued before the
    /// watcher starts.
    pub fn start(self) -> Result<PipelineHandle> {
        self.config.validate()?;
        fs::create_dir_all(&self.config.watch.dir)?;
        fs::create_dir_all(&self.config.output.dir)?;
        let watch_dir = fs::canonicalize(&self.config.watch.dir)?;

        let ingest = self.config.ingest_config();
        let running = Arc::new(AtomicBool::new(true));
        let cancel = CancelFlag::new();
        let registry = Arc::new(ArtifactRegistry::new());
        let status = Arc::new(StatusStore::with_ttl(self.config.status_ttl()));
        let queue = WorkQueue::bounded(self.config.pipeline.queue_capacity);
        let (scheduler, cleanup_handle) = CleanupScheduler::spawn_with_registry(
            self.config.cleanup_grace(),
            Some(Arc::clone(&registry)),
        );
        let mut threads = Vec::new();

        if let Err(e) = sweep(&watch_dir, &registry, &queue, &ingest) {
            self.error_reporter.report("sweep", &e);
        }

        let watcher = ArtifactWatcher::spawn(
            &watch_dir,
            Arc::clone(&registry),
            queue.clone(),
            ingest.clone(),
            Arc::clone(&running),
        )?;

        threads.push((
            "scanner",
            PeriodicScanner::spawn(
                watch_dir.clone(),
                Arc::clone(&registry),
                queue.clone(),
                ingest.clone(),
                Arc::clone(&running),
            ),
        ));

        for _ in 0..self.config.pipeline.workers {
            let worker = PipelineWorker::new(
                &self.providers,
                self.config.worker_config(),
                Arc::clone(&status),
                Arc::clone(&registry),
            )
            .with_cleanup(scheduler.clone())
            .with_cancel(cancel.clone());
            let queue = queue.clone();
            let running = Arc::clone(&running);
            threads.push(("worker", thread::spawn(move || worker.run(&queue, &running))));
        }

        let stats = spawn_stats(queue.clone(), Arc::clone(&registry), Arc::clone(&running));
        threads.push(("stats", stats));

        log::info!(
            "pipeline started: {} worker(s), queue capacity {}, watching {}",
            self.config.pipeline.workers,
            queue.capacity(),
            watch_dir.display()
        );

        Ok(PipelineHandle {
            running,
            cancel,
            threads,
            watcher: Some(watcher),
            cleanup: Some((scheduler, cleanup_handle)),
            status,
            registry,
            watch_dir,
            extension: ingest.extension,
            reporter: self.error_reporter,
        })
    }

    /// Runs one file through the worker on the calling thread, without
    /// watching or deleting it.
    pub fn process_file(&self, path: &Path) -> Result<RequestStatus> {
        let artifact = Artifact::from_path(path)?;
        let status = Arc::new(StatusStore::new());
        let mut config = self.config.worker_config();
        config.delete_source = false;

        let worker = PipelineWorker::new(
            &self.providers,
            config,
            Arc::clone(&status),
            Arc::new(ArtifactRegistry::new()),
        );
        worker.process(&artifact);

        status
            .get(&artifact.request_id)
            .ok_or_else(|| VoxbridgeError::Other(format!("no status for {}", artifact.request_id)))
    }
}

/// Writes `audio` into `watch_dir` as a new upload and records its status.
///
/// The `received` status exists before the file becomes visible, so a
/// worker that finishes the job early is never overwritten. A failed write
/// leaves no status behind. `on_published` runs once the file is in place.
fn publish_upload(
    watch_dir: &Path,
    extension: &str,
    status: &StatusStore,
    audio: &[u8],
    on_published: impl FnOnce(&str, &Path),
) -> Result<String> {
    let request_id = uuid::Uuid::new_v4().to_string();
    let name = format!("{UPLOAD_PREFIX}{request_id}.{extension}");
    let staging = watch_dir.join(format!(".{name}.part"));
    let path = watch_dir.join(name);

    status.insert_processing(&request_id, MESSAGE_RECEIVED);
    if let Err(e) = fs::write(&staging, audio).and_then(|()| fs::rename(&staging, &path)) {
        status.remove(&request_id);
        if let Err(cleanup) = crate::cleanup::remove_if_exists(&staging) {
            log::warn!("failed to remove {}: {cleanup}", staging.display());
        }
        return Err(e.into());
    }

    on_published(&request_id, &path);
    Ok(request_id)
}

/// Logs queue depth periodically while work is pending.
fn spawn_stats(
    queue: WorkQueue,
    registry: Arc<ArtifactRegistry>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while crate::ingest::sleep_while_running(&running, defaults::STATS_INTERVAL) {
            if !queue.is_empty() {
                log::info!(
                    "queue: {} pending, {} awaiting cleanup",
                    queue.len(),
                    registry.processed_count()
                );
            }
        }
    })
}
