//! Ordered parallel dispatch of chunks to a stage.
//!
//! Up to `concurrency` chunks are in flight at once, launched in batches.
//! Results are reassembled by original index regardless of completion order.
//! A deadline or cancellation abandons the batch: in-flight provider calls
//! keep running on their threads but their results are discarded.

use crate::stage::{Chunk, ProviderError, TransformError, TransformStage};
use crossbeam_channel::RecvTimeoutError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// How often a waiting dispatcher re-checks cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared cancellation signal. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Point in time after which a dispatch is abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn is_expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, or `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

/// Why a dispatch returned without all results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("cancelled")]
    Cancelled,
}

/// Runs work items with bounded parallelism and preserves input order.
#[derive(Debug, Clone)]
pub struct OrderedDispatcher {
    concurrency: usize,
    cancel: CancelFlag,
}

impl OrderedDispatcher {
    /// A dispatcher running at most `concurrency` items at once (minimum 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            cancel: CancelFlag::new(),
        }
    }

    /// Observe an external cancellation flag.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Applies `f` to every item, `concurrency` at a time.
    ///
    /// Returns `(index, result)` pairs sorted by index. An item whose thread
    /// panicked produces no pair; use [`run_stage`] to turn panics into
    /// stage fallbacks instead.
    pub fn run<T, R, F>(
        &self,
        items: Vec<T>,
        deadline: Deadline,
        f: F,
    ) -> Result<Vec<(usize, R)>, DispatchError>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(usize, T) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let mut results = Vec::with_capacity(items.len());
        let mut pending = items.into_iter().enumerate().peekable();

        while pending.peek().is_some() {
            self.check(deadline)?;

            let (tx, rx) = crossbeam_channel::unbounded();
            let mut launched = 0;
            for (index, item) in pending.by_ref().take(self.concurrency) {
                let tx = tx.clone();
                let f = Arc::clone(&f);
                thread::spawn(move || {
                    let output = f(index, item);
                    // Receiver is gone when the dispatch was abandoned.
                    if tx.send((index, output)).is_err() {
                        log::debug!("dropping late result for item {index}");
                    }
                });
                launched += 1;
            }
            drop(tx);

            let mut received = 0;
            while received < launched {
                self.check(deadline)?;
                let wait = deadline
                    .remaining()
                    .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
                match rx.recv_timeout(wait) {
                    Ok(pair) => {
                        results.push(pair);
                        received += 1;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        log::warn!(
                            "{} dispatched item(s) ended without a result",
                            launched - received
                        );
                        break;
                    }
                }
            }
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(results)
    }

    fn check(&self, deadline: Deadline) -> Result<(), DispatchError> {
        if self.cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        if deadline.is_expired() {
            return Err(DispatchError::DeadlineExceeded);
        }
        Ok(())
    }
}

/// Runs a stage over chunks through `dispatcher`.
///
/// Each chunk either yields the provider result or, on failure (including a
/// panic inside the provider), the stage's fallback. Chunks whose fallback is
/// `None` are omitted. The returned pairs are in chunk-index order.
pub fn run_stage<S: TransformStage>(
    stage: &Arc<S>,
    chunks: Vec<Chunk<S::Input>>,
    dispatcher: &OrderedDispatcher,
    deadline: Deadline,
) -> Result<Vec<(usize, S::Output)>, DispatchError> {
    let stage = Arc::clone(stage);
    let outputs = dispatcher.run(chunks, deadline, move |_, chunk| {
        apply_with_fallback(stage.as_ref(), &chunk)
    })?;
    Ok(outputs
        .into_iter()
        .filter_map(|(index, output)| output.map(|o| (index, o)))
        .collect())
}

fn apply_with_fallback<S: TransformStage>(stage: &S, chunk: &Chunk<S::Input>) -> Option<S::Output> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| stage.apply(chunk))).unwrap_or_else(
        |payload| {
            Err(TransformError::new(
                stage.kind(),
                chunk.index,
                ProviderError::Panicked(panic_message(payload.as_ref())),
            ))
        },
    );

    match outcome {
        Ok(output) => Some(output),
        Err(error) => {
            log::warn!("[{}] {error}", chunk.parent);
            stage.fallback(chunk, &error)
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
