//! Bounded FIFO handoff between ingestion and workers.
//!
//! Producers never block: a full queue rejects the artifact and the caller
//! decides what to do with it. Consumers block with a timeout so they can
//! check a shutdown flag between waits.

use crate::error::{Result, VoxbridgeError};
use crate::worker::Artifact;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Cloneable handle to one shared queue.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: Sender<Artifact>,
    rx: Receiver<Artifact>,
    capacity: usize,
}

impl WorkQueue {
    /// A queue holding at most `capacity` artifacts (minimum 1).
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Enqueues without blocking. The queue owns a receiver, so the channel
    /// never disconnects and a full queue is the only failure.
    pub fn try_enqueue(&self, artifact: Artifact) -> Result<()> {
        self.tx
            .try_send(artifact)
            .map_err(|_| VoxbridgeError::QueueFull {
                capacity: self.capacity,
            })
    }

    /// Waits up to `timeout` for the oldest artifact.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<Artifact> {
        match self.rx.recv_timeout(timeout) {
            Ok(artifact) => Some(artifact),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Instant;

    fn artifact(name: &str) -> Artifact {
        Artifact::new(PathBuf::from(format!("/audio/{name}.wav")))
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::bounded(4);
        queue.try_enqueue(artifact("a")).unwrap();
        queue.try_enqueue(artifact("b")).unwrap();

        assert_eq!(queue.len(), 2);
        let first = queue.dequeue_timeout(Duration::from_millis(10)).unwrap();
        let second = queue.dequeue_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(first.request_id, "a");
        assert_eq!(second.request_id, "b");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_rejects() {
        let queue = WorkQueue::bounded(1);
        queue.try_enqueue(artifact("a")).unwrap();

        let err = queue.try_enqueue(artifact("b")).unwrap_err();
        assert!(matches!(err, VoxbridgeError::QueueFull { capacity: 1 }));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_dequeue_times_out_when_empty() {
        let queue = WorkQueue::bounded(2);
        let start = Instant::now();
        assert!(queue.dequeue_timeout(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_clones_share_queue() {
        let queue = WorkQueue::bounded(2);
        let producer = queue.clone();
        thread::spawn(move || producer.try_enqueue(artifact("x")).unwrap())
            .join()
            .unwrap();

        let got = queue.dequeue_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(got.request_id, "x");
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(WorkQueue::bounded(0).capacity(), 1);
    }
}
