//! Request status store, polled by external callers.
//!
//! Writes are atomic per key. Readers may see a stale `processing` for a job
//! that just finished; status is polled, never pushed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

pub const MESSAGE_RECEIVED: &str = "Audio received, processing started";
pub const MESSAGE_COMPLETED: &str = "Processing completed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Processing,
    Completed,
    Error,
}

impl RequestState {
    pub fn is_finished(self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// Payloads of a completed job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub transcript: String,
    pub response: String,
    pub translation: String,
    /// Synthesized segments in playback order.
    pub audio_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestStatus {
    pub status: RequestState,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<PipelineResult>,
    #[serde(skip)]
    pub updated_at: Instant,
}

impl RequestStatus {
    fn new(status: RequestState, message: impl Into<String>, result: Option<PipelineResult>) -> Self {
        Self {
            status,
            message: message.into(),
            result,
            updated_at: Instant::now(),
        }
    }
}

/// Map from request id to its latest status.
#[derive(Debug, Default)]
pub struct StatusStore {
    entries: RwLock<HashMap<String, RequestStatus>>,
    /// Finished entries older than this are evicted.
    ttl: Option<Duration>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::default(),
            ttl,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, RequestStatus>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, RequestStatus>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a freshly submitted request, replacing any previous entry.
    pub fn insert_processing(&self, request_id: &str, message: &str) {
        self.write().insert(
            request_id.to_string(),
            RequestStatus::new(RequestState::Processing, message, None),
        );
    }

    /// Inserts `processing` only if the id is unknown. Returns whether it
    /// inserted.
    pub fn ensure_processing(&self, request_id: &str, message: &str) -> bool {
        let mut entries = self.write();
        if entries.contains_key(request_id) {
            return false;
        }
        entries.insert(
            request_id.to_string(),
            RequestStatus::new(RequestState::Processing, message, None),
        );
        true
    }

    pub fn complete(&self, request_id: &str, result: PipelineResult) {
        self.write().insert(
            request_id.to_string(),
            RequestStatus::new(RequestState::Completed, MESSAGE_COMPLETED, Some(result)),
        );
    }

    pub fn fail(&self, request_id: &str, message: impl Into<String>) {
        self.write().insert(
            request_id.to_string(),
            RequestStatus::new(RequestState::Error, message, None),
        );
    }

    /// Drops a request, e.g. one whose upload never reached disk.
    pub fn remove(&self, request_id: &str) -> Option<RequestStatus> {
        self.write().remove(request_id)
    }

    /// Latest status, or `None` for an unknown id.
    pub fn get(&self, request_id: &str) -> Option<RequestStatus> {
        self.read().get(request_id).cloned()
    }

    /// Drops finished entries older than the TTL. Returns how many were
    /// removed. A store without a TTL keeps everything.
    pub fn evict_expired(&self) -> usize {
        let Some(ttl) = self.ttl else { return 0 };
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.status.is_finished() || entry.updated_at.elapsed() < ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            log::debug!("evicted {evicted} finished status entries");
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
