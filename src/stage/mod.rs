//! Transform stages: one external capability behind a uniform
//! "chunk in, chunk result out" contract.
//!
//! A stage pairs a provider call ([`TransformStage::apply`]) with its
//! per-stage fallback policy ([`TransformStage::fallback`]):
//!
//! | Stage | On chunk failure |
//! |---|---|
//! | transcribe | chunk dropped |
//! | generate | error text returned inline |
//! | translate | original chunk returned unchanged |
//! | synthesize | chunk dropped |

pub mod mock;
pub mod provider;
pub mod transforms;

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use provider::{
    Providers, ResponseGenerator, SpeechToText, Synthesizer, TranslateOptions, Translator, VoiceOptions,
};
pub use transforms::{GenerateStage, SynthesizeStage, TranscribeStage, TranslateStage};

/// A bounded slice of a larger payload, tagged with its original position.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    /// 0-based position in the parent payload. Stable across dispatch.
    pub index: usize,
    pub payload: T,
    /// Request identifier of the job the parent payload belongs to.
    pub parent: Arc<str>,
}

impl<T> Chunk<T> {
    pub fn new(index: usize, payload: T, parent: Arc<str>) -> Self {
        Self {
            index,
            payload,
            parent,
        }
    }

    /// Numbers payloads in order, all belonging to `parent`.
    pub fn sequence(parent: &Arc<str>, payloads: impl IntoIterator<Item = T>) -> Vec<Self> {
        payloads
            .into_iter()
            .enumerate()
            .map(|(index, payload)| Self::new(index, payload, Arc::clone(parent)))
            .collect()
    }
}

/// Which external capability a stage wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Transcribe,
    Generate,
    Translate,
    Synthesize,
}

impl StageKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Generate => "generate",
            Self::Translate => "translate",
            Self::Synthesize => "synthesize",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure reported by a provider for a single call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Non-success HTTP status.
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, timeout or other transport failure.
    #[error("request failed: {0}")]
    Transport(String),

    /// Response arrived but could not be interpreted.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The provider call panicked.
    #[error("provider panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

/// A provider failure on one chunk of one stage.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{stage} failed on chunk {index}: {source}")]
pub struct TransformError {
    pub stage: StageKind,
    pub index: usize,
    pub source: ProviderError,
}

impl TransformError {
    pub fn new(stage: StageKind, index: usize, source: ProviderError) -> Self {
        Self {
            stage,
            index,
            source,
        }
    }
}

/// One external capability applied to chunks.
///
/// Implementations must be shareable across dispatcher threads.
pub trait TransformStage: Send + Sync + 'static {
    /// Chunk payload consumed by the provider.
    type Input: Send + Sync + 'static;
    /// Per-chunk result.
    type Output: Send + 'static;

    fn kind(&self) -> StageKind;

    /// Runs the provider on one chunk.
    fn apply(&self, chunk: &Chunk<Self::Input>) -> Result<Self::Output, TransformError>;

    /// Result to use when [`apply`](Self::apply) failed. `None` drops the
    /// chunk from the reassembled output.
    fn fallback(&self, _chunk: &Chunk<Self::Input>, _error: &TransformError) -> Option<Self::Output> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_sequence_numbers_in_order() {
        let parent: Arc<str> = Arc::from("req-1");
        let chunks = Chunk::sequence(&parent, ["a", "b", "c"]);

        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(chunks[2].payload, "c");
        assert_eq!(&*chunks[0].parent, "req-1");
    }

    #[test]
    fn test_transform_error_display() {
        let error = TransformError::new(
            StageKind::Translate,
            3,
            ProviderError::Status {
                status: 429,
                body: "rate limited".to_string(),
            },
        );
        assert_eq!(
            error.to_string(),
            "translate failed on chunk 3: status 429: rate limited"
        );
    }

    #[test]
    fn test_transform_error_exposes_source() {
        let error = TransformError::new(
            StageKind::Synthesize,
            0,
            ProviderError::Transport("connection reset".to_string()),
        );
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_stage_kind_labels() {
        assert_eq!(StageKind::Transcribe.to_string(), "transcribe");
        assert_eq!(StageKind::Generate.to_string(), "generate");
        assert_eq!(StageKind::Translate.to_string(), "translate");
        assert_eq!(StageKind::Synthesize.to_string(), "synthesize");
    }
}
