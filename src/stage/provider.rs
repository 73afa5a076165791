//! Provider traits: the external collaborators consumed by the stages.
//!
//! Every call is blocking and made from the calling thread. Implementations
//! own their transport, credentials and per-call timeouts.

use crate::defaults;
use crate::stage::ProviderError;
use std::sync::Arc;

/// Speech-to-text provider.
pub trait SpeechToText: Send + Sync {
    /// Transcribes one WAV-encoded audio segment. An empty string means no
    /// speech was recognized.
    fn transcribe(&self, wav: &[u8]) -> Result<String, ProviderError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Response-generation provider (an LLM behind a prompt).
pub trait ResponseGenerator: Send + Sync {
    /// Produces a response to the full transcript.
    fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

/// Translation provider.
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, options: &TranslateOptions) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

/// Text-to-speech provider.
pub trait Synthesizer: Send + Sync {
    /// Synthesizes one text chunk, returning encoded audio (WAV).
    fn synthesize(&self, text: &str, voice: &VoiceOptions) -> Result<Vec<u8>, ProviderError>;

    fn name(&self) -> &str;
}

/// The four collaborators one pipeline run needs.
#[derive(Clone)]
pub struct Providers {
    pub stt: Arc<dyn SpeechToText>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("stt", &self.stt.name())
            .field("generator", &self.generator.name())
            .field("translator", &self.translator.name())
            .field("synthesizer", &self.synthesizer.name())
            .finish()
    }
}

/// Source/target language pair and register for a translation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateOptions {
    pub source: String,
    pub target: String,
    /// Provider-specific register, e.g. `formal` or `classic-colloquial`.
    pub mode: String,
    pub speaker_gender: String,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            source: defaults::SOURCE_LANGUAGE.to_string(),
            target: defaults::TARGET_LANGUAGE.to_string(),
            mode: defaults::TRANSLATION_MODE.to_string(),
            speaker_gender: defaults::SPEAKER_GENDER.to_string(),
        }
    }
}

/// Voice and language for a synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceOptions {
    pub voice: String,
    pub language: String,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            voice: defaults::VOICE.to_string(),
            language: defaults::TARGET_LANGUAGE.to_string(),
        }
    }
}

impl<T: SpeechToText + ?Sized> SpeechToText for Arc<T> {
    fn transcribe(&self, wav: &[u8]) -> Result<String, ProviderError> {
        (**self).transcribe(wav)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: ResponseGenerator + ?Sized> ResponseGenerator for Arc<T> {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        (**self).generate(prompt)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Translator + ?Sized> Translator for Arc<T> {
    fn translate(&self, text: &str, options: &TranslateOptions) -> Result<String, ProviderError> {
        (**self).translate(text, options)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    fn synthesize(&self, text: &str, voice: &VoiceOptions) -> Result<Vec<u8>, ProviderError> {
        (**self).synthesize(text, voice)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
