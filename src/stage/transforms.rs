//! The four pipeline stages and their fallback policies.

use crate::chunk::AudioClip;
use crate::stage::provider::{
    ResponseGenerator, SpeechToText, Synthesizer, TranslateOptions, Translator, VoiceOptions,
};
use crate::stage::{Chunk, ProviderError, StageKind, TransformError, TransformStage};
use std::sync::Arc;

/// Speech-to-text over audio segments. Failed segments are dropped.
pub struct TranscribeStage {
    provider: Arc<dyn SpeechToText>,
}

impl TranscribeStage {
    pub fn new(provider: Arc<dyn SpeechToText>) -> Self {
        Self { provider }
    }
}

impl TransformStage for TranscribeStage {
    type Input = AudioClip;
    type Output = String;

    fn kind(&self) -> StageKind {
        StageKind::Transcribe
    }

    fn apply(&self, chunk: &Chunk<AudioClip>) -> Result<String, TransformError> {
        let wav = chunk.payload.to_wav_bytes().map_err(|e| {
            TransformError::new(self.kind(), chunk.index, ProviderError::Other(e.to_string()))
        })?;
        self.provider
            .transcribe(&wav)
            .map(|text| text.trim().to_string())
            .map_err(|e| TransformError::new(self.kind(), chunk.index, e))
    }
}

/// Response generation over the whole transcript.
///
/// Never chunked. A provider failure is not fatal to the job: the error text
/// becomes the response.
pub struct GenerateStage {
    provider: Arc<dyn ResponseGenerator>,
}

impl GenerateStage {
    pub fn new(provider: Arc<dyn ResponseGenerator>) -> Self {
        Self { provider }
    }

    /// Inline text used in place of a response when generation fails.
    pub fn error_text(error: &TransformError) -> String {
        format!("Error generating response: {}", error.source)
    }
}

impl TransformStage for GenerateStage {
    type Input = String;
    type Output = String;

    fn kind(&self) -> StageKind {
        StageKind::Generate
    }

    fn apply(&self, chunk: &Chunk<String>) -> Result<String, TransformError> {
        self.provider
            .generate(&chunk.payload)
            .map_err(|e| TransformError::new(self.kind(), chunk.index, e))
    }

    fn fallback(&self, _chunk: &Chunk<String>, error: &TransformError) -> Option<String> {
        Some(Self::error_text(error))
    }
}

/// Translation over text chunks. A failed chunk keeps its original text.
pub struct TranslateStage {
    provider: Arc<dyn Translator>,
    options: TranslateOptions,
}

impl TranslateStage {
    pub fn new(provider: Arc<dyn Translator>, options: TranslateOptions) -> Self {
        Self { provider, options }
    }
}

impl TransformStage for TranslateStage {
    type Input = String;
    type Output = String;

    fn kind(&self) -> StageKind {
        StageKind::Translate
    }

    fn apply(&self, chunk: &Chunk<String>) -> Result<String, TransformError> {
        self.provider
            .translate(&chunk.payload, &self.options)
            .map_err(|e| TransformError::new(self.kind(), chunk.index, e))
    }

    fn fallback(&self, chunk: &Chunk<String>, _error: &TransformError) -> Option<String> {
        Some(chunk.payload.clone())
    }
}

/// Text-to-speech over text chunks. Failed chunks are dropped.
pub struct SynthesizeStage {
    provider: Arc<dyn Synthesizer>,
    voice: VoiceOptions,
}

impl SynthesizeStage {
    pub fn new(provider: Arc<dyn Synthesizer>, voice: VoiceOptions) -> Self {
        Self { provider, voice }
    }
}

impl TransformStage for SynthesizeStage {
    type Input = String;
    type Output = Vec<u8>;

    fn kind(&self) -> StageKind {
        StageKind::Synthesize
    }

    fn apply(&self, chunk: &Chunk<String>) -> Result<Vec<u8>, TransformError> {
        let audio = self
            .provider
            .synthesize(&chunk.payload, &self.voice)
            .map_err(|e| TransformError::new(self.kind(), chunk.index, e))?;
        if audio.is_empty() {
            return Err(TransformError::new(
                self.kind(),
                chunk.index,
                ProviderError::Decode("empty audio".to_string()),
            ));
        }
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::mock::{MockGenerator, MockSpeechToText, MockSynthesizer, MockTranslator};

    fn text_chunk(index: usize, text: &str) -> Chunk<String> {
        Chunk::new(index, text.to_string(), Arc::from("req"))
    }

    #[test]
    fn test_transcribe_trims_provider_output() {
        let stage = TranscribeStage::new(Arc::new(MockSpeechToText::new().with_response("  hi  ")));
        let chunk = Chunk::new(0, AudioClip::new(vec![0; 160], 16000, 1), Arc::from("req"));
        assert_eq!(stage.apply(&chunk).unwrap(), "hi");
    }

    #[test]
    fn test_transcribe_failure_has_no_fallback() {
        let stage = TranscribeStage::new(Arc::new(MockSpeechToText::new().with_failure_on(0)));
        let chunk = Chunk::new(4, AudioClip::new(vec![0; 160], 16000, 1), Arc::from("req"));

        let error = stage.apply(&chunk).unwrap_err();
        assert_eq!(error.index, 4);
        assert_eq!(error.stage, StageKind::Transcribe);
        assert!(stage.fallback(&chunk, &error).is_none());
    }

    #[test]
    fn test_generate_failure_falls_back_to_error_text() {
        let stage = GenerateStage::new(Arc::new(MockGenerator::new().with_failure()));
        let chunk = text_chunk(0, "question");

        let error = stage.apply(&chunk).unwrap_err();
        let fallback = stage.fallback(&chunk, &error).unwrap();
        assert!(fallback.starts_with("Error generating response:"));
        assert!(fallback.contains("mock generation failure"));
    }

    #[test]
    fn test_translate_failure_falls_back_to_original() {
        let stage = TranslateStage::new(
            Arc::new(MockTranslator::new().with_failure()),
            TranslateOptions::default(),
        );
        let chunk = text_chunk(2, "keep me");

        let error = stage.apply(&chunk).unwrap_err();
        assert_eq!(stage.fallback(&chunk, &error), Some("keep me".to_string()));
    }

    #[test]
    fn test_translate_passes_options() {
        let options = TranslateOptions {
            target: "hi-IN".to_string(),
            ..Default::default()
        };
        let stage = TranslateStage::new(Arc::new(MockTranslator::new()), options);
        assert_eq!(stage.apply(&text_chunk(0, "hello")).unwrap(), "[hi-IN] hello");
    }

    #[test]
    fn test_synthesize_failure_is_dropped() {
        let stage = SynthesizeStage::new(
            Arc::new(MockSynthesizer::new().failing_on("boom")),
            VoiceOptions::default(),
        );
        let chunk = text_chunk(1, "boom");

        let error = stage.apply(&chunk).unwrap_err();
        assert!(stage.fallback(&chunk, &error).is_none());
    }

    #[test]
    fn test_synthesize_rejects_empty_audio() {
        let stage = SynthesizeStage::new(Arc::new(MockSynthesizer::new()), VoiceOptions::default());
        let error = stage.apply(&text_chunk(0, "")).unwrap_err();
        assert!(matches!(error.source, ProviderError::Decode(_)));
    }
}
