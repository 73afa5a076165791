//! Sarvam AI speech-to-text, translation and text-to-speech.

use crate::providers::accept;
use crate::stage::{ProviderError, SpeechToText, Synthesizer, TranslateOptions, Translator, VoiceOptions};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use serde_json::{Value, json};

const AUTH_HEADER: &str = "api-subscription-key";

/// Reads `field` as a string, or fails with a decode error naming it.
fn string_field(body: &Value, field: &str) -> Result<String, ProviderError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ProviderError::Decode(format!("missing `{field}` in response")))
}

/// Multipart speech-to-text. Accepts 200 and 201.
pub struct SarvamSpeechToText {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl SarvamSpeechToText {
    pub fn new(client: Client, api_key: &str, url: &str, model: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            url: url.to_string(),
            model: model.to_string(),
        }
    }
}

/// A missing `transcript` means no speech was recognized.
fn parse_transcript(body: &Value) -> String {
    body.get("transcript")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl SpeechToText for SarvamSpeechToText {
    fn transcribe(&self, wav: &[u8]) -> Result<String, ProviderError> {
        let file = Part::bytes(wav.to_vec())
            .file_name("audiofile.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("with_diarization", "false");

        let response = self
            .client
            .post(&self.url)
            .header(AUTH_HEADER, &self.api_key)
            .multipart(form)
            .send()?;
        let body: Value = accept(response, &[200, 201])?.json()?;
        Ok(parse_transcript(&body))
    }

    fn name(&self) -> &str {
        "sarvam-stt"
    }
}

/// JSON translation.
pub struct SarvamTranslator {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl SarvamTranslator {
    pub fn new(client: Client, api_key: &str, url: &str, model: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            url: url.to_string(),
            model: model.to_string(),
        }
    }

    fn body(&self, text: &str, options: &TranslateOptions) -> Value {
        json!({
            "input": text,
            "source_language_code": options.source,
            "target_language_code": options.target,
            "speaker_gender": options.speaker_gender,
            "mode": options.mode,
            "model": self.model,
            "enable_preprocessing": false,
        })
    }
}

impl Translator for SarvamTranslator {
    fn translate(&self, text: &str, options: &TranslateOptions) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .header(AUTH_HEADER, &self.api_key)
            .json(&self.body(text, options))
            .send()?;
        let body: Value = accept(response, &[200])?.json()?;
        string_field(&body, "translated_text")
    }

    fn name(&self) -> &str {
        "sarvam-translate"
    }
}

/// JSON text-to-speech returning base64 WAV in `audios`.
pub struct SarvamSynthesizer {
    client: Client,
    api_key: String,
    url: String,
    model: String,
}

impl SarvamSynthesizer {
    pub fn new(client: Client, api_key: &str, url: &str, model: &str) -> Self {
        Self {
            client,
            api_key: api_key.to_string(),
            url: url.to_string(),
            model: model.to_string(),
        }
    }

    fn body(&self, text: &str, voice: &VoiceOptions) -> Value {
        json!({
            "text": text,
            "target_language_code": voice.language,
            "speaker": voice.voice,
            "model": self.model,
            "enable_preprocessing": true,
        })
    }
}

fn parse_audio(body: &Value) -> Result<Vec<u8>, ProviderError> {
    let encoded = body
        .get("audios")
        .and_then(Value::as_array)
        .and_then(|audios| audios.first())
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::Decode("missing `audios` in response".to_string()))?;
    STANDARD
        .decode(encoded)
        .map_err(|e| ProviderError::Decode(format!("invalid base64 audio: {e}")))
}

impl Synthesizer for SarvamSynthesizer {
    fn synthesize(&self, text: &str, voice: &VoiceOptions) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .header(AUTH_HEADER, &self.api_key)
            .json(&self.body(text, voice))
            .send()?;
        let body: Value = accept(response, &[200])?.json()?;
        parse_audio(&body)
    }

    fn name(&self) -> &str {
        "sarvam-tts"
    }
}
