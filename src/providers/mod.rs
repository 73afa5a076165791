//! Blocking HTTP providers.
//!
//! Sarvam-style speech-to-text, translation and text-to-speech, plus an
//! OpenAI-compatible chat-completions generator (Groq, OpenAI, Ollama).
//! Every client carries a per-call timeout; status and body of a failed call
//! are surfaced as [`ProviderError::Status`].

pub mod chat;
pub mod sarvam;

use crate::config::Config;
use crate::error::{Result, VoxbridgeError};
use crate::stage::{ProviderError, Providers};
use reqwest::blocking::{Client, Response};
use std::sync::Arc;
use std::time::Duration;

pub use chat::ChatCompletionsGenerator;
pub use sarvam::{SarvamSpeechToText, SarvamSynthesizer, SarvamTranslator};

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

/// Blocking client with a per-request timeout.
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| VoxbridgeError::ProviderUnavailable {
            provider: "http".to_string(),
            message: e.to_string(),
        })
}

/// Passes through responses whose status is in `accepted`; anything else
/// becomes [`ProviderError::Status`] carrying the body.
fn accept(response: Response, accepted: &[u16]) -> std::result::Result<Response, ProviderError> {
    let status = response.status().as_u16();
    if accepted.contains(&status) {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ProviderError::Status { status, body })
}

/// Builds all four providers from configuration.
///
/// Fails if a credential is missing; pass them in the config file or via
/// `SARVAM_AI_API` and `GROQ_API_KEY`.
pub fn from_config(config: &Config) -> Result<Providers> {
    let providers = &config.providers;
    let api_key = providers
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| VoxbridgeError::ProviderUnavailable {
            provider: "sarvam".to_string(),
            message: "no API key (set providers.api_key or SARVAM_AI_API)".to_string(),
        })?;
    let client = http_client(config.provider_timeout())?;

    Ok(Providers {
        stt: Arc::new(SarvamSpeechToText::new(
            client.clone(),
            &api_key,
            &providers.stt_url,
            &providers.stt_model,
        )),
        generator: Arc::new(ChatCompletionsGenerator::new(
            client.clone(),
            &providers.llm_base_url,
            providers.llm_api_key.as_deref(),
            &providers.llm_model,
            &providers.system_prompt,
        )),
        translator: Arc::new(SarvamTranslator::new(
            client.clone(),
            &api_key,
            &providers.translate_url,
            &providers.translate_model,
        )),
        synthesizer: Arc::new(SarvamSynthesizer::new(
            client,
            &api_key,
            &providers.tts_url,
            &providers.tts_model,
        )),
    })
}
