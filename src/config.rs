use crate::defaults;
use crate::error::{Result, VoxbridgeError};
use crate::ingest::{IngestConfig, SettleConfig};
use crate::stage::{TranslateOptions, VoiceOptions};
use crate::worker::WorkerConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub watch: WatchConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub languages: LanguageConfig,
    pub providers: ProviderConfig,
}

/// Artifact discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchConfig {
    pub dir: PathBuf,
    pub extension: String,
    pub scan_interval_ms: u64,
    pub scan_recent: usize,
    pub quiescence_ms: u64,
    pub settle_window_ms: u64,
    pub settle_poll_ms: u64,
}

/// Job processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub stt_chunk_secs: u64,
    pub translate_chunk_chars: usize,
    pub tts_chunk_chars: usize,
    pub stt_concurrency: usize,
    pub translate_concurrency: usize,
    pub tts_concurrency: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,
    pub cleanup_grace_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_ttl_secs: Option<u64>,
    pub delete_source: bool,
}

/// Output locations and transcript file labels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub source_label: String,
    pub target_label: String,
}

/// Language pair, translation register and synthesis voice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageConfig {
    pub source: String,
    pub target: String,
    pub mode: String,
    pub speaker_gender: String,
    pub voice: String,
}

/// Provider endpoints, models and credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub stt_url: String,
    pub stt_model: String,
    pub translate_url: String,
    pub translate_model: String,
    pub tts_url: String,
    pub tts_model: String,
    pub llm_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::WATCH_DIR),
            extension: defaults::ARTIFACT_EXTENSION.to_string(),
            scan_interval_ms: defaults::SCAN_INTERVAL.as_millis() as u64,
            scan_recent: defaults::SCAN_RECENT,
            quiescence_ms: defaults::QUIESCENCE.as_millis() as u64,
            settle_window_ms: defaults::SETTLE_WINDOW.as_millis() as u64,
            settle_poll_ms: defaults::SETTLE_POLL.as_millis() as u64,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKERS,
            queue_capacity: defaults::QUEUE_CAPACITY,
            stt_chunk_secs: defaults::STT_CHUNK.as_secs(),
            translate_chunk_chars: defaults::TRANSLATE_CHUNK_CHARS,
            tts_chunk_chars: defaults::TTS_CHUNK_CHARS,
            stt_concurrency: defaults::SEQUENTIAL,
            translate_concurrency: defaults::SEQUENTIAL,
            tts_concurrency: defaults::TTS_CONCURRENCY,
            job_timeout_secs: None,
            cleanup_grace_secs: defaults::CLEANUP_GRACE.as_secs(),
            status_ttl_secs: None,
            delete_source: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::OUTPUT_DIR),
            source_label: defaults::SOURCE_LABEL.to_string(),
            target_label: defaults::TARGET_LABEL.to_string(),
        }
    }
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source: defaults::SOURCE_LANGUAGE.to_string(),
            target: defaults::TARGET_LANGUAGE.to_string(),
            mode: defaults::TRANSLATION_MODE.to_string(),
            speaker_gender: defaults::SPEAKER_GENDER.to_string(),
            voice: defaults::VOICE.to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            stt_url: defaults::STT_URL.to_string(),
            stt_model: defaults::STT_MODEL.to_string(),
            translate_url: defaults::TRANSLATE_URL.to_string(),
            translate_model: defaults::TRANSLATE_MODEL.to_string(),
            tts_url: defaults::TTS_URL.to_string(),
            tts_model: defaults::TTS_MODEL.to_string(),
            llm_base_url: defaults::LLM_BASE_URL.to_string(),
            llm_api_key: None,
            llm_model: defaults::LLM_MODEL.to_string(),
            system_prompt: defaults::SYSTEM_PROMPT.to_string(),
            timeout_secs: defaults::PROVIDER_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXBRIDGE_WATCH_DIR → watch.dir
    /// - VOXBRIDGE_OUTPUT_DIR → output.dir
    /// - VOXBRIDGE_TARGET_LANGUAGE → languages.target
    /// - SARVAM_AI_API → providers.api_key
    /// - GROQ_API_KEY → providers.llm_api_key
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("VOXBRIDGE_WATCH_DIR")
            && !dir.is_empty()
        {
            self.watch.dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("VOXBRIDGE_OUTPUT_DIR")
            && !dir.is_empty()
        {
            self.output.dir = PathBuf::from(dir);
        }

        if let Ok(target) = std::env::var("VOXBRIDGE_TARGET_LANGUAGE")
            && !target.is_empty()
        {
            self.languages.target = target;
        }

        if let Ok(key) = std::env::var("SARVAM_AI_API")
            && !key.is_empty()
        {
            self.providers.api_key = Some(key);
        }

        if let Ok(key) = std::env::var("GROQ_API_KEY")
            && !key.is_empty()
        {
            self.providers.llm_api_key = Some(key);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxbridge/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxbridge")
            .join("config.toml")
    }

    /// Rejects values that would stall or break the pipeline.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("pipeline.workers", self.pipeline.workers),
            ("pipeline.queue_capacity", self.pipeline.queue_capacity),
            ("pipeline.stt_chunk_secs", self.pipeline.stt_chunk_secs as usize),
            ("pipeline.translate_chunk_chars", self.pipeline.translate_chunk_chars),
            ("pipeline.tts_chunk_chars", self.pipeline.tts_chunk_chars),
            ("pipeline.stt_concurrency", self.pipeline.stt_concurrency),
            ("pipeline.translate_concurrency", self.pipeline.translate_concurrency),
            ("pipeline.tts_concurrency", self.pipeline.tts_concurrency),
            ("watch.scan_interval_ms", self.watch.scan_interval_ms as usize),
            ("watch.settle_poll_ms", self.watch.settle_poll_ms as usize),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(VoxbridgeError::ConfigInvalidValue {
                    key: key.to_string(),
                    message: "must be greater than zero".to_string(),
                });
            }
        }

        if self.pipeline.job_timeout_secs == Some(0) {
            return Err(VoxbridgeError::ConfigInvalidValue {
                key: "pipeline.job_timeout_secs".to_string(),
                message: "must be greater than zero when set".to_string(),
            });
        }

        if self.watch.extension.is_empty() || self.watch.extension.starts_with('.') {
            return Err(VoxbridgeError::ConfigInvalidValue {
                key: "watch.extension".to_string(),
                message: format!(
                    "expected an extension without a dot, got {:?}",
                    self.watch.extension
                ),
            });
        }

        Ok(())
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            extension: self.watch.extension.clone(),
            settle: SettleConfig {
                window: Duration::from_millis(self.watch.settle_window_ms),
                poll: Duration::from_millis(self.watch.settle_poll_ms),
            },
            scan_interval: Duration::from_millis(self.watch.scan_interval_ms),
            scan_recent: self.watch.scan_recent,
            quiescence: Duration::from_millis(self.watch.quiescence_ms),
        }
    }

    pub fn translate_options(&self) -> TranslateOptions {
        TranslateOptions {
            source: self.languages.source.clone(),
            target: self.languages.target.clone(),
            mode: self.languages.mode.clone(),
            speaker_gender: self.languages.speaker_gender.clone(),
        }
    }

    pub fn voice_options(&self) -> VoiceOptions {
        VoiceOptions {
            voice: self.languages.voice.clone(),
            language: self.languages.target.clone(),
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            output_dir: self.output.dir.clone(),
            stt_chunk: Duration::from_secs(self.pipeline.stt_chunk_secs),
            translate_chunk_chars: self.pipeline.translate_chunk_chars,
            tts_chunk_chars: self.pipeline.tts_chunk_chars,
            stt_concurrency: self.pipeline.stt_concurrency,
            translate_concurrency: self.pipeline.translate_concurrency,
            tts_concurrency: self.pipeline.tts_concurrency,
            job_timeout: self.pipeline.job_timeout_secs.map(Duration::from_secs),
            source_label: self.output.source_label.clone(),
            target_label: self.output.target_label.clone(),
            translate: self.translate_options(),
            voice: self.voice_options(),
            delete_source: self.pipeline.delete_source,
            dequeue_timeout: defaults::DEQUEUE_TIMEOUT,
        }
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_secs(self.pipeline.cleanup_grace_secs)
    }

    pub fn status_ttl(&self) -> Option<Duration> {
        self.pipeline.status_ttl_secs.map(Duration::from_secs)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.providers.timeout_secs)
    }
}
