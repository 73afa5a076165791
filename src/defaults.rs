//! Default configuration constants for voxbridge.
//!
//! Shared by the configuration types and the components that fall back to
//! them when constructed without a config.

use std::time::Duration;

/// File extension of audio artifacts picked up from the watch directory.
pub const ARTIFACT_EXTENSION: &str = "wav";

/// Default directory watched for incoming recordings and uploads.
pub const WATCH_DIR: &str = "audio_chunks";

/// Default directory for synthesized audio segments.
pub const OUTPUT_DIR: &str = "responses";

/// Maximum duration of one speech-to-text chunk.
///
/// Providers reject long uploads; 30s stays under every limit we target.
pub const STT_CHUNK: Duration = Duration::from_secs(30);

/// Maximum characters per translation request.
pub const TRANSLATE_CHUNK_CHARS: usize = 800;

/// Maximum characters per text-to-speech request.
pub const TTS_CHUNK_CHARS: usize = 300;

/// Concurrent text-to-speech calls per job.
pub const TTS_CONCURRENCY: usize = 3;

/// Speech-to-text and translation run one chunk at a time.
pub const SEQUENTIAL: usize = 1;

/// Delay before a processed source artifact is deleted.
pub const CLEANUP_GRACE: Duration = Duration::from_secs(10);

/// Interval between periodic directory scans.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(3);

/// Back-off after a failed directory scan.
pub const SCAN_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Number of most-recently-modified artifacts inspected per scan.
pub const SCAN_RECENT: usize = 2;

/// An artifact untouched for this long is considered fully written by the scanner.
pub const QUIESCENCE: Duration = Duration::from_secs(1);

/// Upper bound on waiting for a freshly-notified artifact to stop growing.
pub const SETTLE_WINDOW: Duration = Duration::from_secs(3);

/// Interval between size samples while settling.
pub const SETTLE_POLL: Duration = Duration::from_millis(100);

/// Worker dequeue timeout; bounds how long shutdown waits on an idle worker.
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

/// Work queue capacity.
pub const QUEUE_CAPACITY: usize = 64;

/// Number of pipeline workers.
pub const WORKERS: usize = 1;

/// Interval of the queue statistics log line.
pub const STATS_INTERVAL: Duration = Duration::from_secs(15);

/// Per-call timeout for provider HTTP requests.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Default source and target languages (BCP-47 with region).
pub const SOURCE_LANGUAGE: &str = "en-IN";
pub const TARGET_LANGUAGE: &str = "bn-IN";

/// Labels used in transcript file names (`<stem>_<label>.txt`).
pub const SOURCE_LABEL: &str = "english";
pub const TARGET_LABEL: &str = "bengali";

/// Default translation register and synthesis voice.
pub const TRANSLATION_MODE: &str = "formal";
pub const SPEAKER_GENDER: &str = "Male";
pub const VOICE: &str = "anushka";

/// Default provider endpoints and models.
pub const STT_URL: &str = "https://api.sarvam.ai/speech-to-text-translate";
pub const STT_MODEL: &str = "saaras:v2";
pub const TRANSLATE_URL: &str = "https://api.sarvam.ai/translate";
pub const TRANSLATE_MODEL: &str = "mayura:v1";
pub const TTS_URL: &str = "https://api.sarvam.ai/text-to-speech";
pub const TTS_MODEL: &str = "bulbul:v2";
pub const LLM_BASE_URL: &str = "https://api.groq.com/openai";
pub const LLM_MODEL: &str = "llama-3.3-70b-versatile";

/// Default system prompt for the response generator.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that provides solutions to farming \
related problems. Please provide detailed and practical solutions based on the user's query. \
Please ensure your responses are clear and actionable. Give short and to the point answers.";
