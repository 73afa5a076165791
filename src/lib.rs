//! voxbridge - spoken question in, translated spoken answer out
//!
//! Watches a directory for WAV recordings, transcribes them, generates a
//! response, translates it and synthesizes the translation to audio.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod chunk;
pub mod cleanup;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod orchestrator;
#[cfg(feature = "providers")]
pub mod providers;
pub mod queue;
pub mod stage;
pub mod status;
pub mod worker;

// Provider seams
pub use stage::{Providers, ResponseGenerator, SpeechToText, Synthesizer, Translator};

// Pipeline
pub use orchestrator::{ErrorReporter, LogReporter, Pipeline, PipelineHandle};
pub use status::{PipelineResult, RequestState, RequestStatus};

// Error handling
pub use error::{Result, VoxbridgeError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_carries_hash_only_when_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", hash_part);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
