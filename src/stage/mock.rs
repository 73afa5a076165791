//! Mock providers for testing.
//!
//! Each mock records the inputs it received and can be configured to fail or
//! stall on specific inputs, so pipeline behavior can be exercised without
//! network access.

use crate::stage::provider::{
    ResponseGenerator, SpeechToText, Synthesizer, TranslateOptions, Translator, VoiceOptions,
};
use crate::stage::ProviderError;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

fn record(log: &Mutex<Vec<String>>, entry: &str) {
    if let Ok(mut log) = log.lock() {
        log.push(entry.to_string());
    }
}

fn snapshot(log: &Mutex<Vec<String>>) -> Vec<String> {
    log.lock().map(|log| log.clone()).unwrap_or_default()
}

fn mock_failure(what: &str) -> ProviderError {
    ProviderError::Status {
        status: 500,
        body: format!("mock {what} failure"),
    }
}

/// Mock speech-to-text. Answers calls in order from a script.
#[derive(Debug, Default)]
pub struct MockSpeechToText {
    responses: Vec<String>,
    fail_calls: Vec<usize>,
    calls: AtomicUsize,
}

impl MockSpeechToText {
    /// Returns "mock transcription" for every call.
    pub fn new() -> Self {
        Self::default().with_response("mock transcription")
    }

    /// Every call returns `response`.
    pub fn with_response(mut self, response: &str) -> Self {
        self.responses = vec![response.to_string()];
        self
    }

    /// Call `i` returns `responses[i]`; calls past the end repeat the last one.
    pub fn with_responses(mut self, responses: &[&str]) -> Self {
        self.responses = responses.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Call number `call` (0-based) fails.
    pub fn with_failure_on(mut self, call: usize) -> Self {
        self.fail_calls.push(call);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SpeechToText for MockSpeechToText {
    fn transcribe(&self, _wav: &[u8]) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_calls.contains(&call) {
            return Err(mock_failure("transcription"));
        }
        Ok(self
            .responses
            .get(call)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock-stt"
    }
}

/// Mock response generator.
#[derive(Debug)]
pub struct MockGenerator {
    response: String,
    should_fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            response: "mock response".to_string(),
            should_fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        snapshot(&self.prompts)
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseGenerator for MockGenerator {
    fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        record(&self.prompts, prompt);
        if self.should_fail {
            Err(mock_failure("generation"))
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        "mock-llm"
    }
}

/// Mock translator. Prefixes each chunk with the target language tag.
#[derive(Debug, Default)]
pub struct MockTranslator {
    fail_on: Vec<String>,
    fail_all: bool,
    empty: bool,
    inputs: Mutex<Vec<String>>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails for any chunk containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Succeeds with empty text for every chunk.
    pub fn with_empty_output(mut self) -> Self {
        self.empty = true;
        self
    }

    pub fn inputs(&self) -> Vec<String> {
        snapshot(&self.inputs)
    }
}

impl Translator for MockTranslator {
    fn translate(&self, text: &str, options: &TranslateOptions) -> Result<String, ProviderError> {
        record(&self.inputs, text);
        if self.fail_all || self.fail_on.iter().any(|n| text.contains(n.as_str())) {
            return Err(mock_failure("translation"));
        }
        if self.empty {
            return Ok(String::new());
        }
        Ok(format!("[{}] {}", options.target, text))
    }

    fn name(&self) -> &str {
        "mock-translate"
    }
}

/// Mock synthesizer. Returns the chunk text as bytes and tracks how many
/// calls overlap.
#[derive(Debug, Default)]
pub struct MockSynthesizer {
    fail_on: Vec<String>,
    delays: Vec<(String, Duration)>,
    inputs: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails for any chunk containing `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on.push(needle.to_string());
        self
    }

    /// Sleeps for `delay` before answering chunks containing `needle`.
    pub fn with_delay_on(mut self, needle: &str, delay: Duration) -> Self {
        self.delays.push((needle.to_string(), delay));
        self
    }

    pub fn inputs(&self) -> Vec<String> {
        snapshot(&self.inputs)
    }

    /// Highest number of simultaneous `synthesize` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl Synthesizer for MockSynthesizer {
    fn synthesize(&self, text: &str, _voice: &VoiceOptions) -> Result<Vec<u8>, ProviderError> {
        record(&self.inputs, text);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((_, delay)) = self.delays.iter().find(|(n, _)| text.contains(n.as_str())) {
            thread::sleep(*delay);
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_on.iter().any(|n| text.contains(n.as_str())) {
            return Err(mock_failure("synthesis"));
        }
        Ok(text.as_bytes().to_vec())
    }

    fn name(&self) -> &str {
        "mock-tts"
    }
}
