//! Pipeline worker: drives one artifact at a time through every stage.
//!
//! ```text
//! artifact ─▶ transcribe (per 30s segment) ─▶ generate (whole transcript)
//!          ─▶ translate (per text chunk)   ─▶ synthesize (per sentence chunk)
//!          ─▶ transcript files + tts_<id>_<NNN>.wav + status update
//! ```
//!
//! Each stage goes through the [`OrderedDispatcher`] so chunk results are
//! reassembled in order. A job ends in `completed` or `error`; either way the
//! artifact is marked processed and its deletion is scheduled.

use crate::chunk::{AudioClip, chunk_audio, chunk_sentences, chunk_text};
use crate::cleanup::CleanupScheduler;
use crate::defaults;
use crate::dispatch::{
    CancelFlag, Deadline, DispatchError, OrderedDispatcher, panic_message, run_stage,
};
use crate::error::{Result, VoxbridgeError};
use crate::ingest::ArtifactRegistry;
use crate::queue::WorkQueue;
use crate::stage::{
    Chunk, GenerateStage, Providers, StageKind, SynthesizeStage, TranscribeStage,
    TranslateOptions, TranslateStage, VoiceOptions,
};
use crate::status::{PipelineResult, RequestState, StatusStore};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// File-name prefix of artifacts written by [`crate::PipelineHandle::submit`].
pub const UPLOAD_PREFIX: &str = "upload_";

const MESSAGE_PROCESSING: &str = "Audio processing started";

/// Request id for an artifact: the file stem without the upload prefix.
pub fn request_id_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(id) = stem.strip_prefix(UPLOAD_PREFIX) {
        return id.to_string();
    }
    stem
}

/// One audio file awaiting or undergoing processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub request_id: String,
    pub size: u64,
    pub discovered_at: SystemTime,
}

impl Artifact {
    pub fn new(path: PathBuf) -> Self {
        Self {
            request_id: request_id_for(&path),
            path,
            size: 0,
            discovered_at: SystemTime::now(),
        }
    }

    /// Builds an artifact from a file on disk, recording its current size.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let size = fs::metadata(path)?.len();
        Ok(Self {
            size,
            ..Self::new(path.to_path_buf())
        })
    }
}

/// Per-job tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory for synthesized segments.
    pub output_dir: PathBuf,
    pub stt_chunk: Duration,
    pub translate_chunk_chars: usize,
    pub tts_chunk_chars: usize,
    pub stt_concurrency: usize,
    pub translate_concurrency: usize,
    pub tts_concurrency: usize,
    /// Whole-job deadline. `None` waits on providers indefinitely.
    pub job_timeout: Option<Duration>,
    /// Used in `<stem>_<label>.txt` file names and headers.
    pub source_label: String,
    pub target_label: String,
    pub translate: TranslateOptions,
    pub voice: VoiceOptions,
    /// Schedule the source artifact for deletion after each job.
    pub delete_source: bool,
    pub dequeue_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            stt_chunk: defaults::STT_CHUNK,
            translate_chunk_chars: defaults::TRANSLATE_CHUNK_CHARS,
            tts_chunk_chars: defaults::TTS_CHUNK_CHARS,
            stt_concurrency: defaults::SEQUENTIAL,
            translate_concurrency: defaults::SEQUENTIAL,
            tts_concurrency: defaults::TTS_CONCURRENCY,
            job_timeout: None,
            source_label: defaults::SOURCE_LABEL.to_string(),
            target_label: defaults::TARGET_LABEL.to_string(),
            translate: TranslateOptions::default(),
            voice: VoiceOptions::default(),
            delete_source: true,
            dequeue_timeout: defaults::DEQUEUE_TIMEOUT,
        }
    }
}

/// Queue consumer running the full transform pipeline.
pub struct PipelineWorker {
    transcriber: Arc<TranscribeStage>,
    generator: Arc<GenerateStage>,
    translator: Arc<TranslateStage>,
    synthesizer: Arc<SynthesizeStage>,
    config: WorkerConfig,
    status: Arc<StatusStore>,
    registry: Arc<ArtifactRegistry>,
    cleanup: Option<CleanupScheduler>,
    cancel: CancelFlag,
}

impl PipelineWorker {
    pub fn new(
        providers: &Providers,
        config: WorkerConfig,
        status: Arc<StatusStore>,
        registry: Arc<ArtifactRegistry>,
    ) -> Self {
        Self {
            transcriber: Arc::new(TranscribeStage::new(Arc::clone(&providers.stt))),
            generator: Arc::new(GenerateStage::new(Arc::clone(&providers.generator))),
            translator: Arc::new(TranslateStage::new(
                Arc::clone(&providers.translator),
                config.translate.clone(),
            )),
            synthesizer: Arc::new(SynthesizeStage::new(
                Arc::clone(&providers.synthesizer),
                config.voice.clone(),
            )),
            config,
            status,
            registry,
            cleanup: None,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupScheduler) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Abandons in-flight dispatches once `cancel` is raised.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drains `queue` until `running` is cleared. Artifacts another worker
    /// already claimed are skipped.
    pub fn run(&self, queue: &WorkQueue, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            let Some(artifact) = queue.dequeue_timeout(self.config.dequeue_timeout) else {
                continue;
            };
            if !self.registry.claim(&artifact.path) {
                log::debug!("skipping {}: already claimed", artifact.path.display());
                continue;
            }
            self.process(&artifact);
            self.status.evict_expired();
        }
        log::debug!("worker exiting");
    }

    /// Runs one job to its terminal state and records it.
    ///
    /// Never fails: every error, including a panic, becomes an `error`
    /// status.
    pub fn process(&self, artifact: &Artifact) -> RequestState {
        let id = artifact.request_id.as_str();
        self.status.ensure_processing(id, MESSAGE_PROCESSING);
        log::info!("[{id}] processing {}", artifact.path.display());
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(artifact)))
            .unwrap_or_else(|payload| {
                Err(VoxbridgeError::Other(format!(
                    "worker panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });

        let state = match outcome {
            Ok(result) => {
                log::info!(
                    "[{id}] completed in {:.2?} with {} audio segment(s)",
                    started.elapsed(),
                    result.audio_files.len()
                );
                self.status.complete(id, result);
                RequestState::Completed
            }
            Err(e) => {
                log::warn!("[{id}] failed: {e}");
                self.status.fail(id, failure_message(&e));
                RequestState::Error
            }
        };

        self.registry.mark_processed(&artifact.path);
        if let Some(cleanup) = self.cleanup.as_ref().filter(|_| self.config.delete_source) {
            cleanup.schedule(&artifact.path);
        }
        state
    }

    /// The pipeline proper: transcribe, generate, translate, synthesize,
    /// then persist.
    pub fn execute(&self, artifact: &Artifact) -> Result<PipelineResult> {
        let parent: Arc<str> = Arc::from(artifact.request_id.as_str());
        let deadline = self
            .config
            .job_timeout
            .map_or_else(Deadline::none, Deadline::after);

        let transcript = self.speech_to_text(&artifact.path, &parent, deadline)?;
        if transcript.trim().is_empty() {
            return Err(VoxbridgeError::EmptyTranscript);
        }
        log::debug!("[{parent}] transcript: {transcript}");

        let response = self.generate_response(&transcript, &parent, deadline)?;
        let translation = self.translate_response(&response, &parent, deadline)?;
        if translation.trim().is_empty() {
            return Err(VoxbridgeError::EmptyTranslation);
        }

        let audio_files = self.synthesize_speech(&translation, &parent, deadline)?;
        self.write_transcripts(&artifact.path, &transcript, &translation)?;

        Ok(PipelineResult {
            transcript,
            response,
            translation,
            audio_files,
        })
    }

    fn dispatcher(&self, concurrency: usize) -> OrderedDispatcher {
        OrderedDispatcher::new(concurrency).with_cancel(self.cancel.clone())
    }

    fn speech_to_text(&self, path: &Path, parent: &Arc<str>, deadline: Deadline) -> Result<String> {
        let clip = AudioClip::from_wav_file(path)?;
        let segments = chunk_audio(&clip, self.config.stt_chunk);
        log::debug!(
            "[{parent}] {:.1?} of audio in {} segment(s)",
            clip.duration(),
            segments.len()
        );

        let texts = run_stage(
            &self.transcriber,
            Chunk::sequence(parent, segments),
            &self.dispatcher(self.config.stt_concurrency),
            deadline,
        )
        .map_err(|e| interrupted(e, parent, StageKind::Transcribe))?;
        Ok(join_non_empty(texts))
    }

    fn generate_response(
        &self,
        transcript: &str,
        parent: &Arc<str>,
        deadline: Deadline,
    ) -> Result<String> {
        let whole = vec![Chunk::new(0, transcript.to_string(), Arc::clone(parent))];
        let mut outputs = run_stage(&self.generator, whole, &self.dispatcher(1), deadline)
            .map_err(|e| interrupted(e, parent, StageKind::Generate))?;
        Ok(outputs.pop().map(|(_, text)| text).unwrap_or_default())
    }

    fn translate_response(
        &self,
        response: &str,
        parent: &Arc<str>,
        deadline: Deadline,
    ) -> Result<String> {
        let pieces = chunk_text(response, self.config.translate_chunk_chars);
        let translated = run_stage(
            &self.translator,
            Chunk::sequence(parent, pieces),
            &self.dispatcher(self.config.translate_concurrency),
            deadline,
        )
        .map_err(|e| interrupted(e, parent, StageKind::Translate))?;
        Ok(join_non_empty(translated))
    }

    fn synthesize_speech(
        &self,
        translation: &str,
        parent: &Arc<str>,
        deadline: Deadline,
    ) -> Result<Vec<PathBuf>> {
        let pieces = chunk_sentences(translation, self.config.tts_chunk_chars);
        let requested = pieces.len();
        let segments = run_stage(
            &self.synthesizer,
            Chunk::sequence(parent, pieces),
            &self.dispatcher(self.config.tts_concurrency),
            deadline,
        )
        .map_err(|e| interrupted(e, parent, StageKind::Synthesize))?;

        if segments.len() < requested {
            log::warn!(
                "[{parent}] {} of {requested} speech segment(s) dropped",
                requested - segments.len()
            );
        }

        fs::create_dir_all(&self.config.output_dir)?;
        let mut files = Vec::with_capacity(segments.len());
        for (index, audio) in segments {
            let path = self.config.output_dir.join(segment_file_name(parent, index));
            fs::write(&path, audio)?;
            files.push(path);
        }
        Ok(files)
    }

    fn write_transcripts(&self, source: &Path, transcript: &str, translation: &str) -> Result<()> {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let outputs = [
            (&self.config.source_label, "Transcript", transcript),
            (&self.config.target_label, "Translation", translation),
        ];
        for (label, kind, text) in outputs {
            let path = source.with_file_name(format!("{stem}_{label}.txt"));
            fs::write(&path, format!("{} {kind}:\n{text}\n", capitalize(label)))?;
        }
        Ok(())
    }
}

/// `tts_<request_id>_<NNN>.wav`, NNN being the 1-based chunk ordinal.
pub fn segment_file_name(request_id: &str, index: usize) -> String {
    format!("tts_{request_id}_{:03}.wav", index + 1)
}

fn join_non_empty(pieces: Vec<(usize, String)>) -> String {
    pieces
        .iter()
        .map(|(_, text)| text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn interrupted(error: DispatchError, request_id: &str, stage: StageKind) -> VoxbridgeError {
    match error {
        DispatchError::DeadlineExceeded => VoxbridgeError::DeadlineExceeded {
            request_id: request_id.to_string(),
            stage: stage.to_string(),
        },
        DispatchError::Cancelled => VoxbridgeError::Cancelled {
            request_id: request_id.to_string(),
            stage: stage.to_string(),
        },
    }
}

fn failure_message(error: &VoxbridgeError) -> String {
    match error {
        VoxbridgeError::EmptyTranscript | VoxbridgeError::EmptyTranslation => error.to_string(),
        _ => format!("Error processing audio: {error}"),
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ArtifactState;
    use crate::stage::mock::{MockGenerator, MockSpeechToText, MockSynthesizer, MockTranslator};
    use std::thread;

    const RATE: u32 = 8000;

    fn write_wav(dir: &Path, name: &str, seconds: u32) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..RATE * seconds {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    struct Mocks {
        stt: Arc<MockSpeechToText>,
        generator: Arc<MockGenerator>,
        translator: Arc<MockTranslator>,
        synthesizer: Arc<MockSynthesizer>,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                stt: Arc::new(MockSpeechToText::new().with_response("what is wrong with my rice")),
                generator: Arc::new(MockGenerator::new().with_response("Water less. Use compost.")),
                translator: Arc::new(MockTranslator::new()),
                synthesizer: Arc::new(MockSynthesizer::new()),
            }
        }

        fn providers(&self) -> Providers {
            Providers {
                stt: self.stt.clone(),
                generator: self.generator.clone(),
                translator: self.translator.clone(),
                synthesizer: self.synthesizer.clone(),
            }
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        status: Arc<StatusStore>,
        registry: Arc<ArtifactRegistry>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                status: Arc::new(StatusStore::new()),
                registry: Arc::new(ArtifactRegistry::new()),
            }
        }

        fn config(&self) -> WorkerConfig {
            WorkerConfig {
                output_dir: self.dir.path().join("responses"),
                dequeue_timeout: Duration::from_millis(20),
                ..Default::default()
            }
        }

        fn worker(&self, mocks: &Mocks, config: WorkerConfig) -> PipelineWorker {
            PipelineWorker::new(
                &mocks.providers(),
                config,
                Arc::clone(&self.status),
                Arc::clone(&self.registry),
            )
        }
    }

    #[test]
    fn test_request_id_for() {
        assert_eq!(request_id_for(Path::new("/a/upload_1234-abcd.wav")), "1234-abcd");
        assert_eq!(request_id_for(Path::new("/a/recording_7.wav")), "recording_7");
        assert_eq!(request_id_for(Path::new("plain")), "plain");
    }

    #[test]
    fn test_segment_file_name_is_one_based_and_padded() {
        assert_eq!(segment_file_name("abc", 0), "tts_abc_001.wav");
        assert_eq!(segment_file_name("abc", 11), "tts_abc_012.wav");
    }

    #[test]
    fn test_completed_job_records_all_payloads() {
        let harness = Harness::new();
        let mocks = Mocks {
            stt: Arc::new(MockSpeechToText::new().with_responses(&["one", "  ", "three"])),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "upload_req1.wav", 70);
        let worker = harness.worker(&mocks, harness.config());

        let state = worker.process(&Artifact::from_path(&source).unwrap());

        assert_eq!(state, RequestState::Completed);
        assert_eq!(mocks.stt.calls(), 3);
        assert_eq!(mocks.generator.prompts(), vec!["one three"]);

        let status = harness.status.get("req1").unwrap();
        let result = status.result.unwrap();
        assert_eq!(result.transcript, "one three");
        assert_eq!(result.response, "Water less. Use compost.");
        assert_eq!(result.translation, "[bn-IN] Water less. Use compost.");
        assert_eq!(
            result.audio_files,
            vec![harness.dir.path().join("responses").join("tts_req1_001.wav")]
        );
        assert_eq!(
            fs::read(&result.audio_files[0]).unwrap(),
            b"[bn-IN] Water less. Use compost."
        );

        let english = fs::read_to_string(harness.dir.path().join("upload_req1_english.txt")).unwrap();
        assert_eq!(english, "English Transcript:\none three\n");
        let bengali = fs::read_to_string(harness.dir.path().join("upload_req1_bengali.txt")).unwrap();
        assert_eq!(
            bengali,
            "Bengali Translation:\n[bn-IN] Water less. Use compost.\n"
        );
        assert!(harness.registry.is_processed(&source));
    }

    #[test]
    fn test_empty_transcript_stops_before_generation() {
        let harness = Harness::new();
        let mocks = Mocks {
            stt: Arc::new(MockSpeechToText::new().with_response("   ")),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "silence.wav", 40);
        let worker = harness.worker(&mocks, harness.config());

        let state = worker.process(&Artifact::from_path(&source).unwrap());

        assert_eq!(state, RequestState::Error);
        let status = harness.status.get("silence").unwrap();
        assert_eq!(status.message, "No speech detected or transcription failed");
        assert!(status.result.is_none());
        assert!(mocks.generator.prompts().is_empty());
        assert!(mocks.translator.inputs().is_empty());
        assert!(mocks.synthesizer.inputs().is_empty());
        assert!(harness.registry.is_processed(&source));
    }

    #[test]
    fn test_failed_transcription_chunks_are_dropped() {
        let harness = Harness::new();
        let mocks = Mocks {
            stt: Arc::new(
                MockSpeechToText::new()
                    .with_responses(&["first", "second"])
                    .with_failure_on(0),
            ),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "partial.wav", 45);
        let worker = harness.worker(&mocks, harness.config());

        worker.process(&Artifact::from_path(&source).unwrap());

        let result = harness.status.get("partial").unwrap().result.unwrap();
        assert_eq!(result.transcript, "second");
    }

    #[test]
    fn test_failed_translation_chunk_keeps_original_text() {
        let harness = Harness::new();
        let mocks = Mocks {
            generator: Arc::new(MockGenerator::new().with_response("alpha beta gamma delta")),
            translator: Arc::new(MockTranslator::new().failing_on("gamma")),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "t.wav", 1);
        let config = WorkerConfig {
            translate_chunk_chars: 10,
            ..harness.config()
        };
        let worker = harness.worker(&mocks, config);

        worker.process(&Artifact::from_path(&source).unwrap());

        assert_eq!(
            mocks.translator.inputs(),
            vec!["alpha beta", "gamma", "delta"]
        );
        let result = harness.status.get("t").unwrap().result.unwrap();
        assert_eq!(result.translation, "[bn-IN] alpha beta gamma [bn-IN] delta");
    }

    #[test]
    fn test_generation_failure_is_spoken_inline() {
        let harness = Harness::new();
        let mocks = Mocks {
            generator: Arc::new(MockGenerator::new().with_failure()),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "g.wav", 1);
        let worker = harness.worker(&mocks, harness.config());

        assert_eq!(
            worker.process(&Artifact::from_path(&source).unwrap()),
            RequestState::Completed
        );
        let result = harness.status.get("g").unwrap().result.unwrap();
        assert!(result.response.starts_with("Error generating response:"));
        assert!(!result.audio_files.is_empty());
    }

    #[test]
    fn test_empty_translation_is_an_error() {
        let harness = Harness::new();
        let mocks = Mocks {
            translator: Arc::new(MockTranslator::new().with_empty_output()),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "e.wav", 1);
        let worker = harness.worker(&mocks, harness.config());

        assert_eq!(
            worker.process(&Artifact::from_path(&source).unwrap()),
            RequestState::Error
        );
        assert_eq!(
            harness.status.get("e").unwrap().message,
            "Translation produced no text"
        );
        assert!(mocks.synthesizer.inputs().is_empty());
    }

    #[test]
    fn test_failed_speech_segment_leaves_numbering_gap() {
        let harness = Harness::new();
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let mocks = Mocks {
            generator: Arc::new(MockGenerator::new().with_response(text)),
            synthesizer: Arc::new(MockSynthesizer::new().failing_on("Second")),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "s.wav", 1);
        let config = WorkerConfig {
            tts_chunk_chars: 30,
            ..harness.config()
        };
        let worker = harness.worker(&mocks, config);

        worker.process(&Artifact::from_path(&source).unwrap());

        let result = harness.status.get("s").unwrap().result.unwrap();
        let requested = chunk_sentences(&result.translation, 30);
        assert_eq!(requested.len(), 3);
        let names: Vec<String> = result
            .audio_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["tts_s_001.wav", "tts_s_003.wav"]);
    }

    #[test]
    fn test_tts_runs_with_bounded_concurrency() {
        let harness = Harness::new();
        let text = "One one one. Two two two. Three three. Four four. Five five. Six six.";
        let mocks = Mocks {
            generator: Arc::new(MockGenerator::new().with_response(text)),
            synthesizer: Arc::new(MockSynthesizer::new().with_delay_on(" ", Duration::from_millis(30))),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "c.wav", 1);
        let config = WorkerConfig {
            tts_chunk_chars: 14,
            tts_concurrency: 3,
            ..harness.config()
        };
        let worker = harness.worker(&mocks, config);

        worker.process(&Artifact::from_path(&source).unwrap());

        assert!(mocks.synthesizer.inputs().len() > 3);
        assert!(mocks.synthesizer.peak_in_flight() <= 3);
    }

    #[test]
    fn test_undecodable_artifact_is_an_error() {
        let harness = Harness::new();
        let mocks = Mocks::new();
        let source = harness.dir.path().join("garbage.wav");
        fs::write(&source, b"definitely not a wav file").unwrap();
        let worker = harness.worker(&mocks, harness.config());

        assert_eq!(
            worker.process(&Artifact::from_path(&source).unwrap()),
            RequestState::Error
        );
        let status = harness.status.get("garbage").unwrap();
        assert!(status.message.starts_with("Error processing audio:"));
        assert_eq!(mocks.stt.calls(), 0);
        assert!(harness.registry.is_processed(&source));
    }

    #[test]
    fn test_deadline_fails_job() {
        let harness = Harness::new();
        let mocks = Mocks {
            synthesizer: Arc::new(
                MockSynthesizer::new().with_delay_on("", Duration::from_millis(500)),
            ),
            ..Mocks::new()
        };
        let source = write_wav(harness.dir.path(), "slow.wav", 1);
        let config = WorkerConfig {
            job_timeout: Some(Duration::from_millis(100)),
            ..harness.config()
        };
        let worker = harness.worker(&mocks, config);

        let start = Instant::now();
        assert_eq!(
            worker.process(&Artifact::from_path(&source).unwrap()),
            RequestState::Error
        );
        assert!(start.elapsed() < Duration::from_millis(450));
        let status = harness.status.get("slow").unwrap();
        assert!(status.message.contains("deadline"), "{}", status.message);
    }

    #[test]
    fn test_source_deleted_after_grace() {
        let harness = Harness::new();
        let mocks = Mocks::new();
        let source = write_wav(harness.dir.path(), "gone.wav", 1);
        let (cleanup, handle) = CleanupScheduler::spawn(Duration::from_millis(10));
        let worker = harness.worker(&mocks, harness.config()).with_cleanup(cleanup);

        worker.process(&Artifact::from_path(&source).unwrap());
        drop(worker);
        handle.join().unwrap();

        assert!(!source.exists());
        assert!(harness.dir.path().join("gone_english.txt").exists());
    }

    #[test]
    fn test_run_processes_duplicate_once() {
        let harness = Harness::new();
        let mocks = Mocks::new();
        let source = write_wav(harness.dir.path(), "dup.wav", 1);
        let queue = WorkQueue::bounded(4);
        let artifact = Artifact::from_path(&source).unwrap();
        harness.registry.begin_settling(&source);
        harness.registry.mark_queued(&source);
        queue.try_enqueue(artifact.clone()).unwrap();
        queue.try_enqueue(artifact).unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let worker = harness.worker(&mocks, harness.config());
        let loop_running = Arc::clone(&running);
        let status = Arc::clone(&harness.status);
        let handle = thread::spawn(move || worker.run(&queue, &loop_running));

        let start = Instant::now();
        while status
            .get("dup")
            .is_none_or(|s| s.status == RequestState::Processing)
        {
            assert!(start.elapsed() < Duration::from_secs(5), "job never finished");
            thread::sleep(Duration::from_millis(10));
        }
        thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(mocks.stt.calls(), 1);
        assert_eq!(
            harness.registry.state(&source),
            Some(ArtifactState::Processed)
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("english"), "English");
        assert_eq!(capitalize(""), "");
    }
}
