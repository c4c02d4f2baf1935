use crate::attribution::types::TranscriptSegment;
use crate::audio::AudioBuffer;
use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Output of one recognition call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Timestamped segments in the order the engine emitted them.
    pub segments: Vec<TranscriptSegment>,
    pub full_text: String,
    /// Detected or forced language code (e.g. "en").
    pub language: String,
}

impl Transcript {
    /// Builds a transcript from segments, deriving `full_text`.
    pub fn from_segments(segments: Vec<TranscriptSegment>, language: &str) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            segments,
            full_text,
            language: language.to_string(),
        }
    }
}

/// Per-call recognition options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscribeOptions {
    /// Overrides the engine's configured language.
    pub language: Option<String>,
    /// Context prompt (e.g. specialty vocabulary) for engines that support it.
    pub initial_prompt: Option<String>,
}

/// Trait for speech recognition engines.
///
/// Implementations are expensive to construct (model loading) and cheap to
/// call repeatedly, which is why the engine pool keeps them alive.
pub trait RecognitionEngine: Send + Sync {
    /// Transcribe 16 kHz mono audio into timestamped segments.
    fn transcribe(&self, audio: &AudioBuffer, options: &TranscribeOptions) -> Result<Transcript>;

    /// Get the name of the loaded model
    fn model_name(&self) -> &str;
}

impl<T: RecognitionEngine + ?Sized> RecognitionEngine for Arc<T> {
    fn transcribe(&self, audio: &AudioBuffer, options: &TranscribeOptions) -> Result<Transcript> {
        (**self).transcribe(audio, options)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock engine for testing
#[derive(Debug, Clone)]
pub struct MockEngine {
    model_name: String,
    segments: Vec<TranscriptSegment>,
    language: String,
    delay: Duration,
    should_fail: bool,
    should_panic: bool,
    calls: Arc<AtomicUsize>,
}

impl MockEngine {
    /// Create a new mock engine returning a single segment
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            segments: vec![TranscriptSegment::new(0.0, 1.0, "mock transcription")],
            language: "en".to_string(),
            delay: Duration::ZERO,
            should_fail: false,
            should_panic: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Configure the mock to return specific segments
    pub fn with_segments(mut self, segments: Vec<TranscriptSegment>) -> Self {
        self.segments = segments;
        self
    }

    /// Configure the mock to sleep before answering (simulates inference time)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Configure the mock to fail on transcribe
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Configure the mock to panic on transcribe
    pub fn with_panic(mut self) -> Self {
        self.should_panic = true;
        self
    }

    /// Number of transcribe calls across this mock and all its clones.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RecognitionEngine for MockEngine {
    fn transcribe(&self, _audio: &AudioBuffer, options: &TranscribeOptions) -> Result<Transcript> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.should_panic {
            panic!("mock engine panic");
        }
        if self.should_fail {
            return Err(ScribeError::Transcription {
                message: "mock transcription failure".to_string(),
            });
        }
        let language = options.language.as_deref().unwrap_or(&self.language);
        Ok(Transcript::from_segments(self.segments.clone(), language))
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
