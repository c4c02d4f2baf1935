//! clinscribe - transcription core for recorded clinical consultations
//!
//! Queues consultation audio as jobs, runs speech recognition on a bounded
//! pool of pre-loaded engines, and labels every transcript segment as
//! clinician or patient.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod attribution;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod diarize;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod pool;
pub mod scheduler;
pub mod stt;

// Core seams (recognition, diarization, identity)
pub use diarize::{Diarizer, IdentityMatcher, StaticDiarizer, VoiceMatch};
pub use identity::{SpeakerEmbedder, VoiceprintRegistry};
pub use stt::{RecognitionEngine, TranscribeOptions, Transcript};

// Job scheduling and engine pooling
pub use pool::{EngineLease, EnginePool};
pub use scheduler::{JobContext, JobId, JobScheduler, JobSnapshot, JobStatus, SchedulerConfig};

// Attribution
pub use attribution::{
    AttributionEngine, AttributionMethod, DiarizedInterval, IdentityMatch, LabeledTranscript,
    SpeakerRole, TranscriptSegment,
};

// Pipeline
pub use pipeline::{ConsultationPipeline, ConsultationRequest, submit_consultation};

// Error handling
pub use error::{Result, ScribeError};

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
