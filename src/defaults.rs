//! Default configuration constants for clinscribe.
//!
//! Shared by the config structs, the scheduler, the engine pool and the
//! attribution engine so each tunable has exactly one definition.

/// Default audio sample rate in Hz.
///
/// Recognition and diarization engines both expect 16 kHz mono input.
pub const SAMPLE_RATE: u32 = 16000;

/// Default number of scheduler worker threads.
pub const WORKER_COUNT: usize = 2;

/// Default number of pre-loaded recognition engines in the pool.
///
/// Each engine holds a full model in memory, so this stays small.
pub const POOL_SIZE: usize = 2;

/// How long a finished job record is kept before the sweeper removes it.
pub const RETENTION_SECS: u64 = 60 * 60;

/// How often the sweeper wakes up to purge expired job records.
pub const SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Poll interval while waiting for a free engine slot.
pub const ACQUIRE_POLL_MS: u64 = 100;

/// Default Whisper model path.
pub const DEFAULT_MODEL_PATH: &str = "models/ggml-base.en.bin";

/// Default language code for transcription.
///
/// Clinical vocabularies below are English; "auto" is still accepted.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// Diarization speaker bounds for a two-party consultation.
pub const MIN_SPEAKERS: usize = 2;
pub const MAX_SPEAKERS: usize = 2;

/// A verified voice match must exceed this confidence to name the clinician.
pub const IDENTITY_THRESHOLD: f32 = 0.4;

/// Lexical resolution accepts the best clinician candidate above this confidence.
pub const CONFIDENCE_FLOOR: f32 = 0.3;

/// Added to the score sum so confidence never divides by zero.
pub const CONFIDENCE_EPSILON: f32 = 0.01;

/// Average words per segment at which the segment-length signal saturates.
pub const SEGMENT_LENGTH_SATURATION: f32 = 10.0;

/// Job progress checkpoints (0-100).
pub const PROGRESS_STARTED: u8 = 10;
pub const PROGRESS_TRANSCRIBED: u8 = 50;
pub const PROGRESS_DIARIZED: u8 = 70;
pub const PROGRESS_ATTRIBUTED: u8 = 90;
pub const PROGRESS_COMPLETE: u8 = 100;

/// Report the GPU backend compiled into this build.
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HIP/ROCm"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_checkpoints_are_increasing() {
        let checkpoints = [
            PROGRESS_STARTED,
            PROGRESS_TRANSCRIBED,
            PROGRESS_DIARIZED,
            PROGRESS_ATTRIBUTED,
            PROGRESS_COMPLETE,
        ];
        assert!(
            checkpoints.windows(2).all(|w| w[0] < w[1]),
            "progress checkpoints must be strictly increasing: {checkpoints:?}"
        );
        assert_eq!(PROGRESS_COMPLETE, 100);
    }

    #[test]
    fn test_thresholds_are_probabilities() {
        for value in [IDENTITY_THRESHOLD, CONFIDENCE_FLOOR, CONFIDENCE_EPSILON] {
            assert!((0.0..=1.0).contains(&value), "{value} outside [0,1]");
        }
    }

    #[test]
    fn test_gpu_backend_cpu_without_features() {
        if !cfg!(any(
            feature = "cuda",
            feature = "vulkan",
            feature = "hipblas",
            feature = "openblas"
        )) {
            assert_eq!(gpu_backend(), "CPU");
        }
    }
}
