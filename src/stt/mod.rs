//! Speech recognition engines.

pub mod engine;
pub mod whisper;

pub use engine::{MockEngine, RecognitionEngine, TranscribeOptions, Transcript};
pub use whisper::{WhisperConfig, WhisperEngine};
