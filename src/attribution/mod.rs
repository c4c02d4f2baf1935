//! Speaker attribution: which diarized speaker is the clinician.
//!
//! A pure function of diarized intervals, transcript segments and an optional
//! verified identity match. No I/O, no shared state.

pub mod engine;
pub mod stats;
pub mod types;
pub mod vocabulary;

pub use engine::{AttributionEngine, AttributionSettings};
pub use stats::SpeakerStats;
pub use types::{
    AttributionMethod, DiarizedInterval, IdentityMatch, LabeledSegment, LabeledTranscript,
    SpeakerRole, SpeakerScore, TranscriptSegment,
};
pub use vocabulary::{PhraseVocabulary, ScoringWeights};
