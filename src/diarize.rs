//! External diarization and voice-identity collaborators.
//!
//! Both are optional: a job without a diarizer falls back to per-segment
//! heuristics, and one without an identity matcher skips the voice override.

use crate::attribution::types::DiarizedInterval;
use crate::audio::AudioBuffer;
use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Splits audio into anonymous speaker turns.
pub trait Diarizer: Send + Sync {
    fn diarize(
        &self,
        audio: &AudioBuffer,
        min_speakers: usize,
        max_speakers: usize,
    ) -> Result<Vec<DiarizedInterval>>;
}

/// A named voice that matched an audio clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceMatch {
    pub name: String,
    /// Similarity in [0, 1]
    pub confidence: f32,
}

/// Compares an audio clip against enrolled voice fingerprints.
pub trait IdentityMatcher: Send + Sync {
    /// Best match among `candidates`, or `None` if nothing matched.
    fn identify(&self, clip: &[i16], candidates: &[String]) -> Result<Option<VoiceMatch>>;
}

/// Diarizer that replays intervals computed ahead of time (e.g. by an
/// external pyannote run exported as JSON).
#[derive(Debug, Clone, Default)]
pub struct StaticDiarizer {
    intervals: Vec<DiarizedInterval>,
}

impl StaticDiarizer {
    pub fn new(intervals: Vec<DiarizedInterval>) -> Self {
        Self { intervals }
    }

    /// Reads a JSON array of `{start, end, speaker_id}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let intervals: Vec<DiarizedInterval> = serde_json::from_str(&contents)?;
        if let Some(bad) = intervals.iter().find(|i| !(i.end >= i.start)) {
            return Err(ScribeError::Diarization {
                message: format!(
                    "interval for {} ends before it starts ({} > {})",
                    bad.speaker_id, bad.start, bad.end
                ),
            });
        }
        Ok(Self::new(intervals))
    }
}

impl Diarizer for StaticDiarizer {
    fn diarize(
        &self,
        _audio: &AudioBuffer,
        _min_speakers: usize,
        max_speakers: usize,
    ) -> Result<Vec<DiarizedInterval>> {
        let mut speakers: Vec<&str> = self
            .intervals
            .iter()
            .map(|i| i.speaker_id.as_str())
            .collect();
        speakers.sort_unstable();
        speakers.dedup();
        if max_speakers > 0 && speakers.len() > max_speakers {
            log::warn!(
                "Pre-computed diarization has {} speakers, more than the configured maximum of {}",
                speakers.len(),
                max_speakers
            );
        }
        Ok(self.intervals.clone())
    }
}

/// Diarizer that always fails; exercises the degradation path.
#[derive(Debug, Clone, Default)]
pub struct FailingDiarizer;

impl Diarizer for FailingDiarizer {
    fn diarize(&self, _audio: &AudioBuffer, _min: usize, _max: usize) -> Result<Vec<DiarizedInterval>> {
        Err(ScribeError::Diarization {
            message: "diarization model unavailable".to_string(),
        })
    }
}
