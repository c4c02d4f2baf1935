//! Inputs and outputs of the speaker attribution pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A time range the diarizer attributed to one anonymous speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiarizedInterval {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Diarizer-local id (e.g. "SPEAKER_00"), not a real name
    pub speaker_id: String,
}

impl DiarizedInterval {
    pub fn new(start: f64, end: f64, speaker_id: &str) -> Self {
        Self {
            start,
            end,
            speaker_id: speaker_id.to_string(),
        }
    }

    /// Inclusive at both ends.
    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// A transcribed span of speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: &str) -> Self {
        Self {
            start,
            end,
            text: text.to_string(),
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// Result of comparing a speaker's audio against a stored voice fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityMatch {
    /// Diarized speaker whose audio matched
    pub speaker_id: String,
    /// Name of the enrolled person that matched
    pub name: String,
    /// Similarity in [0, 1]
    pub confidence: f32,
}

/// Conversational role assigned to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpeakerRole {
    Clinician,
    Patient,
    Unknown,
}

impl SpeakerRole {
    pub fn label(&self) -> &'static str {
        match self {
            SpeakerRole::Clinician => "Clinician",
            SpeakerRole::Patient => "Patient",
            SpeakerRole::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SpeakerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which branch of the decision pipeline produced the labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    /// No diarization: every segment classified on its own phrases.
    PerSegmentPhrases,
    /// One diarized speaker: whole-session phrase counts.
    SingleSpeaker,
    /// A verified voice match named the clinician.
    VerifiedIdentity,
    /// Lexical scoring with sufficient confidence.
    LexicalConfidence,
    /// Highest raw clinician score, no confidence floor.
    ClinicianScoreFallback,
}

/// Scores computed for one diarized speaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerScore {
    pub speaker_id: String,
    pub clinician_score: f32,
    pub patient_score: f32,
    pub confidence: f32,
}

/// One output line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSegment {
    pub start: f64,
    pub end: f64,
    /// Diarized speaker the segment was assigned to, if any
    pub speaker_id: Option<String>,
    pub role: SpeakerRole,
    pub text: String,
}

/// The attribution result: one labeled segment per input segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTranscript {
    pub segments: Vec<LabeledSegment>,
    pub method: AttributionMethod,
    /// Diarized speaker resolved as the clinician, if diarization was present
    pub clinician_speaker: Option<String>,
    /// Set when a verified identity match named the clinician
    pub clinician_name: Option<String>,
    /// Per-speaker scores, empty unless lexical scoring ran
    pub scores: Vec<SpeakerScore>,
}

impl LabeledTranscript {
    /// Renders each segment as `"<Label>: <text>"`.
    pub fn lines(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|s| format!("{}: {}", s.role, s.text.trim()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for LabeledTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
