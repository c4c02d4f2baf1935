//! Clinician/patient resolution over diarized, transcribed segments.
//!
//! Decision order, first applicable branch wins:
//! 1. no diarization: each segment classified on its own phrases;
//! 2. one diarized speaker: whole-session phrase counts;
//! 3. two or more speakers: verified identity, then confident lexical
//!    scoring, then the highest raw clinician score.

use crate::attribution::stats::{SpeakerStats, confidence};
use crate::attribution::types::{
    AttributionMethod, DiarizedInterval, IdentityMatch, LabeledSegment, LabeledTranscript,
    SpeakerRole, SpeakerScore, TranscriptSegment,
};
use crate::attribution::vocabulary::{
    Lexicon, PhraseVocabulary, ScoringWeights, count_phrases, tokenize,
};
use crate::defaults;
use crate::error::{Result, ScribeError};
use std::collections::BTreeMap;

/// Thresholds and weights for the decision pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributionSettings {
    pub weights: ScoringWeights,
    /// A verified identity match must exceed this to override lexical scoring.
    pub identity_threshold: f32,
    /// Lexical resolution needs confidence above this.
    pub confidence_floor: f32,
    pub epsilon: f32,
}

impl Default for AttributionSettings {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            identity_threshold: defaults::IDENTITY_THRESHOLD,
            confidence_floor: defaults::CONFIDENCE_FLOOR,
            epsilon: defaults::CONFIDENCE_EPSILON,
        }
    }
}

impl AttributionSettings {
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        for (key, value) in [
            ("attribution.identity_threshold", self.identity_threshold),
            ("attribution.confidence_floor", self.confidence_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScribeError::invalid_config(
                    key,
                    format!("must be within [0, 1], got {value}"),
                ));
            }
        }
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ScribeError::invalid_config(
                "attribution.epsilon",
                format!("must be a small positive number, got {}", self.epsilon),
            ));
        }
        Ok(())
    }
}

/// Stateless attribution pass; one instance can serve every job.
#[derive(Debug, Clone)]
pub struct AttributionEngine {
    lexicon: Lexicon,
    settings: AttributionSettings,
}

impl Default for AttributionEngine {
    fn default() -> Self {
        Self {
            lexicon: PhraseVocabulary::default().compile(),
            settings: AttributionSettings::default(),
        }
    }
}

impl AttributionEngine {
    /// # Errors
    /// Returns `ScribeError::ConfigInvalidValue` for out-of-range settings.
    pub fn new(vocabulary: &PhraseVocabulary, settings: AttributionSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            lexicon: vocabulary.compile(),
            settings,
        })
    }

    pub fn settings(&self) -> &AttributionSettings {
        &self.settings
    }

    /// Labels every transcript segment as Clinician, Patient or Unknown.
    ///
    /// Output segments are in chronological order and there is exactly one
    /// per input segment.
    pub fn resolve_labels(
        &self,
        intervals: &[DiarizedInterval],
        segments: &[TranscriptSegment],
        identity: Option<&IdentityMatch>,
        target_name: Option<&str>,
    ) -> LabeledTranscript {
        let mut ordered: Vec<&TranscriptSegment> = segments.iter().collect();
        ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

        if intervals.is_empty() {
            log::debug!("No diarization; classifying {} segments independently", ordered.len());
            return self.label_per_segment(&ordered);
        }

        let mut sorted_intervals: Vec<&DiarizedInterval> = intervals.iter().collect();
        sorted_intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

        let assignments: Vec<Option<&str>> = ordered
            .iter()
            .map(|segment| assign_speaker(segment, &sorted_intervals))
            .collect();

        let mut stats: BTreeMap<&str, SpeakerStats> = intervals
            .iter()
            .map(|i| (i.speaker_id.as_str(), SpeakerStats::default()))
            .collect();

        if stats.len() == 1 {
            return self.label_single_speaker(&ordered, &assignments);
        }

        for (segment, speaker) in ordered.iter().zip(&assignments) {
            if let Some(entry) = speaker.and_then(|id| stats.get_mut(id)) {
                entry.add_segment(&segment.text, &self.lexicon);
            }
        }

        let scores: Vec<SpeakerScore> = stats
            .iter()
            .map(|(id, s)| {
                let clinician_score = s.clinician_score(&self.settings.weights);
                let patient_score = s.patient_score(&self.settings.weights);
                SpeakerScore {
                    speaker_id: id.to_string(),
                    clinician_score,
                    patient_score,
                    confidence: confidence(clinician_score, patient_score, self.settings.epsilon),
                }
            })
            .collect();

        let (clinician, method, clinician_name) =
            self.resolve_clinician(&scores, identity, target_name);
        log::debug!(
            "Resolved clinician {} via {:?} among {} speakers",
            clinician,
            method,
            scores.len()
        );

        let labeled = ordered
            .iter()
            .zip(&assignments)
            .map(|(segment, speaker)| {
                let role = match speaker {
                    Some(id) if *id == clinician => SpeakerRole::Clinician,
                    Some(_) => SpeakerRole::Patient,
                    None => SpeakerRole::Unknown,
                };
                labeled_segment(segment, speaker.map(str::to_string), role)
            })
            .collect();

        LabeledTranscript {
            segments: labeled,
            method,
            clinician_speaker: Some(clinician),
            clinician_name,
            scores,
        }
    }

    fn label_per_segment(&self, ordered: &[&TranscriptSegment]) -> LabeledTranscript {
        let labeled = ordered
            .iter()
            .map(|segment| {
                let tokens = tokenize(&segment.text);
                let clinician_hits = count_phrases(&tokens, &self.lexicon.clinician);
                let patient_hits = count_phrases(&tokens, &self.lexicon.patient);
                let role = if clinician_hits >= patient_hits {
                    SpeakerRole::Clinician
                } else {
                    SpeakerRole::Patient
                };
                labeled_segment(segment, None, role)
            })
            .collect();

        LabeledTranscript {
            segments: labeled,
            method: AttributionMethod::PerSegmentPhrases,
            clinician_speaker: None,
            clinician_name: None,
            scores: Vec::new(),
        }
    }

    fn label_single_speaker(
        &self,
        ordered: &[&TranscriptSegment],
        assignments: &[Option<&str>],
    ) -> LabeledTranscript {
        let speaker_text = ordered
            .iter()
            .zip(assignments)
            .filter(|(_, speaker)| speaker.is_some())
            .map(|(segment, _)| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let tokens = tokenize(&speaker_text);
        let clinician_hits = count_phrases(&tokens, &self.lexicon.clinician);
        let patient_hits = count_phrases(&tokens, &self.lexicon.patient);
        let session_role = if clinician_hits > patient_hits {
            SpeakerRole::Clinician
        } else {
            SpeakerRole::Patient
        };
        log::debug!(
            "Single diarized speaker: {} clinician vs {} patient phrases, labeled {}",
            clinician_hits,
            patient_hits,
            session_role
        );

        let mut clinician_speaker = None;
        let labeled = ordered
            .iter()
            .zip(assignments)
            .map(|(segment, speaker)| {
                let role = match speaker {
                    Some(id) => {
                        if session_role == SpeakerRole::Clinician {
                            clinician_speaker.get_or_insert_with(|| id.to_string());
                        }
                        session_role
                    }
                    None => SpeakerRole::Unknown,
                };
                labeled_segment(segment, speaker.map(str::to_string), role)
            })
            .collect();

        LabeledTranscript {
            segments: labeled,
            method: AttributionMethod::SingleSpeaker,
            clinician_speaker,
            clinician_name: None,
            scores: Vec::new(),
        }
    }

    /// Picks the clinician among scored speakers (`scores` is sorted by id
    /// and non-empty). Ties go to the lowest speaker id.
    fn resolve_clinician(
        &self,
        scores: &[SpeakerScore],
        identity: Option<&IdentityMatch>,
        target_name: Option<&str>,
    ) -> (String, AttributionMethod, Option<String>) {
        if let Some(matched) = identity {
            let name_ok = target_name.is_none_or(|t| t.eq_ignore_ascii_case(&matched.name));
            let known = scores.iter().any(|s| s.speaker_id == matched.speaker_id);
            if matched.confidence > self.settings.identity_threshold && name_ok && known {
                return (
                    matched.speaker_id.clone(),
                    AttributionMethod::VerifiedIdentity,
                    Some(matched.name.clone()),
                );
            }
            log::debug!(
                "Ignoring identity match {} -> {} (confidence {:.2})",
                matched.name,
                matched.speaker_id,
                matched.confidence
            );
        }

        let confident = scores
            .iter()
            .filter(|s| s.clinician_score > s.patient_score)
            .fold(None::<&SpeakerScore>, |best, s| match best {
                Some(b) if b.confidence >= s.confidence => Some(b),
                _ => Some(s),
            });
        if let Some(best) = confident
            && best.confidence > self.settings.confidence_floor
        {
            return (
                best.speaker_id.clone(),
                AttributionMethod::LexicalConfidence,
                None,
            );
        }

        let fallback = scores
            .iter()
            .fold(None::<&SpeakerScore>, |best, s| match best {
                Some(b) if b.clinician_score >= s.clinician_score => Some(b),
                _ => Some(s),
            })
            .map(|s| s.speaker_id.clone())
            .unwrap_or_default();
        (fallback, AttributionMethod::ClinicianScoreFallback, None)
    }
}

/// The diarized speaker whose interval contains the segment midpoint.
fn assign_speaker<'a>(
    segment: &TranscriptSegment,
    sorted_intervals: &[&'a DiarizedInterval],
) -> Option<&'a str> {
    let midpoint = segment.midpoint();
    sorted_intervals
        .iter()
        .find(|interval| interval.contains(midpoint))
        .map(|interval| interval.speaker_id.as_str())
}

fn labeled_segment(
    segment: &TranscriptSegment,
    speaker_id: Option<String>,
    role: SpeakerRole,
) -> LabeledSegment {
    LabeledSegment {
        start: segment.start,
        end: segment.end,
        speaker_id,
        role,
        text: segment.text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text)
    }

    fn span(start: f64, end: f64, speaker: &str) -> DiarizedInterval {
        DiarizedInterval::new(start, end, speaker)
    }

    fn roles(transcript: &LabeledTranscript) -> Vec<SpeakerRole> {
        transcript.segments.iter().map(|s| s.role).collect()
    }

    #[test]
    fn test_no_diarization_classifies_each_segment() {
        let engine = AttributionEngine::default();
        let segments = vec![
            seg(0.0, 2.0, "Let me take a look. Take a deep breath."),
            seg(2.0, 4.0, "I feel dizzy and it hurts when I stand."),
            seg(4.0, 5.0, "Okay."),
        ];

        let result = engine.resolve_labels(&[], &segments, None, None);

        assert_eq!(result.method, AttributionMethod::PerSegmentPhrases);
        assert_eq!(
            roles(&result),
            vec![
                SpeakerRole::Clinician,
                SpeakerRole::Patient,
                SpeakerRole::Clinician, // 0 vs 0 favours clinician
            ]
        );
        assert!(result.clinician_speaker.is_none());
    }

    #[test]
    fn test_single_speaker_majority_clinician_phrases() {
        let engine = AttributionEngine::default();
        let segments = vec![
            seg(0.0, 3.0, "Let me check that for you."),
            seg(3.0, 6.0, "Take a deep breath for me."),
            seg(6.0, 9.0, "I recommend we repeat the test."),
            seg(9.0, 12.0, "I feel like that went well."),
        ];
        let intervals = vec![span(0.0, 12.0, "SPEAKER_00")];

        let result = engine.resolve_labels(&intervals, &segments, None, None);

        assert_eq!(result.method, AttributionMethod::SingleSpeaker);
        assert!(result.segments.iter().all(|s| s.role == SpeakerRole::Clinician));
        assert_eq!(result.clinician_speaker.as_deref(), Some("SPEAKER_00"));
    }

    #[test]
    fn test_single_speaker_tie_labels_patient() {
        let engine = AttributionEngine::default();
        let segments = vec![seg(0.0, 2.0, "Let me see. I feel fine.")];
        let intervals = vec![span(0.0, 2.0, "A")];

        let result = engine.resolve_labels(&intervals, &segments, None, None);

        assert_eq!(roles(&result), vec![SpeakerRole::Patient]);
        assert!(result.clinician_speaker.is_none());
    }

    #[test]
    fn test_unmatched_segment_is_unknown() {
        let engine = AttributionEngine::default();
        let segments = vec![
            seg(0.0, 2.0, "What brings you in today?"),
            seg(10.0, 12.0, "(door closes)"),
            seg(2.0, 4.0, "My chest hurts."),
        ];
        let intervals = vec![span(0.0, 2.0, "A"), span(2.0, 4.0, "B")];

        let result = engine.resolve_labels(&intervals, &segments, None, None);

        assert_eq!(result.len(), 3);
        let last = &result.segments[2];
        assert_eq!(last.start, 10.0);
        assert_eq!(last.role, SpeakerRole::Unknown);
        assert!(last.speaker_id.is_none());
    }

    #[test]
    fn test_identity_below_threshold_is_ignored() {
        let engine = AttributionEngine::default();
        let segments = vec![
            seg(0.0, 2.0, "I recommend an MRI and blood test for the inflammation."),
            seg(2.0, 4.0, "I'm worried, it hurts. Is it serious?"),
        ];
        let intervals = vec![span(0.0, 2.0, "A"), span(2.0, 4.0, "B")];
        let weak = IdentityMatch {
            speaker_id: "B".to_string(),
            name: "Dr. Osei".to_string(),
            confidence: 0.4,
        };

        let result = engine.resolve_labels(&intervals, &segments, Some(&weak), None);

        assert_ne!(result.method, AttributionMethod::VerifiedIdentity);
        assert_eq!(result.clinician_speaker.as_deref(), Some("A"));
    }

    #[test]
    fn test_identity_with_wrong_target_name_is_ignored() {
        let engine = AttributionEngine::default();
        let segments = vec![seg(0.0, 2.0, "Hello."), seg(2.0, 4.0, "Hi.")];
        let intervals = vec![span(0.0, 2.0, "A"), span(2.0, 4.0, "B")];
        let matched = IdentityMatch {
            speaker_id: "B".to_string(),
            name: "Dr. Osei".to_string(),
            confidence: 0.9,
        };

        let result =
            engine.resolve_labels(&intervals, &segments, Some(&matched), Some("Dr. Lindqvist"));

        assert_ne!(result.method, AttributionMethod::VerifiedIdentity);
        assert!(result.clinician_name.is_none());
    }

    #[test]
    fn test_identity_for_absent_speaker_is_ignored() {
        let engine = AttributionEngine::default();
        let segments = vec![seg(0.0, 2.0, "Hello."), seg(2.0, 4.0, "Hi.")];
        let intervals = vec![span(0.0, 2.0, "A"), span(2.0, 4.0, "B")];
        let matched = IdentityMatch {
            speaker_id: "Z".to_string(),
            name: "Dr. Osei".to_string(),
            confidence: 0.9,
        };

        let result = engine.resolve_labels(&intervals, &segments, Some(&matched), None);

        assert_ne!(result.clinician_speaker.as_deref(), Some("Z"));
    }

    #[test]
    fn test_fallback_tie_goes_to_lowest_speaker_id() {
        let engine = AttributionEngine::default();
        // Identical patient-leaning text: no clinician candidate, equal raw scores.
        let segments = vec![seg(0.0, 2.0, "I feel sick?"), seg(2.0, 4.0, "I feel sick?")];
        let intervals = vec![span(2.0, 4.0, "S2"), span(0.0, 2.0, "S1")];

        let result = engine.resolve_labels(&intervals, &segments, None, None);

        assert_eq!(result.method, AttributionMethod::ClinicianScoreFallback);
        assert_eq!(result.clinician_speaker.as_deref(), Some("S1"));
        assert_eq!(
            roles(&result),
            vec![SpeakerRole::Clinician, SpeakerRole::Patient]
        );
    }

    #[test]
    fn test_three_speakers_only_one_clinician() {
        let engine = AttributionEngine::default();
        let segments = vec![
            seg(0.0, 2.0, "I'd like you to start the medication twice daily."),
            seg(2.0, 4.0, "I'm worried about the side effects?"),
            seg(4.0, 6.0, "She's been anxious, can't sleep."),
        ];
        let intervals = vec![span(0.0, 2.0, "A"), span(2.0, 4.0, "B"), span(4.0, 6.0, "C")];

        let result = engine.resolve_labels(&intervals, &segments, None, None);

        let clinicians = result
            .segments
            .iter()
            .filter(|s| s.role == SpeakerRole::Clinician)
            .count();
        assert_eq!(clinicians, 1);
        assert_eq!(result.segments[0].role, SpeakerRole::Clinician);
        assert_eq!(result.scores.len(), 3);
    }

    #[test]
    fn test_confidences_within_unit_interval() {
        let engine = AttributionEngine::default();
        let segments = vec![
            seg(0.0, 2.0, "Take ibuprofen 400 mg, avoid alcohol, come back in two weeks."),
            seg(2.0, 4.0, "I'm scared. Is it serious? What if it's cancer?"),
        ];
        let intervals = vec![span(0.0, 2.0, "A"), span(2.0, 4.0, "B")];

        let result = engine.resolve_labels(&intervals, &segments, None, None);

        for score in &result.scores {
            assert!(
                (0.0..=1.0).contains(&score.confidence),
                "{} has confidence {}",
                score.speaker_id,
                score.confidence
            );
        }
        assert_eq!(result.method, AttributionMethod::LexicalConfidence);
        assert_eq!(result.clinician_speaker.as_deref(), Some("A"));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = AttributionSettings {
            identity_threshold: 1.5,
            ..Default::default()
        };
        let result = AttributionEngine::new(&PhraseVocabulary::default(), settings);
        assert!(matches!(
            result,
            Err(ScribeError::ConfigInvalidValue { ref key, .. })
                if key == "attribution.identity_threshold"
        ));

        let settings = AttributionSettings {
            epsilon: 0.0,
            ..Default::default()
        };
        assert!(AttributionEngine::new(&PhraseVocabulary::default(), settings).is_err());
    }

    #[test]
    fn test_custom_vocabulary_drives_per_segment_path() {
        let vocabulary = PhraseVocabulary {
            clinician_phrases: vec!["abracadabra".to_string()],
            patient_phrases: vec!["hocus pocus".to_string()],
            ..Default::default()
        };
        let engine = AttributionEngine::new(&vocabulary, AttributionSettings::default()).unwrap();
        let segments = vec![
            seg(0.0, 1.0, "hocus pocus"),
            seg(1.0, 2.0, "abracadabra"),
        ];

        let result = engine.resolve_labels(&[], &segments, None, None);

        assert_eq!(
            roles(&result),
            vec![SpeakerRole::Patient, SpeakerRole::Clinician]
        );
    }
}
