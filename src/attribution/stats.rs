//! Per-speaker lexical statistics and role scores.

use crate::attribution::vocabulary::{Lexicon, ScoringWeights, count_phrases, tokenize};
use crate::defaults;
use serde::Serialize;

/// Counts accumulated for one diarized speaker over one attribution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpeakerStats {
    pub word_count: usize,
    pub segment_count: usize,
    pub medical_term_hits: usize,
    pub technical_term_hits: usize,
    pub patient_phrase_hits: usize,
    /// Directive-phrase hits
    pub doctor_phrase_hits: usize,
    pub command_phrase_hits: usize,
    pub concern_phrase_hits: usize,
    pub question_count: usize,
    pub statement_count: usize,
}

impl SpeakerStats {
    /// Adds one segment's text.
    pub fn add_segment(&mut self, text: &str, lexicon: &Lexicon) {
        let tokens = tokenize(text);
        self.word_count += tokens.len();
        self.segment_count += 1;
        self.medical_term_hits += count_phrases(&tokens, &lexicon.medical);
        self.technical_term_hits += count_phrases(&tokens, &lexicon.technical);
        self.patient_phrase_hits += count_phrases(&tokens, &lexicon.patient);
        self.doctor_phrase_hits += count_phrases(&tokens, &lexicon.directive);
        self.command_phrase_hits += count_phrases(&tokens, &lexicon.command);
        self.concern_phrase_hits += count_phrases(&tokens, &lexicon.concern);
        if text.contains('?') {
            self.question_count += 1;
        } else {
            self.statement_count += 1;
        }
    }

    pub fn avg_words_per_segment(&self) -> f32 {
        ratio(self.word_count, self.segment_count)
    }

    /// Weighted clinician evidence. Term hits are normalized per word,
    /// phrase hits per segment, so talkative speakers are not favoured.
    pub fn clinician_score(&self, weights: &ScoringWeights) -> f32 {
        let length_signal =
            (self.avg_words_per_segment() / defaults::SEGMENT_LENGTH_SATURATION).min(1.0);
        weights.medical_term * capped(self.medical_term_hits, self.word_count)
            + weights.technical_term * capped(self.technical_term_hits, self.word_count)
            + weights.directive_phrase * capped(self.doctor_phrase_hits, self.segment_count)
            + weights.command_phrase * capped(self.command_phrase_hits, self.segment_count)
            + weights.segment_length * length_signal
    }

    /// Weighted patient evidence, normalized per segment.
    pub fn patient_score(&self, weights: &ScoringWeights) -> f32 {
        weights.patient_phrase * capped(self.patient_phrase_hits, self.segment_count)
            + weights.concern * capped(self.concern_phrase_hits, self.segment_count)
            + weights.question * capped(self.question_count, self.segment_count)
    }
}

/// `|c - p| / (c + p + epsilon)`, clamped to [0, 1].
pub fn confidence(clinician_score: f32, patient_score: f32, epsilon: f32) -> f32 {
    let denominator = clinician_score + patient_score + epsilon;
    if denominator <= 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    ((clinician_score - patient_score).abs() / denominator).clamp(0.0, 1.0)
}

fn ratio(hits: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        hits as f32 / total as f32
    }
}

/// Ratio capped at 1 so a single dense segment cannot dominate a weight.
fn capped(hits: usize, total: usize) -> f32 {
    ratio(hits, total).min(1.0)
}
