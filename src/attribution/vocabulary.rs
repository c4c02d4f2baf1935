//! Phrase vocabularies and scoring weights for speaker attribution.
//!
//! Both are plain data so deployments can swap word lists (another language,
//! another specialty) without touching the algorithm. Matching is done on
//! normalized word tokens, so "X-ray" in a transcript matches "x ray" in a list
//! and "pain" never matches inside "painting".

use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Word lists that feed the attribution heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseVocabulary {
    /// Directive or examination language (per-segment and single-speaker paths)
    pub clinician_phrases: Vec<String>,
    /// First-person symptom or concern language (per-segment and single-speaker paths)
    pub patient_phrases: Vec<String>,
    /// Clinical vocabulary, counted per word
    pub medical_terms: Vec<String>,
    /// Specialist anatomy/procedure vocabulary, counted per word
    pub technical_terms: Vec<String>,
    /// Instructions and recommendations, counted per segment
    pub directive_phrases: Vec<String>,
    /// Imperative commands, counted per segment
    pub command_phrases: Vec<String>,
    /// Expressions of worry or discomfort, counted per segment
    pub concern_phrases: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for PhraseVocabulary {
    fn default() -> Self {
        Self {
            clinician_phrases: owned(&[
                "let me",
                "let's",
                "i'm going to",
                "i'd like to",
                "i recommend",
                "i'll prescribe",
                "i'm prescribing",
                "we'll start",
                "we need to",
                "you should",
                "take a deep breath",
                "breathe in",
                "lie down",
                "open your mouth",
                "can you describe",
                "how long have you",
                "on a scale of",
                "any allergies",
                "are you taking",
                "your results",
                "your blood pressure",
                "follow up",
                "examine",
                "i'd like you to",
            ]),
            patient_phrases: owned(&[
                "i feel",
                "i've been",
                "i have",
                "i had",
                "it hurts",
                "hurts when",
                "my pain",
                "i'm worried",
                "i am worried",
                "i'm scared",
                "i can't",
                "i don't know",
                "it started",
                "my chest",
                "my head",
                "my stomach",
                "my back",
                "it's been",
                "i noticed",
                "keeps me up",
                "i think i",
            ]),
            medical_terms: owned(&[
                "diagnosis",
                "prescription",
                "prescribe",
                "medication",
                "dosage",
                "dose",
                "symptoms",
                "hypertension",
                "diabetes",
                "infection",
                "inflammation",
                "antibiotic",
                "antibiotics",
                "ibuprofen",
                "cholesterol",
                "milligrams",
                "mg",
                "chronic",
                "acute",
                "prognosis",
                "referral",
                "blood pressure",
                "x ray",
                "mri",
                "lab work",
                "blood test",
                "side effects",
            ]),
            technical_terms: owned(&[
                "cardiovascular",
                "pulmonary",
                "gastrointestinal",
                "neurological",
                "systolic",
                "diastolic",
                "auscultation",
                "palpation",
                "differential",
                "bilateral",
                "benign",
                "etiology",
                "contraindicated",
                "biopsy",
                "echocardiogram",
                "electrocardiogram",
                "ecg",
                "ekg",
                "cbc",
                "a1c",
                "metabolic panel",
            ]),
            directive_phrases: owned(&[
                "i recommend",
                "you should",
                "you need to",
                "i'd like you to",
                "i want you to",
                "make sure",
                "i'm going to",
                "we'll start",
                "let's",
                "try to",
                "it's important",
            ]),
            command_phrases: owned(&[
                "take",
                "breathe",
                "lie down",
                "sit up",
                "open your",
                "stop taking",
                "avoid",
                "come back",
                "schedule",
                "keep taking",
                "look up",
            ]),
            concern_phrases: owned(&[
                "worried",
                "scared",
                "afraid",
                "concerned",
                "nervous",
                "anxious",
                "hurts",
                "pain",
                "can't sleep",
                "is it serious",
                "should i be",
                "what if",
            ]),
        }
    }
}

impl PhraseVocabulary {
    /// Load a vocabulary from a TOML file. Lists missing from the file keep
    /// their built-in defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScribeError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ScribeError::Io(e)
            }
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Tokenize every list once for repeated matching.
    pub fn compile(&self) -> Lexicon {
        let compile = |phrases: &[String]| -> Vec<Vec<String>> {
            phrases
                .iter()
                .map(|p| tokenize(p))
                .filter(|t| !t.is_empty())
                .collect()
        };
        Lexicon {
            clinician: compile(&self.clinician_phrases),
            patient: compile(&self.patient_phrases),
            medical: compile(&self.medical_terms),
            technical: compile(&self.technical_terms),
            directive: compile(&self.directive_phrases),
            command: compile(&self.command_phrases),
            concern: compile(&self.concern_phrases),
        }
    }
}

/// Tokenized form of a [`PhraseVocabulary`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lexicon {
    pub clinician: Vec<Vec<String>>,
    pub patient: Vec<Vec<String>>,
    pub medical: Vec<Vec<String>>,
    pub technical: Vec<Vec<String>>,
    pub directive: Vec<Vec<String>>,
    pub command: Vec<Vec<String>>,
    pub concern: Vec<Vec<String>>,
}

/// Weights of the per-speaker role scores.
///
/// `clinician = medical_term·m + technical_term·t + directive_phrase·d
///  + command_phrase·c + segment_length·min(avg_words/10, 1)`;
/// `patient = patient_phrase·p + concern·k + question·q`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub medical_term: f32,
    pub technical_term: f32,
    pub directive_phrase: f32,
    pub command_phrase: f32,
    pub segment_length: f32,
    pub patient_phrase: f32,
    pub concern: f32,
    pub question: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            medical_term: 0.30,
            technical_term: 0.25,
            directive_phrase: 0.20,
            command_phrase: 0.15,
            segment_length: 0.10,
            patient_phrase: 0.40,
            concern: 0.30,
            question: 0.30,
        }
    }
}

impl ScoringWeights {
    /// Rejects negative or non-finite weights.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("medical_term", self.medical_term),
            ("technical_term", self.technical_term),
            ("directive_phrase", self.directive_phrase),
            ("command_phrase", self.command_phrase),
            ("segment_length", self.segment_length),
            ("patient_phrase", self.patient_phrase),
            ("concern", self.concern),
            ("question", self.question),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ScribeError::invalid_config(
                    &format!("attribution.weights.{name}"),
                    format!("weight must be a non-negative number, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// Lowercases and splits text into word tokens.
///
/// Apostrophes stay inside words ("i'm"); curly apostrophes are folded to
/// straight ones. Everything else that is not alphanumeric separates words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Counts occurrences of every phrase in `tokens`, phrase by phrase.
///
/// Overlapping phrases are counted independently ("i'm worried" and
/// "worried" both hit on "I'm worried").
pub fn count_phrases(tokens: &[String], phrases: &[Vec<String>]) -> usize {
    phrases
        .iter()
        .map(|phrase| {
            if phrase.len() > tokens.len() {
                return 0;
            }
            tokens
                .windows(phrase.len())
                .filter(|window| *window == phrase.as_slice())
                .count()
        })
        .sum()
}
