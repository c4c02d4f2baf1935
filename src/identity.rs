//! Enrolled voice fingerprints for verified-identity matching.
//!
//! Embedding extraction is an external model ([`SpeakerEmbedder`]); this
//! module stores the resulting vectors per person and compares new clips by
//! cosine similarity.

use crate::diarize::{IdentityMatcher, VoiceMatch};
use crate::error::{Result, ScribeError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Turns an audio clip (16 kHz mono) into a fixed-length voice embedding.
pub trait SpeakerEmbedder: Send + Sync {
    fn embed(&self, clip: &[i16]) -> Result<Vec<f32>>;
}

/// One enrolled person.
#[derive(Debug, Clone, Serialize)]
pub struct Voiceprint {
    pub name: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    /// Number of clips averaged into `embedding`
    pub sample_count: u32,
    pub enrolled_at: DateTime<Utc>,
}

/// In-memory registry of enrolled voices.
pub struct VoiceprintRegistry {
    embedder: Arc<dyn SpeakerEmbedder>,
    prints: RwLock<BTreeMap<String, Voiceprint>>,
}

impl VoiceprintRegistry {
    pub fn new(embedder: Arc<dyn SpeakerEmbedder>) -> Self {
        Self {
            embedder,
            prints: RwLock::new(BTreeMap::new()),
        }
    }

    /// Enrolls `clip` under `name`. Repeated enrollment averages the
    /// embeddings, weighting the stored one by how many clips it holds.
    pub fn enroll(&self, name: &str, clip: &[i16]) -> Result<()> {
        if clip.is_empty() {
            return Err(ScribeError::IdentityMatch {
                message: format!("cannot enroll {name} from an empty clip"),
            });
        }
        let embedding = self.embedder.embed(clip)?;

        let mut prints = self.prints.write().unwrap_or_else(|e| e.into_inner());
        match prints.get_mut(name) {
            Some(print) => {
                if print.embedding.len() != embedding.len() {
                    return Err(dimension_mismatch(print.embedding.len(), embedding.len()));
                }
                let n = print.sample_count as f32;
                for (stored, new) in print.embedding.iter_mut().zip(&embedding) {
                    *stored = (*stored * n + new) / (n + 1.0);
                }
                print.sample_count += 1;
            }
            None => {
                prints.insert(
                    name.to_string(),
                    Voiceprint {
                        name: name.to_string(),
                        embedding,
                        sample_count: 1,
                        enrolled_at: Utc::now(),
                    },
                );
            }
        }
        log::info!("Enrolled voiceprint for {}", name);
        Ok(())
    }

    pub fn remove(&self, name: &str) -> bool {
        self.prints
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some()
    }

    pub fn voiceprints(&self) -> Vec<Voiceprint> {
        self.prints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

impl IdentityMatcher for VoiceprintRegistry {
    /// Compares against `candidates`, or every enrolled voice if empty.
    fn identify(&self, clip: &[i16], candidates: &[String]) -> Result<Option<VoiceMatch>> {
        if clip.is_empty() {
            return Ok(None);
        }
        let embedding = self.embedder.embed(clip)?;

        let prints = self.prints.read().unwrap_or_else(|e| e.into_inner());
        let mut best: Option<VoiceMatch> = None;
        for print in prints.values() {
            if !candidates.is_empty() && !candidates.iter().any(|c| c == &print.name) {
                continue;
            }
            if print.embedding.len() != embedding.len() {
                return Err(dimension_mismatch(print.embedding.len(), embedding.len()));
            }
            let similarity = cosine_similarity(&print.embedding, &embedding).max(0.0);
            if similarity > 0.0 && best.as_ref().is_none_or(|b| similarity > b.confidence) {
                best = Some(VoiceMatch {
                    name: print.name.clone(),
                    confidence: similarity,
                });
            }
        }
        Ok(best)
    }
}

fn dimension_mismatch(stored: usize, got: usize) -> ScribeError {
    ScribeError::IdentityMatch {
        message: format!("embedding dimension mismatch: enrolled {stored}, got {got}"),
    }
}

/// Cosine similarity in [-1, 1]; zero vectors compare as 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}
