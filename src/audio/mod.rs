//! Audio input for transcription jobs.
//!
//! Every engine consumes the same representation: 16-bit PCM, 16 kHz, mono.

pub mod wav;

use crate::defaults::SAMPLE_RATE;

/// Decoded consultation audio, 16 kHz mono.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioBuffer {
    samples: Vec<i16>,
}

impl AudioBuffer {
    /// Wraps samples that are already 16 kHz mono.
    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    /// Returns the samples between `start` and `end` seconds.
    ///
    /// The range is clamped to the buffer; an inverted or out-of-range
    /// request yields an empty slice.
    pub fn clip(&self, start: f64, end: f64) -> &[i16] {
        let to_index = |secs: f64| -> usize {
            if !secs.is_finite() || secs <= 0.0 {
                return 0;
            }
            ((secs * SAMPLE_RATE as f64) as usize).min(self.samples.len())
        };
        let from = to_index(start);
        let to = to_index(end);
        if from >= to {
            return &[];
        }
        &self.samples[from..to]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_second_ramp() -> AudioBuffer {
        AudioBuffer::from_samples((0..SAMPLE_RATE as i32).map(|i| (i % 1000) as i16).collect())
    }

    #[test]
    fn test_duration_secs() {
        let audio = AudioBuffer::from_samples(vec![0; 8000]);
        assert!((audio.duration_secs() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clip_middle() {
        let audio = one_second_ramp();
        let clip = audio.clip(0.25, 0.5);
        assert_eq!(clip.len(), 4000);
        assert_eq!(clip[0], audio.samples()[4000]);
    }

    #[test]
    fn test_clip_clamps_to_buffer() {
        let audio = one_second_ramp();
        assert_eq!(audio.clip(-3.0, 10.0).len(), audio.samples().len());
    }

    #[test]
    fn test_clip_inverted_range_is_empty() {
        let audio = one_second_ramp();
        assert!(audio.clip(0.8, 0.2).is_empty());
        assert!(audio.clip(f64::NAN, 0.5).len() == 8000);
    }

    #[test]
    fn test_empty_buffer() {
        let audio = AudioBuffer::default();
        assert!(audio.is_empty());
        assert!(audio.clip(0.0, 1.0).is_empty());
    }
}
