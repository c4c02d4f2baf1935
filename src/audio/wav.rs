//! WAV decoding into [`AudioBuffer`].

use crate::audio::AudioBuffer;
use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, ScribeError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Decodes a WAV stream of any sample rate and channel count into 16 kHz mono.
pub fn decode_wav<R: Read>(reader: R) -> Result<AudioBuffer> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| ScribeError::AudioDecode {
        message: format!("Failed to parse WAV file: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.channels == 0 {
        return Err(ScribeError::AudioDecode {
            message: "WAV header declares zero channels".to_string(),
        });
    }

    let raw_samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int if spec.bits_per_sample == 16 => wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>(),
        hound::SampleFormat::Int => {
            let shift = spec.bits_per_sample.saturating_sub(16);
            wav_reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v >> shift) as i16))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v * 32767.0).clamp(-32768.0, 32767.0) as i16))
            .collect::<std::result::Result<Vec<_>, _>>(),
    }
    .map_err(|e| ScribeError::AudioDecode {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    let mono_samples = downmix(&raw_samples, spec.channels);

    let samples = if spec.sample_rate != SAMPLE_RATE {
        resample(&mono_samples, spec.sample_rate, SAMPLE_RATE)
    } else {
        mono_samples
    };

    Ok(AudioBuffer::from_samples(samples))
}

/// Opens and decodes a WAV file.
pub fn load_wav(path: &Path) -> Result<AudioBuffer> {
    let file = File::open(path)?;
    decode_wav(BufReader::new(file))
}

/// Averages interleaved channels into one.
fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = (source_pos.floor() as usize).min(last);
            let fraction = source_pos - source_idx as f64;

            if source_idx >= last {
                samples[last]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}
