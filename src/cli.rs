//! Command-line interface for clinscribe
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Transcribe and attribute recorded clinical consultations
#[derive(Parser, Debug)]
#[command(
    name = "clinscribe",
    version,
    about = "Transcribe recorded consultations and label clinician vs patient"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress progress and log output (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info logs, -vv: debug logs)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe a WAV recording and label each line by speaker role
    Transcribe {
        /// WAV file of the consultation
        #[arg(value_name = "WAV")]
        audio: PathBuf,

        /// Session the job belongs to
        #[arg(long, value_name = "ID")]
        session: String,

        /// Pre-computed diarization (JSON array of {start, end, speaker_id})
        #[arg(long, value_name = "FILE")]
        diarization: Option<PathBuf>,

        /// Language code override (e.g. en, de, auto)
        #[arg(long, value_name = "LANG")]
        language: Option<String>,

        /// Give up waiting for the job after this long. Examples: 90s, 5m, 1h
        #[arg(long, value_name = "DURATION", default_value = "30m", value_parser = parse_duration)]
        timeout: Duration,

        /// Print the labeled transcript as JSON
        #[arg(long)]
        json: bool,
    },

    /// Attribute pre-computed transcript segments without running recognition
    Attribute {
        /// Transcript segments (JSON array of {start, end, text})
        #[arg(long, value_name = "FILE")]
        segments: PathBuf,

        /// Pre-computed diarization (JSON array of {start, end, speaker_id})
        #[arg(long, value_name = "FILE")]
        diarization: Option<PathBuf>,

        /// Diarized speaker whose voice was verified
        #[arg(long, value_name = "ID", requires = "identity_confidence")]
        identity_speaker: Option<String>,

        /// Confidence of the verified voice match (0-1)
        #[arg(long, value_name = "F", requires = "identity_speaker", value_parser = parse_confidence)]
        identity_confidence: Option<f32>,

        /// Name of the clinician expected in the recording
        #[arg(long, value_name = "NAME")]
        clinician: Option<String>,

        /// Print the labeled transcript as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print the effective configuration (file + environment overrides)
    Show,
    /// Print the configuration file path
    Path,
}

/// Parse a duration string.
///
/// Supports bare numbers (seconds) and any format accepted by `humantime`
/// (`30s`, `5m`, `1h30m`).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Parse a confidence score in `[0, 1]`.
fn parse_confidence(s: &str) -> Result<f32, String> {
    let value: f32 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0..=1"))
    }
}
