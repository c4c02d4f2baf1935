use crate::attribution::{AttributionEngine, AttributionSettings, PhraseVocabulary, ScoringWeights};
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::scheduler::SchedulerConfig;
use crate::stt::WhisperConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerSection,
    pub pool: PoolSection,
    pub stt: SttSection,
    pub diarization: DiarizationSection,
    pub attribution: AttributionSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub workers: usize,
    pub retention_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    pub size: usize,
    pub acquire_poll_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SttSection {
    pub model_path: PathBuf,
    pub language: String,
    /// Inference threads per engine; whisper picks when unset
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiarizationSection {
    pub min_speakers: usize,
    pub max_speakers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionSection {
    pub identity_threshold: f32,
    pub confidence_floor: f32,
    pub epsilon: f32,
    /// TOML file replacing the built-in phrase lists
    pub vocabulary_path: Option<PathBuf>,
    pub weights: ScoringWeights,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            workers: defaults::WORKER_COUNT,
            retention_secs: defaults::RETENTION_SECS,
            sweep_interval_secs: defaults::SWEEP_INTERVAL_SECS,
        }
    }
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            size: defaults::POOL_SIZE,
            acquire_poll_ms: defaults::ACQUIRE_POLL_MS,
        }
    }
}

impl Default for SttSection {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(defaults::DEFAULT_MODEL_PATH),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for DiarizationSection {
    fn default() -> Self {
        Self {
            min_speakers: defaults::MIN_SPEAKERS,
            max_speakers: defaults::MAX_SPEAKERS,
        }
    }
}

impl Default for AttributionSection {
    fn default() -> Self {
        Self {
            identity_threshold: defaults::IDENTITY_THRESHOLD,
            confidence_floor: defaults::CONFIDENCE_FLOOR,
            epsilon: defaults::CONFIDENCE_EPSILON,
            vocabulary_path: None,
            weights: ScoringWeights::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
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
        let config: Config = toml::from_str(&contents).map_err(|e| ScribeError::ConfigParse {
            message: format!("{}: {}", path.display(), e),
        })?;
        Ok(config)
    }

    /// Load configuration from a file, or defaults if the file doesn't exist.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(ScribeError::ConfigFileNotFound { .. }) => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - CLINSCRIBE_MODEL → stt.model_path
    /// - CLINSCRIBE_LANGUAGE → stt.language
    /// - CLINSCRIBE_WORKERS → scheduler.workers
    /// - CLINSCRIBE_POOL_SIZE → pool.size
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(model) = std::env::var("CLINSCRIBE_MODEL")
            && !model.is_empty()
        {
            self.stt.model_path = PathBuf::from(model);
        }

        if let Ok(language) = std::env::var("CLINSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Some(workers) = env_number("CLINSCRIBE_WORKERS", "scheduler.workers")? {
            self.scheduler.workers = workers;
        }

        if let Some(size) = env_number("CLINSCRIBE_POOL_SIZE", "pool.size")? {
            self.pool.size = size;
        }

        Ok(self)
    }

    /// Rejects settings that would make startup silently degrade.
    pub fn validate(&self) -> Result<()> {
        self.scheduler_config().validate()?;
        if self.pool.size == 0 {
            return Err(ScribeError::invalid_config(
                "pool.size",
                "engine pool size must be at least 1",
            ));
        }
        if self.pool.acquire_poll_ms == 0 {
            return Err(ScribeError::invalid_config(
                "pool.acquire_poll_ms",
                "poll interval must be positive",
            ));
        }
        if self.diarization.min_speakers > self.diarization.max_speakers {
            return Err(ScribeError::invalid_config(
                "diarization.min_speakers",
                format!(
                    "{} is greater than max_speakers ({})",
                    self.diarization.min_speakers, self.diarization.max_speakers
                ),
            ));
        }
        self.attribution_settings().validate()
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            workers: self.scheduler.workers,
            retention: Duration::from_secs(self.scheduler.retention_secs),
            sweep_interval: Duration::from_secs(self.scheduler.sweep_interval_secs),
        }
    }

    pub fn acquire_poll_interval(&self) -> Duration {
        Duration::from_millis(self.pool.acquire_poll_ms)
    }

    pub fn whisper_config(&self) -> WhisperConfig {
        WhisperConfig {
            model_path: self.stt.model_path.clone(),
            language: self.stt.language.clone(),
            threads: self.stt.threads,
        }
    }

    pub fn attribution_settings(&self) -> AttributionSettings {
        AttributionSettings {
            weights: self.attribution.weights,
            identity_threshold: self.attribution.identity_threshold,
            confidence_floor: self.attribution.confidence_floor,
            epsilon: self.attribution.epsilon,
        }
    }

    /// The configured vocabulary, or the built-in one.
    pub fn vocabulary(&self) -> Result<PhraseVocabulary> {
        match &self.attribution.vocabulary_path {
            Some(path) => PhraseVocabulary::load(path),
            None => Ok(PhraseVocabulary::default()),
        }
    }

    pub fn build_attribution_engine(&self) -> Result<AttributionEngine> {
        AttributionEngine::new(&self.vocabulary()?, self.attribution_settings())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/clinscribe/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("clinscribe").join("config.toml"))
            .ok_or_else(|| ScribeError::Other("Could not determine config directory".to_string()))
    }
}

/// Parses a numeric environment override; empty values are ignored.
fn env_number(var: &str, key: &str) -> Result<Option<usize>> {
    match std::env::var(var) {
        Ok(value) if !value.is_empty() => value.trim().parse().map(Some).map_err(|_| {
            ScribeError::invalid_config(key, format!("{var}={value:?} is not a whole number"))
        }),
        _ => Ok(None),
    }
}
