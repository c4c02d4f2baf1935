use anyhow::{Context, Result, bail};
use clap::Parser;
use clinscribe::attribution::{
    AttributionEngine, DiarizedInterval, IdentityMatch, LabeledTranscript, SpeakerRole,
    TranscriptSegment,
};
use clinscribe::audio::wav::load_wav;
use clinscribe::cli::{Cli, Commands, ConfigAction};
use clinscribe::config::Config;
use clinscribe::diarize::StaticDiarizer;
use clinscribe::pipeline::{ConsultationPipeline, ConsultationRequest, submit_consultation};
use clinscribe::pool::EnginePool;
use clinscribe::scheduler::{JobScheduler, JobStatus};
use clinscribe::stt::{RecognitionEngine, TranscribeOptions, WhisperEngine};
use env_logger::Env;
use owo_colors::OwoColorize;
use std::io::{IsTerminal, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    log::debug!("clinscribe {}", clinscribe::version_string());

    match cli.command {
        Commands::Transcribe {
            audio,
            session,
            diarization,
            language,
            timeout,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let request = ConsultationRequest {
                target_name: None,
                options: TranscribeOptions {
                    language,
                    initial_prompt: None,
                },
            };
            let labeled = run_transcribe(
                &config,
                &audio,
                &session,
                diarization.as_deref(),
                request,
                timeout,
                cli.quiet,
            )?;
            print_transcript(&labeled, json)?;
        }
        Commands::Attribute {
            segments,
            diarization,
            identity_speaker,
            identity_confidence,
            clinician,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let engine = config.build_attribution_engine()?;
            let identity = identity_speaker.zip(identity_confidence).map(|(speaker_id, confidence)| {
                IdentityMatch {
                    name: clinician.clone().unwrap_or_else(|| speaker_id.clone()),
                    speaker_id,
                    confidence,
                }
            });
            let labeled = run_attribute(
                &engine,
                &segments,
                diarization.as_deref(),
                identity.as_ref(),
                clinician.as_deref(),
            )?;
            print_transcript(&labeled, json)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = load_config(cli.config.as_deref())?;
                print!("{}", toml::to_string_pretty(&config)?);
            }
            ConfigAction::Path => {
                let path = match cli.config {
                    Some(path) => path,
                    None => Config::default_path()?,
                };
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `-q`/`-v` pick the level.
fn init_logging(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        let default_path = Config::default_path()?;
        Config::load_or_default(&default_path)?
    };

    // Apply environment variable overrides, then fail fast on bad values
    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn run_transcribe(
    config: &Config,
    audio_path: &Path,
    session_id: &str,
    diarization: Option<&Path>,
    request: ConsultationRequest,
    timeout: Duration,
    quiet: bool,
) -> Result<LabeledTranscript> {
    let audio = load_wav(audio_path)
        .with_context(|| format!("Failed to read {}", audio_path.display()))?;
    log::info!(
        "Loaded {} ({:.1}s of audio)",
        audio_path.display(),
        audio.duration_secs()
    );

    let whisper = config.whisper_config();
    log::info!(
        "Loading {} engine(s) from {} ({} backend)",
        config.pool.size,
        whisper.model_path.display(),
        clinscribe::defaults::gpu_backend()
    );
    let pool = EnginePool::load(config.pool.size, |_| {
        Ok(Arc::new(WhisperEngine::new(whisper.clone())?) as Arc<dyn RecognitionEngine>)
    })?
    .with_poll_interval(config.acquire_poll_interval());
    if !pool.is_available() {
        bail!(
            "No recognition engine could be loaded from {}",
            whisper.model_path.display()
        );
    }

    let mut pipeline = ConsultationPipeline::new(pool, config.build_attribution_engine()?)
        .with_speaker_range(
            config.diarization.min_speakers,
            config.diarization.max_speakers,
        );
    if let Some(path) = diarization {
        let diarizer = StaticDiarizer::from_json_file(path)
            .with_context(|| format!("Failed to read diarization from {}", path.display()))?;
        pipeline = pipeline.with_diarizer(Arc::new(diarizer));
    }

    let scheduler = JobScheduler::new(config.scheduler_config())?;
    let job_id = submit_consultation(&scheduler, &pipeline, session_id, audio, request)?;
    log::info!("Submitted job {} for session {}", job_id, session_id);

    let show_progress = !quiet && std::io::stderr().is_terminal();
    let deadline = Instant::now() + timeout;
    let snapshot = loop {
        let Some(snapshot) = scheduler.status(job_id) else {
            bail!("Job {} disappeared before finishing", job_id);
        };
        if show_progress {
            eprint!("\r{:>3}% {}", snapshot.progress, snapshot.status);
            if let Err(e) = std::io::stderr().flush() {
                log::debug!("Failed to flush progress: {}", e);
            }
        }
        if snapshot.status.is_terminal() {
            break snapshot;
        }
        if Instant::now() >= deadline {
            // Exit without joining the workers; the job cannot be cancelled.
            eprintln!(
                "clinscribe: job {} still {} after {}",
                job_id,
                snapshot.status,
                humantime::format_duration(timeout)
            );
            std::process::exit(1);
        }
        std::thread::sleep(STATUS_POLL_INTERVAL);
    };
    if show_progress {
        eprintln!();
    }
    scheduler.shutdown();

    match snapshot.status {
        JobStatus::Completed => snapshot
            .result
            .with_context(|| format!("Job {} completed without a result", job_id)),
        _ => bail!(
            "Job {} failed: {}",
            job_id,
            snapshot.error.unwrap_or_else(|| "unknown error".to_string())
        ),
    }
}

fn run_attribute(
    engine: &AttributionEngine,
    segments_path: &Path,
    diarization: Option<&Path>,
    identity: Option<&IdentityMatch>,
    target_name: Option<&str>,
) -> Result<LabeledTranscript> {
    let segments: Vec<TranscriptSegment> = read_json(segments_path)?;
    let intervals: Vec<DiarizedInterval> = match diarization {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    Ok(engine.resolve_labels(&intervals, &segments, identity, target_name))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_transcript(labeled: &LabeledTranscript, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(labeled)?);
        return Ok(());
    }

    let color = std::io::stdout().is_terminal();
    for segment in &labeled.segments {
        let label = segment.role.label();
        if !color {
            println!("{}: {}", label, segment.text.trim());
            continue;
        }
        match segment.role {
            SpeakerRole::Clinician => println!("{}: {}", label.cyan().bold(), segment.text.trim()),
            SpeakerRole::Patient => println!("{}: {}", label.green().bold(), segment.text.trim()),
            SpeakerRole::Unknown => println!("{}: {}", label.dimmed(), segment.text.trim()),
        }
    }
    log::info!(
        "Attribution method: {:?}{}",
        labeled.method,
        labeled
            .clinician_name
            .as_deref()
            .map(|name| format!(" ({name})"))
            .unwrap_or_default()
    );
    Ok(())
}
