//! Per-job data flow for one recorded consultation.
//!
//! pool → recognition → diarization → identity → attribution
//!
//! Recognition holds an engine slot only for the duration of the engine call.
//! Diarization and identity matching are optional; when either is missing or
//! fails, the job still completes with weaker attribution heuristics.

use crate::attribution::{AttributionEngine, DiarizedInterval, IdentityMatch, LabeledTranscript};
use crate::audio::AudioBuffer;
use crate::defaults;
use crate::diarize::{Diarizer, IdentityMatcher};
use crate::error::{Result, ScribeError};
use crate::pool::EnginePool;
use crate::scheduler::{JobContext, JobId, JobScheduler};
use crate::stt::TranscribeOptions;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-job inputs besides the audio.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsultationRequest {
    /// Name of the clinician expected in the recording, used for voice matching
    pub target_name: Option<String>,
    pub options: TranscribeOptions,
}

impl ConsultationRequest {
    pub fn with_target_name(mut self, name: impl Into<String>) -> Self {
        self.target_name = Some(name.into());
        self
    }
}

/// Shared, cheaply cloneable job body.
#[derive(Clone)]
pub struct ConsultationPipeline {
    pool: EnginePool,
    attribution: Arc<AttributionEngine>,
    diarizer: Option<Arc<dyn Diarizer>>,
    matcher: Option<Arc<dyn IdentityMatcher>>,
    min_speakers: usize,
    max_speakers: usize,
}

impl ConsultationPipeline {
    pub fn new(pool: EnginePool, attribution: AttributionEngine) -> Self {
        Self {
            pool,
            attribution: Arc::new(attribution),
            diarizer: None,
            matcher: None,
            min_speakers: defaults::MIN_SPEAKERS,
            max_speakers: defaults::MAX_SPEAKERS,
        }
    }

    pub fn with_diarizer(mut self, diarizer: Arc<dyn Diarizer>) -> Self {
        self.diarizer = Some(diarizer);
        self
    }

    pub fn with_identity_matcher(mut self, matcher: Arc<dyn IdentityMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn with_speaker_range(mut self, min_speakers: usize, max_speakers: usize) -> Self {
        self.min_speakers = min_speakers;
        self.max_speakers = max_speakers;
        self
    }

    pub fn pool(&self) -> &EnginePool {
        &self.pool
    }

    /// Runs one consultation end to end, reporting coarse progress on `ctx`.
    ///
    /// Only recognition errors fail the job; diarization and identity errors
    /// are logged and degrade attribution instead.
    pub fn process(
        &self,
        audio: &AudioBuffer,
        request: &ConsultationRequest,
        ctx: &JobContext,
    ) -> Result<LabeledTranscript> {
        let transcript = self.pool.run_with_pool(audio, &request.options)?;
        log::debug!(
            "Job {}: recognized {} segment(s)",
            ctx.job_id(),
            transcript.segments.len()
        );
        ctx.set_progress(defaults::PROGRESS_TRANSCRIBED);

        let intervals = self.diarize(audio);
        ctx.set_progress(defaults::PROGRESS_DIARIZED);

        let target_name = request.target_name.as_deref();
        let identity = self.identify(audio, &intervals, target_name);

        let labeled = self.attribution.resolve_labels(
            &intervals,
            &transcript.segments,
            identity.as_ref(),
            target_name,
        );
        log::info!(
            "Job {} (session {}): {} segment(s) labeled via {:?}",
            ctx.job_id(),
            ctx.session_id(),
            labeled.len(),
            labeled.method
        );
        ctx.set_progress(defaults::PROGRESS_ATTRIBUTED);
        Ok(labeled)
    }

    fn diarize(&self, audio: &AudioBuffer) -> Vec<DiarizedInterval> {
        let Some(diarizer) = &self.diarizer else {
            log::debug!("No diarizer configured");
            return Vec::new();
        };
        match diarizer.diarize(audio, self.min_speakers, self.max_speakers) {
            Ok(intervals) => intervals,
            Err(e) => {
                log::warn!("Diarization unavailable, using per-segment heuristics: {}", e);
                Vec::new()
            }
        }
    }

    /// Offers each speaker's longest turn to the matcher, with the target
    /// name as the only candidate. The most confident match wins.
    fn identify(
        &self,
        audio: &AudioBuffer,
        intervals: &[DiarizedInterval],
        target_name: Option<&str>,
    ) -> Option<IdentityMatch> {
        let matcher = self.matcher.as_ref()?;
        let target_name = target_name?;

        let mut longest: BTreeMap<&str, &DiarizedInterval> = BTreeMap::new();
        for interval in intervals {
            let entry = longest.entry(interval.speaker_id.as_str()).or_insert(interval);
            if interval.duration() > entry.duration() {
                *entry = interval;
            }
        }

        let candidates = vec![target_name.to_string()];
        let mut best: Option<IdentityMatch> = None;
        for (speaker_id, interval) in longest {
            let clip = audio.clip(interval.start, interval.end);
            if clip.is_empty() {
                continue;
            }
            match matcher.identify(clip, &candidates) {
                Ok(Some(found)) => {
                    log::debug!(
                        "Speaker {} matches {} ({:.2})",
                        speaker_id,
                        found.name,
                        found.confidence
                    );
                    if best.as_ref().is_none_or(|b| found.confidence > b.confidence) {
                        best = Some(IdentityMatch {
                            speaker_id: speaker_id.to_string(),
                            name: found.name,
                            confidence: found.confidence,
                        });
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("Identity matching unavailable, skipping voice override: {}", e);
                    return None;
                }
            }
        }
        best
    }
}

/// Queues `audio` as a consultation job for `session_id`.
///
/// # Errors
/// `ScribeError::PoolUnavailable` if no recognition engine loaded; the job
/// is not queued in that case.
pub fn submit_consultation(
    scheduler: &JobScheduler<LabeledTranscript>,
    pipeline: &ConsultationPipeline,
    session_id: &str,
    audio: AudioBuffer,
    request: ConsultationRequest,
) -> Result<JobId> {
    if !pipeline.pool().is_available() {
        return Err(ScribeError::PoolUnavailable);
    }
    let pipeline = pipeline.clone();
    scheduler.submit(session_id, move |ctx| pipeline.process(&audio, &request, ctx))
}
