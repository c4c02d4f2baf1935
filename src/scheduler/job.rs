//! Job records and the snapshots handed out to callers.

use crate::defaults;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque, unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state. Transitions only move forward:
/// Pending → Running → Completed | Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Point-in-time copy of a job record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot<T> {
    pub job_id: JobId,
    pub session_id: String,
    /// Submission order; workers dequeue in ascending sequence
    pub sequence: u64,
    pub status: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set only when `status` is `Failed`
    pub error: Option<String>,
    /// Set only when `status` is `Completed`
    pub result: Option<T>,
}

/// The live record in the job table. Only the scheduler mutates it.
#[derive(Debug)]
pub(crate) struct JobRecord<T> {
    job_id: JobId,
    session_id: String,
    sequence: u64,
    status: JobStatus,
    progress: u8,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error: Option<String>,
    result: Option<T>,
}

impl<T> JobRecord<T> {
    pub(crate) fn new(
        job_id: JobId,
        session_id: String,
        sequence: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            session_id,
            sequence,
            status: JobStatus::Pending,
            progress: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            error: None,
            result: None,
        }
    }

    pub(crate) fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn sequence(&self) -> u64 {
        self.sequence
    }

    pub(crate) fn status(&self) -> JobStatus {
        self.status
    }

    pub(crate) fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Pending → Running. Returns false if the job already left Pending.
    pub(crate) fn start(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Pending {
            return false;
        }
        self.status = JobStatus::Running;
        self.started_at = Some(now);
        self.progress = defaults::PROGRESS_STARTED;
        true
    }

    /// Intermediate progress while Running: clamped below 100 and never lowered.
    pub(crate) fn report_progress(&mut self, progress: u8) {
        if self.status != JobStatus::Running {
            return;
        }
        let progress = progress.min(defaults::PROGRESS_COMPLETE - 1);
        self.progress = self.progress.max(progress);
    }

    pub(crate) fn complete(&mut self, result: T, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Completed;
        self.progress = defaults::PROGRESS_COMPLETE;
        self.result = Some(result);
        self.completed_at = Some(now);
    }

    pub(crate) fn fail(&mut self, error: String, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.progress = 0;
        self.error = Some(error);
        self.completed_at = Some(now);
    }
}

impl<T: Clone> JobRecord<T> {
    pub(crate) fn snapshot(&self) -> JobSnapshot<T> {
        JobSnapshot {
            job_id: self.job_id,
            session_id: self.session_id.clone(),
            sequence: self.sequence,
            status: self.status,
            progress: self.progress,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
            result: self.result.clone(),
        }
    }
}
