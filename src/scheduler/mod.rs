//! Fixed-size worker pool draining one FIFO job queue.
//!
//! `submit` never blocks: the record is inserted into the job table and the
//! job is pushed onto an unbounded channel under the same lock, so queue order
//! always matches submission order even with concurrent submitters. Workers
//! are plain OS threads; a payload that errors or panics marks its job Failed
//! and the worker moves on to the next job.

pub mod job;

pub use job::{JobId, JobSnapshot, JobStatus};

use crate::clock::{Clock, SystemClock};
use crate::defaults;
use crate::error::{Result, ScribeError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use job::JobRecord;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Worker count, retention window and sweep cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub workers: usize,
    /// How long a finished job stays queryable
    pub retention: Duration,
    pub sweep_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKER_COUNT,
            retention: Duration::from_secs(defaults::RETENTION_SECS),
            sweep_interval: Duration::from_secs(defaults::SWEEP_INTERVAL_SECS),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ScribeError::invalid_config(
                "scheduler.workers",
                "at least one worker is required",
            ));
        }
        if self.retention.is_zero() {
            return Err(ScribeError::invalid_config(
                "scheduler.retention_secs",
                "retention window must be positive",
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(ScribeError::invalid_config(
                "scheduler.sweep_interval_secs",
                "sweep interval must be positive",
            ));
        }
        Ok(())
    }
}

/// Handle given to a running payload.
#[derive(Clone)]
pub struct JobContext {
    job_id: JobId,
    session_id: String,
    sequence: u64,
    reporter: Arc<dyn Fn(u8) + Send + Sync>,
}

impl JobContext {
    /// A context that is not attached to any scheduler; progress is discarded.
    pub fn detached(session_id: impl Into<String>) -> Self {
        Self {
            job_id: JobId::new(),
            session_id: session_id.into(),
            sequence: 0,
            reporter: Arc::new(|_: u8| {}),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Reports intermediate progress. Values are clamped to 0..=99 and never
    /// lower the progress already recorded; 100 is set only on completion.
    pub fn set_progress(&self, progress: u8) {
        (self.reporter)(progress);
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("session_id", &self.session_id)
            .field("sequence", &self.sequence)
            .finish()
    }
}

type Payload<T> = Box<dyn FnOnce(&JobContext) -> Result<T> + Send + 'static>;

struct QueuedJob<T> {
    job_id: JobId,
    payload: Payload<T>,
}

struct JobTable<T> {
    jobs: HashMap<JobId, JobRecord<T>>,
    next_sequence: u64,
    /// `None` once the scheduler is shut down
    queue: Option<Sender<QueuedJob<T>>>,
}

struct Shared<T> {
    table: Mutex<JobTable<T>>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
}

impl<T: Send + 'static> Shared<T> {
    fn worker_loop(self: Arc<Self>, index: usize, jobs: Receiver<QueuedJob<T>>) {
        log::debug!("Scheduler worker {} started", index);
        for job in jobs.iter() {
            self.run(index, job);
        }
        log::debug!("Scheduler worker {} exiting", index);
    }

    fn run(self: &Arc<Self>, worker: usize, job: QueuedJob<T>) {
        let QueuedJob { job_id, payload } = job;

        let ctx = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            let Some(record) = table.jobs.get_mut(&job_id) else {
                log::warn!("Job {} vanished from the job table before it ran", job_id);
                return;
            };
            if !record.start(self.clock.now()) {
                log::warn!("Job {} dequeued twice; skipping", job_id);
                return;
            }
            let shared = Arc::downgrade(self);
            JobContext {
                job_id,
                session_id: record.session_id().to_string(),
                sequence: record.sequence(),
                reporter: Arc::new(move |progress: u8| {
                    if let Some(shared) = shared.upgrade() {
                        shared.report_progress(job_id, progress);
                    }
                }),
            }
        };
        log::debug!(
            "Worker {} running job {} (session {})",
            worker,
            job_id,
            ctx.session_id()
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| payload(&ctx)));

        let now = self.clock.now();
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = table.jobs.get_mut(&job_id) else {
            return;
        };
        match outcome {
            Ok(Ok(result)) => {
                record.complete(result, now);
                log::info!("Job {} completed", job_id);
            }
            Ok(Err(e)) => {
                log::warn!("Job {} failed: {}", job_id, e);
                record.fail(e.to_string(), now);
            }
            Err(panic_info) => {
                let message = panic_info
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                    .unwrap_or("unknown panic")
                    .to_string();
                let error = ScribeError::JobPanicked { message };
                log::error!("Job {} on worker {}: {}", job_id, worker, error);
                record.fail(error.to_string(), now);
            }
        }
    }

    fn report_progress(&self, job_id: JobId, progress: u8) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = table.jobs.get_mut(&job_id) {
            record.report_progress(progress);
        }
    }

    fn sweep(&self) -> usize {
        // A window reaching before the earliest representable date sweeps nothing.
        let Some(cutoff) = self.clock.now().checked_sub_signed(self.retention) else {
            return 0;
        };
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        let before = table.jobs.len();
        table
            .jobs
            .retain(|_, record| record.completed_at().is_none_or(|done| done >= cutoff));
        before - table.jobs.len()
    }
}

fn join_logged(handle: JoinHandle<()>, what: &str) {
    if let Err(panic_info) = handle.join() {
        let msg = panic_info
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");
        log::error!("{} thread panicked: {}", what, msg);
    }
}

/// Runs submitted jobs on a fixed pool of worker threads and keeps their
/// records queryable until the retention window expires.
pub struct JobScheduler<T> {
    shared: Arc<Shared<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    sweeper: Mutex<Option<(Sender<()>, JoinHandle<()>)>>,
}

impl<T: Clone + Send + 'static> JobScheduler<T> {
    /// Starts the workers and the sweeper on the system clock.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Starts the workers and the sweeper; timestamps come from `clock`.
    ///
    /// Fails fast on a zero worker count.
    pub fn with_clock(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let retention = chrono::Duration::from_std(config.retention).map_err(|_| {
            ScribeError::invalid_config("scheduler.retention_secs", "retention window is too large")
        })?;

        let (job_tx, job_rx) = unbounded();
        let shared = Arc::new(Shared {
            table: Mutex::new(JobTable {
                jobs: HashMap::new(),
                next_sequence: 0,
                queue: Some(job_tx),
            }),
            clock,
            retention,
        });
        // Dropping a half-built scheduler shuts down whatever was spawned.
        let scheduler = Self {
            shared: Arc::clone(&shared),
            workers: Mutex::new(Vec::with_capacity(config.workers)),
            sweeper: Mutex::new(None),
        };

        for index in 0..config.workers {
            let shared = Arc::clone(&shared);
            let jobs = job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("clinscribe-worker-{index}"))
                .spawn(move || shared.worker_loop(index, jobs))?;
            scheduler
                .workers
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(handle);
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let sweep_interval = config.sweep_interval;
        let sweeper_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("clinscribe-sweeper".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(sweep_interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let removed = sweeper_shared.sweep();
                            if removed > 0 {
                                log::debug!("Swept {} expired job record(s)", removed);
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;
        *scheduler.sweeper.lock().unwrap_or_else(|e| e.into_inner()) = Some((stop_tx, handle));

        log::info!(
            "Job scheduler started: {} worker(s), retention {}s, sweep every {}s",
            config.workers,
            config.retention.as_secs(),
            config.sweep_interval.as_secs()
        );
        Ok(scheduler)
    }

    /// Enqueues `payload` for `session_id` and returns its id immediately.
    pub fn submit<F>(&self, session_id: impl Into<String>, payload: F) -> Result<JobId>
    where
        F: FnOnce(&JobContext) -> Result<T> + Send + 'static,
    {
        let job_id = JobId::new();
        let now = self.shared.clock.now();

        let mut table = self.shared.table.lock().unwrap_or_else(|e| e.into_inner());
        let Some(queue) = table.queue.clone() else {
            return Err(ScribeError::SchedulerStopped);
        };
        let sequence = table.next_sequence;
        table.next_sequence += 1;
        table
            .jobs
            .insert(job_id, JobRecord::new(job_id, session_id.into(), sequence, now));

        let job = QueuedJob {
            job_id,
            payload: Box::new(payload),
        };
        if queue.send(job).is_err() {
            table.jobs.remove(&job_id);
            return Err(ScribeError::SchedulerStopped);
        }
        log::debug!("Queued job {} (sequence {})", job_id, sequence);
        Ok(job_id)
    }

    /// A copy of the job's record, or `None` if unknown or already swept.
    pub fn status(&self, job_id: JobId) -> Option<JobSnapshot<T>> {
        let table = self.shared.table.lock().unwrap_or_else(|e| e.into_inner());
        table.jobs.get(&job_id).map(JobRecord::snapshot)
    }

    /// Copies of every retained job for `session_id`, in submission order.
    pub fn session_jobs(&self, session_id: &str) -> Vec<JobSnapshot<T>> {
        let table = self.shared.table.lock().unwrap_or_else(|e| e.into_inner());
        let mut jobs: Vec<JobSnapshot<T>> = table
            .jobs
            .values()
            .filter(|record| record.session_id() == session_id)
            .map(JobRecord::snapshot)
            .collect();
        jobs.sort_by_key(|job| job.sequence);
        jobs
    }

    /// Number of non-terminal jobs.
    pub fn pending_count(&self) -> usize {
        let table = self.shared.table.lock().unwrap_or_else(|e| e.into_inner());
        table
            .jobs
            .values()
            .filter(|record| !record.status().is_terminal())
            .count()
    }

    /// Removes records whose `completed_at` is older than the retention
    /// window. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.shared.sweep()
    }
}

impl<T> JobScheduler<T> {
    /// Stops accepting jobs, lets workers drain the queue, and joins every
    /// thread. Calling it again is a no-op.
    pub fn shutdown(&self) {
        let queue = self
            .shared
            .table
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queue
            .take();
        if queue.is_none() {
            return;
        }
        drop(queue);

        let workers: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in workers {
            join_logged(handle, "Scheduler worker");
        }

        let sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some((stop_tx, handle)) = sweeper {
            drop(stop_tx);
            join_logged(handle, "Scheduler sweeper");
        }
        log::info!("Job scheduler stopped");
    }
}

impl<T> Drop for JobScheduler<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn config(workers: usize) -> SchedulerConfig {
        SchedulerConfig {
            workers,
            ..Default::default()
        }
    }

    /// Polls until the job reaches a terminal state.
    fn wait_terminal<T: Clone + Send + 'static>(
        scheduler: &JobScheduler<T>,
        job_id: JobId,
    ) -> JobSnapshot<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let snap = scheduler.status(job_id).unwrap();
            if snap.status.is_terminal() {
                return snap;
            }
            assert!(Instant::now() < deadline, "job {job_id} never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_zero_workers_fails_fast() {
        let result = JobScheduler::<u32>::new(config(0));
        match result {
            Err(ScribeError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "scheduler.workers");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_zero_retention_is_rejected() {
        let result = SchedulerConfig {
            retention: Duration::ZERO,
            ..config(1)
        }
        .validate();
        assert!(matches!(
            result,
            Err(ScribeError::ConfigInvalidValue { ref key, .. }) if key == "scheduler.retention_secs"
        ));
    }

    #[test]
    fn test_huge_retention_sweeps_nothing() {
        let clock = Arc::new(ManualClock::default());
        let scheduler = JobScheduler::with_clock(
            SchedulerConfig {
                retention: Duration::from_secs(10_000_000_000_000),
                ..config(1)
            },
            clock.clone(),
        )
        .unwrap();
        let id = scheduler.submit("s1", |_ctx| Ok(1u32)).unwrap();
        wait_terminal(&scheduler, id);

        clock.advance(chrono::Duration::days(365));
        assert_eq!(scheduler.sweep(), 0);
        assert!(scheduler.status(id).is_some());
    }

    #[test]
    fn test_submitted_job_completes() {
        let scheduler = JobScheduler::new(config(2)).unwrap();
        let id = scheduler.submit("s1", |_ctx| Ok(42u32)).unwrap();

        let snap = wait_terminal(&scheduler, id);
        assert_eq!(snap.status, JobStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.result, Some(42));
        assert!(snap.started_at.is_some());
        assert!(snap.completed_at.is_some());
        assert!(snap.error.is_none());
    }

    #[test]
    fn test_submit_does_not_block_on_busy_workers() {
        let scheduler = JobScheduler::new(config(1)).unwrap();
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let blocker = scheduler
            .submit("s1", move |_ctx| {
                release_rx.recv().ok();
                Ok(0u32)
            })
            .unwrap();

        let start = Instant::now();
        let queued = scheduler.submit("s1", |_ctx| Ok(1u32)).unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(scheduler.status(queued).unwrap().status, JobStatus::Pending);

        release_tx.send(()).unwrap();
        assert_eq!(wait_terminal(&scheduler, blocker).result, Some(0));
        assert_eq!(wait_terminal(&scheduler, queued).result, Some(1));
    }

    #[test]
    fn test_single_worker_runs_jobs_in_submission_order() {
        let scheduler = JobScheduler::new(config(1)).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let ids: Vec<JobId> = (0..20)
            .map(|i| {
                let order = Arc::clone(&order);
                scheduler
                    .submit("s1", move |_ctx| {
                        order.lock().unwrap().push(i);
                        Ok(i)
                    })
                    .unwrap()
            })
            .collect();

        for id in &ids {
            wait_terminal(&scheduler, *id);
        }
        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_submitters_get_distinct_ordered_sequences() {
        let scheduler = Arc::new(JobScheduler::new(config(1)).unwrap());
        let executed = Arc::new(Mutex::new(Vec::new()));

        let submitters: Vec<_> = (0..4)
            .map(|t| {
                let scheduler = Arc::clone(&scheduler);
                let executed = Arc::clone(&executed);
                thread::spawn(move || {
                    (0..25)
                        .map(|_| {
                            let executed = Arc::clone(&executed);
                            scheduler
                                .submit(format!("s{t}"), move |ctx| {
                                    executed.lock().unwrap().push(ctx.sequence());
                                    Ok(())
                                })
                                .unwrap()
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let ids: Vec<JobId> = submitters
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();

        for id in &ids {
            wait_terminal(&scheduler, *id);
        }
        let executed = executed.lock().unwrap().clone();
        assert_eq!(executed.len(), 100);
        assert_eq!(executed, (0..100).collect::<Vec<u64>>());
    }

    #[test]
    fn test_failed_job_records_error_and_worker_survives() {
        let scheduler = JobScheduler::new(config(1)).unwrap();
        let failing = scheduler
            .submit("s1", |_ctx| -> Result<u32> {
                Err(ScribeError::TranscriptionInferenceFailed {
                    message: "decoder crashed".to_string(),
                })
            })
            .unwrap();
        let next = scheduler.submit("s1", |_ctx| Ok(7u32)).unwrap();

        let snap = wait_terminal(&scheduler, failing);
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.progress, 0);
        assert!(snap.error.unwrap().contains("decoder crashed"));
        assert!(snap.result.is_none());
        assert!(snap.completed_at.is_some());

        assert_eq!(wait_terminal(&scheduler, next).result, Some(7));
    }

    #[test]
    fn test_panicking_job_is_contained() {
        let scheduler = JobScheduler::new(config(1)).unwrap();
        let panicking = scheduler
            .submit("s1", |_ctx| -> Result<u32> { panic!("payload blew up") })
            .unwrap();
        let next = scheduler.submit("s1", |_ctx| Ok(1u32)).unwrap();

        let snap = wait_terminal(&scheduler, panicking);
        assert_eq!(snap.status, JobStatus::Failed);
        assert!(snap.error.unwrap().contains("payload blew up"));
        assert_eq!(wait_terminal(&scheduler, next).status, JobStatus::Completed);
    }

    #[test]
    fn test_progress_reported_by_payload() {
        let scheduler = JobScheduler::new(config(1)).unwrap();
        let (seen_tx, seen_rx) = crossbeam_channel::bounded::<()>(0);
        let (go_tx, go_rx) = crossbeam_channel::bounded::<()>(0);

        let id = scheduler
            .submit("s1", move |ctx| {
                ctx.set_progress(50);
                ctx.set_progress(20);
                seen_tx.send(()).ok();
                go_rx.recv().ok();
                Ok(())
            })
            .unwrap();

        seen_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let snap = scheduler.status(id).unwrap();
        assert_eq!(snap.status, JobStatus::Running);
        assert_eq!(snap.progress, 50);

        go_tx.send(()).unwrap();
        assert_eq!(wait_terminal(&scheduler, id).progress, 100);
    }

    #[test]
    fn test_session_jobs_filters_and_orders() {
        let scheduler = JobScheduler::new(config(2)).unwrap();
        let a1 = scheduler.submit("a", |_ctx| Ok(1u32)).unwrap();
        let b1 = scheduler.submit("b", |_ctx| Ok(2u32)).unwrap();
        let a2 = scheduler.submit("a", |_ctx| Ok(3u32)).unwrap();
        for id in [a1, b1, a2] {
            wait_terminal(&scheduler, id);
        }

        let jobs = scheduler.session_jobs("a");
        assert_eq!(
            jobs.iter().map(|j| j.job_id).collect::<Vec<_>>(),
            vec![a1, a2]
        );
        assert!(scheduler.session_jobs("missing").is_empty());
    }

    #[test]
    fn test_status_unknown_job_is_none() {
        let scheduler = JobScheduler::<u32>::new(config(1)).unwrap();
        assert!(scheduler.status(JobId::new()).is_none());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let scheduler = JobScheduler::new(config(1)).unwrap();
        let (go_tx, go_rx) = crossbeam_channel::bounded::<()>(0);
        let id = scheduler
            .submit("s1", move |_ctx| {
                go_rx.recv().ok();
                Ok("done".to_string())
            })
            .unwrap();

        let before = scheduler.status(id).unwrap();
        go_tx.send(()).unwrap();
        let after = wait_terminal(&scheduler, id);

        assert!(before.result.is_none());
        assert!(!before.status.is_terminal());
        assert_eq!(after.result.as_deref(), Some("done"));
    }

    #[test]
    fn test_sweep_removes_only_expired_records() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let scheduler = JobScheduler::with_clock(
            SchedulerConfig {
                workers: 1,
                retention: Duration::from_secs(3600),
                sweep_interval: Duration::from_secs(3600),
            },
            clock.clone(),
        )
        .unwrap();

        let old = scheduler.submit("s1", |_ctx| Ok(1u32)).unwrap();
        wait_terminal(&scheduler, old);

        clock.advance(chrono::Duration::minutes(50));
        let recent = scheduler.submit("s1", |_ctx| Ok(2u32)).unwrap();
        wait_terminal(&scheduler, recent);

        clock.advance(chrono::Duration::minutes(20));
        assert_eq!(scheduler.sweep(), 1);
        assert!(scheduler.status(old).is_none());
        assert!(scheduler.status(recent).is_some());

        clock.advance(chrono::Duration::hours(2));
        assert_eq!(scheduler.sweep(), 1);
        assert!(scheduler.session_jobs("s1").is_empty());
    }

    #[test]
    fn test_sweep_keeps_unfinished_jobs() {
        let clock = Arc::new(ManualClock::default());
        let scheduler = JobScheduler::with_clock(config(1), clock.clone()).unwrap();
        let (go_tx, go_rx) = crossbeam_channel::bounded::<()>(0);
        let id = scheduler
            .submit("s1", move |_ctx| {
                go_rx.recv().ok();
                Ok(0u32)
            })
            .unwrap();

        clock.advance(chrono::Duration::days(7));
        assert_eq!(scheduler.sweep(), 0);
        assert!(scheduler.status(id).is_some());
        go_tx.send(()).unwrap();
        wait_terminal(&scheduler, id);
    }

    #[test]
    fn test_sweeper_thread_runs_on_interval() {
        let clock = Arc::new(ManualClock::default());
        let scheduler = JobScheduler::with_clock(
            SchedulerConfig {
                workers: 1,
                retention: Duration::from_secs(1),
                sweep_interval: Duration::from_millis(20),
            },
            clock.clone(),
        )
        .unwrap();
        let id = scheduler.submit("s1", |_ctx| Ok(0u32)).unwrap();
        wait_terminal(&scheduler, id);
        clock.advance(chrono::Duration::seconds(10));

        let deadline = Instant::now() + Duration::from_secs(5);
        while scheduler.status(id).is_some() {
            assert!(Instant::now() < deadline, "sweeper never removed the job");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_shutdown_drains_queue_then_rejects() {
        let scheduler = JobScheduler::new(config(1)).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let ids: Vec<JobId> = (0..5)
            .map(|_| {
                let ran = Arc::clone(&ran);
                scheduler
                    .submit("s1", move |_ctx| {
                        thread::sleep(Duration::from_millis(5));
                        ran.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap()
            })
            .collect();

        scheduler.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 5);
        for id in ids {
            assert_eq!(scheduler.status(id).unwrap().status, JobStatus::Completed);
        }
        assert!(matches!(
            scheduler.submit("s1", |_ctx| Ok(())),
            Err(ScribeError::SchedulerStopped)
        ));
        scheduler.shutdown();
    }

    #[test]
    fn test_workers_run_in_parallel() {
        let scheduler = JobScheduler::new(config(3)).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ids: Vec<JobId> = (0..6)
            .map(|_| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                scheduler
                    .submit("s1", move |_ctx| {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap()
            })
            .collect();
        for id in ids {
            wait_terminal(&scheduler, id);
        }
        assert!(peak.load(Ordering::SeqCst) > 1);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_detached_context_ignores_progress() {
        let ctx = JobContext::detached("s1");
        ctx.set_progress(80);
        assert_eq!(ctx.session_id(), "s1");
        assert_eq!(ctx.sequence(), 0);
    }
}
