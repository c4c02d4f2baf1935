//! Bounded pool of pre-loaded recognition engines.
//!
//! Loading a model takes far longer than one transcription call, so engines
//! are built once at startup and lent to workers one call at a time. At most
//! `capacity()` leases exist at any moment.

use crate::audio::AudioBuffer;
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::stt::engine::{RecognitionEngine, TranscribeOptions, Transcript};
use serde::Serialize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Point-in-time view of one engine slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineSlot {
    pub index: usize,
    pub busy: bool,
}

struct SlotTable {
    /// Lease token of the current holder, `None` when free.
    holders: Vec<Option<u64>>,
    next_token: u64,
}

struct PoolShared {
    engines: Vec<Arc<dyn RecognitionEngine>>,
    slots: Mutex<SlotTable>,
    freed: Condvar,
    poll_interval: Duration,
}

impl PoolShared {
    fn lock_slots(&self) -> MutexGuard<'_, SlotTable> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claims the first free slot, if any.
    fn claim(&self, table: &mut SlotTable) -> Option<(usize, u64)> {
        let index = table.holders.iter().position(Option::is_none)?;
        let token = table.next_token;
        table.next_token += 1;
        table.holders[index] = Some(token);
        Some((index, token))
    }

    /// Frees `index` if `token` matches its holder (or unconditionally when
    /// `token` is `None`). Returns whether a slot was actually freed.
    fn free(&self, index: usize, token: Option<u64>) -> bool {
        let mut table = self.lock_slots();
        let Some(holder) = table.holders.get_mut(index) else {
            return false;
        };
        let matches = match (*holder, token) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(held), Some(expected)) => held == expected,
        };
        if matches {
            *holder = None;
            drop(table);
            self.freed.notify_one();
        }
        matches
    }
}

/// Shared handle to the engine pool. Cloning is cheap.
#[derive(Clone)]
pub struct EnginePool {
    shared: Arc<PoolShared>,
}

impl std::fmt::Debug for EnginePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnginePool")
            .field("capacity", &self.capacity())
            .field("busy", &self.busy_count())
            .field("poll_interval", &self.shared.poll_interval)
            .finish()
    }
}

impl EnginePool {
    /// Builds `size` engines with `factory`, keeping the ones that load.
    ///
    /// A failed load is logged and skipped; the pool is still returned so the
    /// caller can check [`is_available`](Self::is_available).
    ///
    /// # Errors
    /// Returns `ScribeError::ConfigInvalidValue` if `size` is zero.
    pub fn load<F>(size: usize, mut factory: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<Arc<dyn RecognitionEngine>>,
    {
        if size == 0 {
            return Err(ScribeError::invalid_config(
                "pool.size",
                "engine pool size must be at least 1",
            ));
        }

        let mut engines = Vec::with_capacity(size);
        for index in 0..size {
            match factory(index) {
                Ok(engine) => engines.push(engine),
                Err(e) => log::warn!("Engine {} of {} failed to load: {}", index + 1, size, e),
            }
        }

        log::info!("Engine pool ready: {}/{} engines loaded", engines.len(), size);
        Ok(Self::from_engines(engines))
    }

    /// Wraps already-constructed engines.
    pub fn from_engines(engines: Vec<Arc<dyn RecognitionEngine>>) -> Self {
        let holders = vec![None; engines.len()];
        Self {
            shared: Arc::new(PoolShared {
                engines,
                slots: Mutex::new(SlotTable {
                    holders,
                    next_token: 0,
                }),
                freed: Condvar::new(),
                poll_interval: Duration::from_millis(defaults::ACQUIRE_POLL_MS),
            }),
        }
    }

    /// Overrides the interval at which blocked `acquire` calls re-check slots.
    ///
    /// Only takes effect on a pool that has not been cloned yet.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.poll_interval = interval;
        }
        self
    }

    /// True if at least one engine loaded.
    pub fn is_available(&self) -> bool {
        !self.shared.engines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.engines.len()
    }

    pub fn busy_count(&self) -> usize {
        self.shared
            .lock_slots()
            .holders
            .iter()
            .filter(|h| h.is_some())
            .count()
    }

    pub fn slots(&self) -> Vec<EngineSlot> {
        self.shared
            .lock_slots()
            .holders
            .iter()
            .enumerate()
            .map(|(index, holder)| EngineSlot {
                index,
                busy: holder.is_some(),
            })
            .collect()
    }

    /// Blocks until a slot is free and leases its engine.
    ///
    /// # Errors
    /// Returns `ScribeError::PoolUnavailable` immediately on an empty pool
    /// rather than blocking forever.
    pub fn acquire(&self) -> Result<EngineLease> {
        self.acquire_until(None)
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<EngineLease> {
        // A timeout past the end of `Instant` waits without a deadline.
        self.acquire_until(Instant::now().checked_add(timeout))
            .map_err(|e| match e {
                ScribeError::AcquireTimeout { .. } => ScribeError::AcquireTimeout {
                    waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                },
                other => other,
            })
    }

    /// Leases a free engine without waiting.
    pub fn try_acquire(&self) -> Option<EngineLease> {
        let mut table = self.shared.lock_slots();
        let (index, token) = self.shared.claim(&mut table)?;
        Some(self.lease(index, token))
    }

    fn acquire_until(&self, deadline: Option<Instant>) -> Result<EngineLease> {
        if !self.is_available() {
            return Err(ScribeError::PoolUnavailable);
        }

        let mut table = self.shared.lock_slots();
        loop {
            if let Some((index, token)) = self.shared.claim(&mut table) {
                drop(table);
                return Ok(self.lease(index, token));
            }

            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ScribeError::AcquireTimeout { waited_ms: 0 });
                    }
                    (deadline - now).min(self.shared.poll_interval)
                }
                None => self.shared.poll_interval,
            };

            table = self
                .shared
                .freed
                .wait_timeout(table, wait)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    fn lease(&self, index: usize, token: u64) -> EngineLease {
        EngineLease {
            shared: Arc::clone(&self.shared),
            engine: Arc::clone(&self.shared.engines[index]),
            index,
            token,
        }
    }

    /// Returns slot `index` to the free set.
    ///
    /// A no-op for an index that is out of range or not currently held. Any
    /// outstanding lease on the slot becomes inert: dropping it later will not
    /// free the slot a second time.
    pub fn release(&self, index: usize) {
        if !self.shared.free(index, None) {
            log::debug!("Ignoring release of engine slot {} (not held)", index);
        }
    }

    /// Acquire an engine, transcribe, and release the engine on every exit path.
    ///
    /// Engine errors are returned unchanged after the slot is released.
    pub fn run_with_pool(
        &self,
        audio: &AudioBuffer,
        options: &TranscribeOptions,
    ) -> Result<Transcript> {
        let lease = self.acquire()?;
        let result = lease.engine().transcribe(audio, options);
        lease.release();
        result
    }
}

/// Exclusive use of one pooled engine; the slot is freed when dropped.
pub struct EngineLease {
    shared: Arc<PoolShared>,
    engine: Arc<dyn RecognitionEngine>,
    index: usize,
    token: u64,
}

impl EngineLease {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn engine(&self) -> &dyn RecognitionEngine {
        self.engine.as_ref()
    }

    /// Releases the slot now (equivalent to dropping the lease).
    pub fn release(self) {
        drop(self);
    }
}

impl std::fmt::Debug for EngineLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLease")
            .field("index", &self.index)
            .field("model", &self.engine.model_name())
            .finish()
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        self.shared.free(self.index, Some(self.token));
    }
}
