//! State shared between the pool handle, submitters and workers.
//!
//! ## Dispatch
//!
//! ```text
//!   submit(job)
//!     │
//!     ├─ fast path (no lock, no waiters): pop idle token ─► try_assign ─► done
//!     │
//!     └─ slow path (state lock), FCFS by waiter ticket:
//!          1. pop idle tokens until one accepts the job
//!          2. current_workers < max  ─► spawn a worker bound to the job
//!          3. queue.len() < capacity ─► enqueue
//!          4. NonBlocking ─► QueueFull
//!             Blocking    ─► wait on `space_available`, retry from 1
//! ```
//!
//! `space_available` is notified whenever a retry could succeed: a queue pop,
//! a worker going idle, a worker retiring, a waiter leaving, shutdown.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use super::config::PoolConfig;
use super::stats::{PoolCounters, PoolStats};
use super::task::Job;
use super::worker::{self, IdleToken, Phase, WorkerSlot};
use super::SubmitMode;
use crate::ds::HandoffStack;
use crate::error::SubmitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownMode {
    Drain,
    Cancel,
}

struct WorkerEntry {
    slot: Arc<WorkerSlot>,
    handle: JoinHandle<()>,
}

pub(crate) struct State {
    pub(crate) queue: VecDeque<Job>,
    pub(crate) current_workers: usize,
    pub(crate) shutdown: Option<ShutdownMode>,
    waiters: VecDeque<u64>,
    next_ticket: u64,
    workers: Vec<WorkerEntry>,
}

pub(crate) struct Shared {
    pub(crate) config: PoolConfig,
    pub(crate) state: Mutex<State>,
    pub(crate) space_available: Condvar,
    pub(crate) idle: HandoffStack<IdleToken>,
    pub(crate) counters: PoolCounters,
    pub(crate) last_error: Mutex<Option<String>>,
    pub(crate) cancelled: Arc<AtomicBool>,
    shutting_down: AtomicBool,
    waiting: AtomicUsize,
    next_task_id: AtomicU64,
    next_worker_id: AtomicU64,
}

impl Shared {
    pub(crate) fn new(config: PoolConfig) -> Self {
        let queue = VecDeque::with_capacity(config.queue_capacity.min(4096));
        Self {
            state: Mutex::new(State {
                queue,
                current_workers: 0,
                shutdown: None,
                waiters: VecDeque::new(),
                next_ticket: 0,
                workers: Vec::with_capacity(config.max_workers),
            }),
            config,
            space_available: Condvar::new(),
            idle: HandoffStack::new(),
            counters: PoolCounters::default(),
            last_error: Mutex::new(None),
            cancelled: Arc::new(AtomicBool::new(false)),
            shutting_down: AtomicBool::new(false),
            waiting: AtomicUsize::new(0),
            next_task_id: AtomicU64::new(0),
            next_worker_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn next_task_id(&self) -> u64 {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Starts the resident workers, each registered idle before its thread
    /// runs so the first `min_workers` submits are handed off directly.
    pub(crate) fn start(self: &Arc<Self>) -> std::io::Result<()> {
        let mut state = self.state.lock();
        for _ in 0..self.config.min_workers {
            self.spawn_worker(&mut state, None)
                .map_err(|(err, _)| err)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    pub(crate) fn dispatch(self: &Arc<Self>, mut job: Job, mode: SubmitMode) -> Result<(), SubmitError> {
        if !self.shutting_down.load(Ordering::Acquire) && self.waiting.load(Ordering::Acquire) == 0 {
            match self.handoff(job) {
                Ok(()) => return Ok(()),
                Err(returned) => job = returned,
            }
        }

        let mut state = self.state.lock();
        let mut ticket: Option<u64> = None;

        let result = loop {
            if state.shutdown.is_some() {
                break Err(SubmitError::Cancelled);
            }

            let my_turn = match ticket {
                None => state.waiters.is_empty(),
                Some(t) => state.waiters.front() == Some(&t),
            };
            if my_turn {
                match self.place(&mut state, job) {
                    Ok(()) => break Ok(()),
                    Err(returned) => job = returned,
                }
            }

            let deadline = match mode {
                SubmitMode::NonBlocking => break Err(SubmitError::QueueFull),
                SubmitMode::Blocking => None,
                SubmitMode::BlockingUntil(deadline) => Some(deadline),
            };

            if ticket.is_none() {
                let t = state.next_ticket;
                state.next_ticket += 1;
                state.waiters.push_back(t);
                self.waiting.fetch_add(1, Ordering::AcqRel);
                ticket = Some(t);
            }

            match deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        break Err(SubmitError::TimedOut);
                    }
                    self.space_available.wait_until(&mut state, deadline);
                },
                None => self.space_available.wait(&mut state),
            }
        };

        if let Some(t) = ticket {
            state.waiters.retain(|w| *w != t);
            self.waiting.fetch_sub(1, Ordering::AcqRel);
            drop(state);
            // The next waiter in line may now be at the front.
            self.space_available.notify_all();
        }

        result
    }

    /// Lock-free handoff to an idle worker.
    fn handoff(&self, mut job: Job) -> Result<(), Job> {
        while let Some(token) = self.idle.pop() {
            match token.try_assign(job) {
                Ok(()) => return Ok(()),
                Err(returned) => job = returned,
            }
        }
        Err(job)
    }

    /// Idle handoff, then spawn, then enqueue. Caller holds the state lock.
    fn place(self: &Arc<Self>, state: &mut State, job: Job) -> Result<(), Job> {
        let mut job = match self.handoff(job) {
            Ok(()) => return Ok(()),
            Err(job) => job,
        };

        if state.current_workers < self.config.max_workers {
            match self.spawn_worker(state, Some(job)) {
                Ok(_) => return Ok(()),
                Err((_, Some(returned))) => job = returned,
                // Not reached: a thread that never started cannot have
                // taken the job out of its slot.
                Err((_, None)) => return Ok(()),
            }
        }

        if state.queue.len() < self.config.queue_capacity {
            state.queue.push_back(job);
            return Ok(());
        }
        Err(job)
    }

    // -----------------------------------------------------------------------
    // Worker lifecycle
    // -----------------------------------------------------------------------

    /// Spawns a worker, either bound to `first` or registered idle.
    ///
    /// On failure the unstarted job is handed back alongside the error.
    pub(crate) fn spawn_worker(
        self: &Arc<Self>,
        state: &mut State,
        first: Option<Job>,
    ) -> Result<u64, (std::io::Error, Option<Job>)> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(match first {
            Some(job) => WorkerSlot::assigned(id, job),
            None => WorkerSlot::idle(id),
        });

        let mut builder = thread::Builder::new().name(format!("{}-{}", self.config.thread_name, id));
        if let Some(size) = self.config.stack_size {
            builder = builder.stack_size(size);
        }

        let shared = Arc::clone(self);
        let worker_slot = Arc::clone(&slot);
        let handle = match builder.spawn(move || worker::run(shared, worker_slot)) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(worker = id, error = %err, "failed to spawn worker thread");
                return Err((err, slot.take_task()));
            },
        };

        // The new thread blocks on the state lock we hold, so the token is
        // visible before it first looks at its slot.
        if let Some(token) = slot.token() {
            self.idle.push(token);
        }

        state.current_workers += 1;
        self.counters.record_spawn(state.current_workers);
        state.workers.retain(|w| !w.handle.is_finished());
        state.workers.push(WorkerEntry { slot, handle });
        debug!(worker = id, current_workers = state.current_workers, "spawned worker");
        Ok(id)
    }

    /// Removes a worker from the live count. Caller holds the state lock and
    /// has already marked the slot retired.
    pub(crate) fn retire_locked(&self, state: &mut State, worker: u64, reason: &'static str) {
        state.current_workers = state.current_workers.saturating_sub(1);
        self.counters.inc_retired();
        debug!(worker, reason, current_workers = state.current_workers, "worker retired");
        self.space_available.notify_all();
    }

    // -----------------------------------------------------------------------
    // Stats & shutdown
    // -----------------------------------------------------------------------

    pub(crate) fn stats(&self) -> PoolStats {
        let mut stats = PoolStats {
            min_workers: self.config.min_workers,
            max_workers: self.config.max_workers,
            queue_capacity: self.config.queue_capacity,
            ..PoolStats::default()
        };
        {
            let state = self.state.lock();
            stats.current_workers = state.current_workers;
            stats.queued = state.queue.len();
            stats.idle_workers = state
                .workers
                .iter()
                .filter(|w| w.slot.phase() == Phase::Idle)
                .count();
        }
        self.counters.fill(&mut stats);
        stats.last_error = self.last_error.lock().clone();
        stats
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Stops accepting work and joins every worker.
    ///
    /// Only the first call does anything; later calls return immediately.
    pub(crate) fn shutdown(&self, drain: bool) {
        let mode = if drain {
            ShutdownMode::Drain
        } else {
            ShutdownMode::Cancel
        };

        let (discarded, workers) = {
            let mut state = self.state.lock();
            if state.shutdown.is_some() {
                return;
            }
            info!(?mode, queued = state.queue.len(), "pool shutting down");
            state.shutdown = Some(mode);
            self.shutting_down.store(true, Ordering::Release);

            let discarded: Vec<Job> = match mode {
                ShutdownMode::Cancel => {
                    self.cancelled.store(true, Ordering::Release);
                    state.queue.drain(..).collect()
                },
                ShutdownMode::Drain => Vec::new(),
            };
            for entry in &state.workers {
                entry.slot.kick();
            }
            (discarded, std::mem::take(&mut state.workers))
        };
        self.space_available.notify_all();

        // Dropping the jobs drops their senders; handles see `Cancelled`.
        if !discarded.is_empty() {
            self.counters.add_cancelled(discarded.len() as u64);
            debug!(count = discarded.len(), "discarded queued tasks");
        }
        drop(discarded);

        let current = thread::current().id();
        for entry in workers {
            if entry.handle.thread().id() == current {
                continue;
            }
            if entry.handle.join().is_err() {
                warn!(worker = entry.slot.id(), "worker thread panicked outside a task");
            }
        }

        // Tokens of exited workers are stale; release their slots.
        drop(self.idle.drain());
        info!("pool shut down");
    }
}
