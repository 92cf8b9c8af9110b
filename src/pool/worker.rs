//! Worker slots, idle tokens and the per-worker run loop.
//!
//! ## Slot phases
//!
//! ```text
//!            mark_idle (push token gen=g)
//!   ┌──────┐ ─────────────────────────────► ┌──────────┐
//!   │ Busy │                                │ Idle(g)  │
//!   └──────┘ ◄──── take_assigned ─────┐     └────┬─────┘
//!      ▲                              │          │ try_assign(g)   retire
//!      │ queue pop                ┌───┴──────┐   │                ───────►  Retired
//!      └───────────────────────── │ Assigned │ ◄─┘
//!                                 └──────────┘
//! ```
//!
//! A token carries the generation it was issued for. Every transition out of
//! `Idle` invalidates outstanding tokens, so a dispatcher holding a stale
//! token fails `try_assign` and moves on to the next one.
//!
//! Lock order: pool state, then slot. A worker parks on its slot's condvar
//! while holding only the slot lock.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::shared::{Shared, ShutdownMode};
use super::task::Job;
use crate::error::TaskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Busy,
    Idle,
    Assigned,
    Retired,
}

struct SlotInner {
    phase: Phase,
    generation: u64,
    idle_since: Instant,
    task: Option<Job>,
}

pub(crate) struct WorkerSlot {
    id: u64,
    inner: Mutex<SlotInner>,
    wake: Condvar,
}

/// Claim ticket for one idle period of one worker.
pub(crate) struct IdleToken {
    slot: Arc<WorkerSlot>,
    generation: u64,
}

impl IdleToken {
    /// Hands `job` to the worker if it is still idle in this token's
    /// generation. Gives the job back otherwise.
    pub(crate) fn try_assign(self, job: Job) -> Result<(), Job> {
        let mut inner = self.slot.inner.lock();
        if inner.phase != Phase::Idle || inner.generation != self.generation {
            return Err(job);
        }
        inner.phase = Phase::Assigned;
        inner.task = Some(job);
        drop(inner);
        self.slot.wake.notify_one();
        Ok(())
    }
}

impl WorkerSlot {
    /// A slot that starts out holding `job`.
    pub(crate) fn assigned(id: u64, job: Job) -> Self {
        Self::with_inner(id, Phase::Assigned, Some(job))
    }

    /// A slot that starts out idle. The caller must publish its token.
    pub(crate) fn idle(id: u64) -> Self {
        Self::with_inner(id, Phase::Idle, None)
    }

    fn with_inner(id: u64, phase: Phase, task: Option<Job>) -> Self {
        Self {
            id,
            inner: Mutex::new(SlotInner {
                phase,
                generation: 0,
                idle_since: Instant::now(),
                task,
            }),
            wake: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn phase(&self) -> Phase {
        self.inner.lock().phase
    }

    /// Token for the current idle generation, if the slot is idle.
    pub(crate) fn token(self: &Arc<Self>) -> Option<IdleToken> {
        let inner = self.inner.lock();
        (inner.phase == Phase::Idle).then(|| IdleToken {
            slot: Arc::clone(self),
            generation: inner.generation,
        })
    }

    /// Takes back a job that was never picked up (spawn failed).
    pub(crate) fn take_task(&self) -> Option<Job> {
        let mut inner = self.inner.lock();
        inner.phase = Phase::Retired;
        inner.task.take()
    }

    /// Wakes the worker so it re-checks pool state.
    pub(crate) fn kick(&self) {
        let _inner = self.inner.lock();
        self.wake.notify_one();
    }
}

/// Worker thread entry point.
pub(crate) fn run(shared: Arc<Shared>, slot: Arc<WorkerSlot>) {
    debug!(worker = slot.id, "worker started");
    let mut consecutive_failures = 0u32;

    while let Some(job) = shared.next_job(&slot) {
        if shared.run_job(job) {
            consecutive_failures = 0;
            continue;
        }
        consecutive_failures += 1;
        if consecutive_failures >= shared.config.failure_threshold {
            if shared.replace_worker(&slot, consecutive_failures) {
                return;
            }
            consecutive_failures = 0;
        }
    }
}

impl Shared {
    /// Blocks until this worker has a job, or returns `None` once it has
    /// retired (idle timeout or shutdown).
    pub(crate) fn next_job(&self, slot: &Arc<WorkerSlot>) -> Option<Job> {
        let idle_timeout = self.config.idle_timeout;
        let mut state = self.state.lock();
        loop {
            let mut inner = slot.inner.lock();

            if inner.phase == Phase::Assigned {
                inner.phase = Phase::Busy;
                return inner.task.take();
            }

            if state.shutdown != Some(ShutdownMode::Cancel) {
                if let Some(job) = state.queue.pop_front() {
                    inner.phase = Phase::Busy;
                    drop(inner);
                    drop(state);
                    self.space_available.notify_all();
                    return Some(job);
                }
            }

            if state.shutdown.is_some() {
                inner.phase = Phase::Retired;
                drop(inner);
                self.retire_locked(&mut state, slot.id, "shutdown");
                return None;
            }

            if inner.phase != Phase::Idle {
                inner.phase = Phase::Idle;
                inner.generation += 1;
                inner.idle_since = Instant::now();
                self.idle.push(IdleToken {
                    slot: Arc::clone(slot),
                    generation: inner.generation,
                });
                self.space_available.notify_all();
            } else if state.current_workers > self.config.min_workers
                && inner.idle_since.elapsed() >= idle_timeout
            {
                inner.phase = Phase::Retired;
                drop(inner);
                self.retire_locked(&mut state, slot.id, "idle timeout");
                return None;
            }

            drop(state);

            // Surplus workers wake at their retirement deadline; resident
            // workers at `min` just re-check once per timeout period.
            let now = Instant::now();
            let deadline = inner
                .idle_since
                .checked_add(idle_timeout)
                .filter(|d| *d > now)
                .or_else(|| now.checked_add(idle_timeout));
            match deadline {
                Some(deadline) => {
                    slot.wake.wait_until(&mut inner, deadline);
                },
                None => slot.wake.wait(&mut inner),
            }
            drop(inner);

            state = self.state.lock();
        }
    }

    /// Runs one job behind `catch_unwind` and delivers its outcome.
    ///
    /// Returns `true` if the task succeeded.
    pub(crate) fn run_job(&self, job: Job) -> bool {
        let task = job.id();
        let Job {
            ctx,
            run,
            result_tx,
        } = job;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| run(&ctx))) {
            Ok(result) => result,
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        };

        let succeeded = match &outcome {
            Ok(()) => {
                self.counters.inc_completed();
                true
            },
            Err(err) => {
                self.counters
                    .inc_failed(matches!(err, TaskError::Panicked(_)));
                debug!(%task, error = %err, "task failed");
                *self.last_error.lock() = Some(err.to_string());
                false
            },
        };

        // The submitter may have dropped its handle.
        let _ = result_tx.send(outcome);
        succeeded
    }

    /// Swaps this worker for a fresh one. Returns `true` if the caller
    /// should exit.
    fn replace_worker(self: &Arc<Self>, slot: &Arc<WorkerSlot>, failures: u32) -> bool {
        let mut state = self.state.lock();
        if state.shutdown.is_some() {
            return false;
        }
        // Give up our place first so the live count never exceeds max.
        state.current_workers -= 1;
        match self.spawn_worker(&mut state, None) {
            Ok(new_id) => {
                warn!(
                    worker = slot.id,
                    replacement = new_id,
                    consecutive_failures = failures,
                    "replacing failing worker"
                );
                self.counters.inc_replaced();
                slot.inner.lock().phase = Phase::Retired;
                self.counters.inc_retired();
                true
            },
            Err((err, _)) => {
                state.current_workers += 1;
                warn!(worker = slot.id, error = %err, "could not spawn replacement worker");
                false
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
