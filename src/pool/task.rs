//! Tasks, per-task context and result handles.
//!
//! ```text
//!   submit(Task) ──► Job { ctx, run, result_tx } ──► worker
//!        │                                 │
//!        ▼                                 ▼ send(Result)
//!   TaskHandle { id, result_rx } ◄──── one-shot flume channel
//! ```
//!
//! A job dropped without running (queue discarded on cancel, submit
//! refused) drops its sender, and the handle resolves to
//! [`TaskError::Cancelled`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::TaskError;

/// Monotonic per-pool task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

type TaskFn = Box<dyn FnOnce(&TaskContext) -> Result<(), TaskError> + Send + 'static>;

/// A unit of work plus optional deadline metadata.
///
/// The deadline is informational: the pool never drops or interrupts a task
/// because of it. Tasks can consult [`TaskContext::is_past_deadline`].
pub struct Task {
    run: TaskFn,
    deadline: Option<Instant>,
}

impl Task {
    /// Wraps a fallible closure.
    ///
    /// ```
    /// use surgekit::pool::Task;
    /// use surgekit::error::TaskError;
    ///
    /// let task = Task::new(|ctx| {
    ///     if ctx.is_cancelled() {
    ///         return Err(TaskError::Cancelled);
    ///     }
    ///     Ok(())
    /// });
    /// # drop(task);
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&TaskContext) -> Result<(), TaskError> + Send + 'static,
    {
        Self {
            run: Box::new(f),
            deadline: None,
        }
    }

    /// Wraps an infallible closure that ignores its context.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::new(move |_| {
            f();
            Ok(())
        })
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Binds the task to its pool-assigned id and the pool's cancel flag.
    pub(crate) fn into_job(self, id: TaskId, cancelled: Arc<AtomicBool>) -> (Job, TaskHandle) {
        let (result_tx, result_rx) = flume::bounded(1);
        let ctx = TaskContext {
            id,
            submitted_at: Instant::now(),
            deadline: self.deadline,
            cancelled,
        };
        let job = Job {
            ctx,
            run: self.run,
            result_tx,
        };
        let handle = TaskHandle {
            id,
            result_rx,
            outcome: None,
        };
        (job, handle)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Read-only view a running task gets of itself and its pool.
#[derive(Debug, Clone)]
pub struct TaskContext {
    id: TaskId,
    submitted_at: Instant,
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl TaskContext {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once the pool has been shut down without draining.
    ///
    /// Long-running tasks should poll this and return early.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// A task bound to its context and result channel, ready to run.
pub(crate) struct Job {
    pub(crate) ctx: TaskContext,
    pub(crate) run: TaskFn,
    pub(crate) result_tx: flume::Sender<Result<(), TaskError>>,
}

impl Job {
    pub(crate) fn id(&self) -> TaskId {
        self.ctx.id
    }
}

/// Receives the outcome of one submitted task.
///
/// The outcome is cached after the first successful read, so repeated
/// `try_result` calls keep returning it.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    result_rx: flume::Receiver<Result<(), TaskError>>,
    outcome: Option<Result<(), TaskError>>,
}

impl TaskHandle {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Blocks until the task finishes.
    ///
    /// Returns [`TaskError::Cancelled`] if the task was discarded unrun.
    pub fn wait(mut self) -> Result<(), TaskError> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        self.result_rx.recv().unwrap_or(Err(TaskError::Cancelled))
    }

    /// Waits up to `timeout`; `None` if the task is still pending.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<(), TaskError>> {
        if self.outcome.is_none() {
            self.outcome = match self.result_rx.recv_timeout(timeout) {
                Ok(outcome) => Some(outcome),
                Err(flume::RecvTimeoutError::Timeout) => None,
                Err(flume::RecvTimeoutError::Disconnected) => Some(Err(TaskError::Cancelled)),
            };
        }
        self.outcome.clone()
    }

    /// Returns the outcome if the task already finished.
    pub fn try_result(&mut self) -> Option<Result<(), TaskError>> {
        if self.outcome.is_none() {
            self.outcome = match self.result_rx.try_recv() {
                Ok(outcome) => Some(outcome),
                Err(flume::TryRecvError::Empty) => None,
                Err(flume::TryRecvError::Disconnected) => Some(Err(TaskError::Cancelled)),
            };
        }
        self.outcome.clone()
    }
}
