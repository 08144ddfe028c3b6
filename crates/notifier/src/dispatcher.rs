//! Bounded async dispatcher for detached notification tasks.
//!
//! `submit` spawns immediately and returns; the spawned task then waits for
//! one of `max_concurrent` semaphore permits. The body runs in a nested
//! tokio task so a panic surfaces as a `JoinError` instead of unwinding
//! through the slot holder. The permit is an `OwnedSemaphorePermit` held by
//! the outer task and dropped on every exit path.
//!
//! There is no cancellation or timeout here. A transport that never answers
//! holds its slot until it does; `ResendMailer` bounds this with its own
//! request timeout.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::{Notify, Semaphore, mpsc};

use crate::executor::{Completion, TaskExecutor};
use crate::task::{NotificationTask, TaskKind};

/// Slot count used when the caller does not configure one.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Terminal state of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    /// Transport unconfigured or nobody to notify.
    Skipped,
    Failed,
    /// The task body panicked; the panic was contained.
    FaultRecovered,
}

/// Emitted once per task after its slot has been released.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub kind: TaskKind,
    pub message_id: i64,
    pub outcome: TaskOutcome,
    pub elapsed: Duration,
}

/// Fire-and-forget executor with a hard ceiling on concurrent execution.
///
/// Cheap to clone; clones share slots and counters.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    executor: Arc<dyn TaskExecutor>,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
    pending: AtomicUsize,
    idle: Notify,
    reporter: Option<mpsc::UnboundedSender<DispatchReport>>,
    runtime: Handle,
}

impl Dispatcher {
    /// Create a dispatcher with `max_concurrent` slots (0 is treated as 1).
    ///
    /// Must be called from within a tokio runtime; tasks are spawned onto it.
    pub fn new(executor: Arc<dyn TaskExecutor>, max_concurrent: usize) -> Self {
        Self::build(executor, max_concurrent, None)
    }

    /// Like [`Dispatcher::new`], additionally sending a [`DispatchReport`]
    /// for every finished task.
    pub fn with_reporter(
        executor: Arc<dyn TaskExecutor>,
        max_concurrent: usize,
        reporter: mpsc::UnboundedSender<DispatchReport>,
    ) -> Self {
        Self::build(executor, max_concurrent, Some(reporter))
    }

    fn build(
        executor: Arc<dyn TaskExecutor>,
        max_concurrent: usize,
        reporter: Option<mpsc::UnboundedSender<DispatchReport>>,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                executor,
                slots: Arc::new(Semaphore::new(max_concurrent)),
                max_concurrent,
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                reporter,
                runtime: Handle::current(),
            }),
        }
    }

    /// Detach `task`. Returns immediately; the task waits for a slot on its own.
    pub fn submit(&self, task: NotificationTask) {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.clone();
        self.inner.runtime.spawn(async move {
            let _pending = PendingGuard(&inner);
            inner.run(task).await;
        });
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.max_concurrent
    }

    /// Tasks currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.inner.max_concurrent - self.inner.slots.available_permits()
    }

    /// Tasks submitted and not yet finished, waiting or executing.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Resolve once every submitted task has finished and released its slot.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Inner {
    async fn run(&self, task: NotificationTask) {
        let kind = task.kind;
        let message_id = task.message_id;

        let permit = match self.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Only possible if the semaphore were closed, which nothing does.
                tracing::error!(%kind, message_id, "Dispatch slots closed, dropping task");
                return;
            }
        };

        let started = Instant::now();
        let executor = self.executor.clone();
        let joined = self
            .runtime
            .spawn(async move { executor.execute(&task).await })
            .await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;

        let outcome = match joined {
            Ok(Ok(Completion::Delivered)) => {
                tracing::info!(%kind, message_id, elapsed_ms, "Notification sent");
                TaskOutcome::Succeeded
            }
            Ok(Ok(Completion::Unconfigured)) => {
                tracing::warn!(
                    %kind,
                    message_id,
                    "Mail transport not configured, notification skipped"
                );
                TaskOutcome::Skipped
            }
            Ok(Ok(Completion::NoRecipient)) => {
                tracing::debug!(%kind, message_id, "No recipient, notification skipped");
                TaskOutcome::Skipped
            }
            Ok(Err(e)) => {
                tracing::error!(
                    %kind,
                    message_id,
                    elapsed_ms,
                    error = %e,
                    "Notification failed"
                );
                TaskOutcome::Failed
            }
            Err(join_err) => {
                let reason = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "task cancelled".to_string()
                };
                tracing::error!(
                    %kind,
                    message_id,
                    elapsed_ms,
                    error = %reason,
                    "Notification task faulted"
                );
                TaskOutcome::FaultRecovered
            }
        };

        drop(permit);

        if let Some(reporter) = &self.reporter {
            let _ = reporter.send(DispatchReport {
                kind,
                message_id,
                outcome,
                elapsed,
            });
        }
    }
}

/// Decrements the pending count when a spawned task ends, however it ends.
struct PendingGuard<'a>(&'a Inner);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
