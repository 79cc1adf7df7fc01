//! Task spawning seam between the router and the runtime.
//!
//! The router never calls `tokio::spawn` directly. Production code injects
//! [`TokioSpawner`]; tests inject [`ManualSpawner`] and decide when queued
//! handler tasks run.

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::Mutex,
    time::Instant,
};

use {
    futures::{
        FutureExt,
        future::{BoxFuture, join_all},
    },
    tracing::{debug, error, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, histogram, labels, routing as routing_metrics};

/// A unit of handler work, labelled with the handler name.
pub struct Task {
    pub label: String,
    pub future: BoxFuture<'static, anyhow::Result<()>>,
}

impl Task {
    pub fn new(label: impl Into<String>, future: BoxFuture<'static, anyhow::Result<()>>) -> Self {
        Self {
            label: label.into(),
            future,
        }
    }
}

/// Fire-and-forget task execution.
pub trait Spawner: Send + Sync {
    fn spawn(&self, task: Task);
}

/// Run a task to completion, containing its failure.
///
/// Errors and panics are logged with the task label and never propagate, so
/// one failing handler cannot take down the dispatcher or its siblings.
/// Returns whether the task finished cleanly.
pub async fn supervise(task: Task) -> bool {
    let Task { label, future } = task;
    let started = Instant::now();
    let outcome = AssertUnwindSafe(future).catch_unwind().await;
    let elapsed = started.elapsed();

    let succeeded = match outcome {
        Ok(Ok(())) => {
            debug!(handler = %label, elapsed_ms = elapsed.as_millis() as u64, "handler finished");
            true
        },
        Ok(Err(e)) => {
            warn!(handler = %label, error = %e, "handler failed");
            false
        },
        Err(panic) => {
            error!(handler = %label, panic = %panic_message(&*panic), "handler panicked");
            false
        },
    };

    #[cfg(feature = "metrics")]
    {
        histogram!(routing_metrics::TASK_DURATION_SECONDS, labels::HANDLER => label.clone())
            .record(elapsed.as_secs_f64());
        if !succeeded {
            counter!(routing_metrics::TASK_FAILURES_TOTAL, labels::HANDLER => label)
                .increment(1);
        }
    }

    succeeded
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Spawns onto the tokio runtime current at each `spawn` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl TokioSpawner {
    pub fn new() -> Self {
        Self
    }
}

impl Spawner for TokioSpawner {
    fn spawn(&self, task: Task) {
        #[cfg(feature = "metrics")]
        counter!(routing_metrics::TASKS_SPAWNED_TOTAL).increment(1);

        tokio::spawn(supervise(task));
    }
}

/// Deterministic spawner: queues tasks until the caller runs them.
#[derive(Default)]
pub struct ManualSpawner {
    queue: Mutex<Vec<Task>>,
}

impl ManualSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels of queued tasks, in spawn order.
    pub fn pending_labels(&self) -> Vec<String> {
        self.lock().iter().map(|t| t.label.clone()).collect()
    }

    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Remove and return every queued task without running it.
    pub fn take(&self) -> Vec<Task> {
        std::mem::take(&mut *self.lock())
    }

    /// Run queued tasks until the queue stays empty. Tasks from one batch are
    /// polled concurrently, first poll in spawn order. Returns how many ran.
    pub async fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            let batch = self.take();
            if batch.is_empty() {
                return ran;
            }
            ran += batch.len();
            join_all(batch.into_iter().map(supervise)).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Task>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Spawner for ManualSpawner {
    fn spawn(&self, task: Task) {
        debug!(handler = %task.label, "task queued");
        self.lock().push(task);
    }
}
