/*!
 * Worker Pool Launcher
 *
 * Fixed set of worker threads fed by a bounded channel. When every worker is
 * busy and the queue is full, `launch` keeps retrying until it either enqueues
 * the task or the caller's deadline expires, in which case the task is
 * dropped without ever running.
 */

use super::config::WorkerPoolConfig;
use super::traits::{Launch, Task};
use crate::core::errors::LaunchResult;
use crate::core::limits::WORKER_THREAD_PREFIX;
use crate::sync::DoneHandle;
use flume::{Receiver, SendTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Snapshot of worker pool activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolStats {
    /// Tasks handed to `launch`
    pub submitted: u64,
    /// Tasks dropped because the deadline expired before a slot freed up
    pub abandoned: u64,
    /// Tasks that ran to completion (or panicked) on a worker
    pub executed: u64,
    /// Tasks that panicked
    pub panicked: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    abandoned: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
}

/// Bounded pool of worker threads
///
/// Dropping the pool lets queued tasks finish, then joins the workers.
pub struct WorkerPool {
    sender: Option<Sender<Task>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    retry_interval: Duration,
}

impl WorkerPool {
    /// Spawn `config.workers` threads
    pub fn new(config: WorkerPoolConfig) -> LaunchResult<Self> {
        config.validate()?;

        let (sender, receiver) = flume::bounded::<Task>(config.queue_capacity);
        let counters = Arc::new(Counters::default());

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(config.workers),
            counters,
            retry_interval: config.retry_interval,
        };

        for index in 0..config.workers {
            let receiver = receiver.clone();
            let counters = Arc::clone(&pool.counters);
            // On error `pool` drops here, which disconnects and joins the
            // workers spawned so far.
            let handle = thread::Builder::new()
                .name(format!("{WORKER_THREAD_PREFIX}-{index}"))
                .spawn(move || work(receiver, counters))?;
            pool.workers.push(handle);
        }

        debug!(
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Worker pool started"
        );
        Ok(pool)
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Tasks waiting for a free worker
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map(|s| s.len()).unwrap_or(0)
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            abandoned: self.counters.abandoned.load(Ordering::Relaxed),
            executed: self.counters.executed.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    fn abandon(&self, reason: &'static str) {
        self.counters.abandoned.fetch_add(1, Ordering::Relaxed);
        debug!(reason, "Worker pool abandoned task");
    }
}

impl Launch for WorkerPool {
    fn launch(&self, cancel: DoneHandle, task: Task) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let Some(sender) = &self.sender else {
            self.abandon("shut down");
            return;
        };

        let mut task = match sender.try_send(task) {
            Ok(()) => return,
            Err(TrySendError::Full(task)) => task,
            Err(TrySendError::Disconnected(_)) => {
                self.abandon("disconnected");
                return;
            }
        };

        loop {
            if cancel.is_closed() {
                self.abandon("deadline expired while saturated");
                return;
            }
            match sender.send_timeout(task, self.retry_interval) {
                Ok(()) => return,
                Err(SendTimeoutError::Timeout(pending)) => task = pending,
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.abandon("disconnected");
                    return;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "worker_pool"
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Worker thread exited abnormally");
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("queued", &self.queued())
            .field("stats", &self.stats())
            .finish()
    }
}

fn work(receiver: Receiver<Task>, counters: Arc<Counters>) {
    while let Ok(task) = receiver.recv() {
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            counters.panicked.fetch_add(1, Ordering::Relaxed);
            warn!("Task panicked on worker thread");
        }
        counters.executed.fetch_add(1, Ordering::Relaxed);
    }
}
