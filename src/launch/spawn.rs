/*!
 * Thread-Spawning Launcher
 *
 * Default strategy: one named OS thread per task, no pooling.
 */

use super::traits::{Launch, Task};
use crate::core::limits::SPAWN_THREAD_NAME;
use crate::sync::DoneHandle;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use tracing::warn;

/// Launch each task on a fresh thread
#[derive(Debug, Clone, Default)]
pub struct SpawnLauncher {
    stack_size: Option<usize>,
}

impl SpawnLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stack size for spawned threads
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }
}

impl Launch for SpawnLauncher {
    /// If the OS refuses to spawn, the task runs inline on the caller's
    /// thread so that `run` still observes its completion.
    fn launch(&self, _cancel: DoneHandle, task: Task) {
        let mut builder = thread::Builder::new().name(SPAWN_THREAD_NAME.to_string());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }

        // Keep ownership here so a failed spawn can still run the task.
        let slot = Arc::new(Mutex::new(Some(task)));
        let spawned = Arc::clone(&slot);
        let result = builder.spawn(move || {
            let task = spawned.lock().take();
            if let Some(task) = task {
                task();
            }
        });

        if let Err(e) = result {
            warn!(error = %e, "Thread spawn failed, running task inline");
            let task = slot.lock().take();
            if let Some(task) = task {
                task();
            }
        }
    }

    fn name(&self) -> &'static str {
        "spawn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::Signal;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_runs_on_named_thread() {
        let cancel = DoneHandle::new(Arc::new(Signal::new()));
        let (tx, rx) = flume::bounded(1);

        SpawnLauncher::new().launch(
            cancel,
            Box::new(move || {
                let name = thread::current().name().map(str::to_owned);
                let _ = tx.send(name);
            }),
        );

        let name = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(name.as_deref(), Some(SPAWN_THREAD_NAME));
    }

    #[test]
    fn test_ignores_closed_cancel() {
        let signal = Arc::new(Signal::new());
        signal.close();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let (tx, rx) = flume::bounded(1);

        SpawnLauncher::new().launch(
            DoneHandle::new(signal),
            Box::new(move || {
                flag.store(true, Ordering::SeqCst);
                let _ = tx.send(());
            }),
        );

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
