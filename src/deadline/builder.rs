/*!
 * Deadline Builder
 */

use super::controller::Deadline;
use crate::launch::{Launch, SpawnLauncher};
use crate::sync::SignalPool;
use crate::timer::TimerService;
use std::sync::Arc;
use tracing::trace;

/// Builder for [`Deadline`]
///
/// Anything not configured falls back to the process-wide defaults: the
/// thread-spawning launcher, the global signal pool and the global timer
/// service.
#[derive(Default)]
pub struct DeadlineBuilder {
    launcher: Option<Arc<dyn Launch>>,
    pool: Option<Arc<SignalPool>>,
    timers: Option<TimerService>,
}

impl DeadlineBuilder {
    /// Create a new Deadline builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch tasks through `launcher` instead of spawning threads
    pub fn with_launcher<L>(mut self, launcher: L) -> Self
    where
        L: Launch + 'static,
    {
        self.launcher = Some(Arc::new(launcher));
        self
    }

    /// Share one launcher (e.g. a worker pool) between controllers
    pub fn with_shared_launcher(mut self, launcher: Arc<dyn Launch>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Draw signals from `pool` instead of the global pool
    pub fn with_pool(mut self, pool: Arc<SignalPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Drive expirations from `timers` instead of the global timer thread
    pub fn with_timer_service(mut self, timers: TimerService) -> Self {
        self.timers = Some(timers);
        self
    }

    /// Build the Deadline
    pub fn build(self) -> Deadline {
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(SpawnLauncher::new()));
        trace!(launcher = launcher.name(), "Deadline controller built");

        Deadline::from_parts(
            launcher,
            self.pool.unwrap_or_else(SignalPool::global),
            self.timers.unwrap_or_else(TimerService::global),
        )
    }
}
