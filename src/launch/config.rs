/*!
 * Worker Pool Configuration
 */

use crate::core::errors::{LaunchError, LaunchResult};
use crate::core::limits::{
    DEFAULT_LAUNCH_RETRY_INTERVAL, DEFAULT_WORKER_COUNT, DEFAULT_WORKER_QUEUE_CAPACITY,
};
use std::time::Duration;

/// Worker pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of worker threads
    pub workers: usize,
    /// Tasks that may wait for a free worker
    pub queue_capacity: usize,
    /// Blocking slice between cancellation checks while the queue is full
    pub retry_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(DEFAULT_WORKER_COUNT);
        Self {
            workers,
            queue_capacity: DEFAULT_WORKER_QUEUE_CAPACITY,
            retry_interval: DEFAULT_LAUNCH_RETRY_INTERVAL,
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn validate(&self) -> LaunchResult<()> {
        if self.workers == 0 {
            return Err(LaunchError::InvalidConfig(
                "workers must be at least 1".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(LaunchError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.retry_interval.is_zero() {
            return Err(LaunchError::InvalidConfig(
                "retry_interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(WorkerPoolConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let config = WorkerPoolConfig::default().with_workers(0);
        assert!(matches!(
            config.validate(),
            Err(LaunchError::InvalidConfig(_))
        ));

        let config = WorkerPoolConfig::default().with_queue_capacity(0);
        assert!(config.validate().is_err());

        let config = WorkerPoolConfig::default().with_retry_interval(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
