/*!
 * Limits and Constants
 *
 * Centralized defaults for pooling, timers and launchers.
 * Performance-critical constants are marked with [PERF].
 */

use std::time::Duration;

// =============================================================================
// SIGNAL POOL
// =============================================================================

/// Idle signals kept per pool (256)
/// [PERF] Enough to absorb bursts of concurrent `run` calls without allocating
pub const DEFAULT_SIGNAL_POOL_CAPACITY: usize = 256;

// =============================================================================
// TIMER SERVICE
// =============================================================================

/// Name of the process-wide timer thread
pub const GLOBAL_TIMER_THREAD_NAME: &str = "deadline-timer";

/// Heap size below which stale timer entries are never compacted (64)
/// [PERF] Stale entries are normally popped when due; compaction only matters
/// when deadlines are pushed far out many times in a row
pub const TIMER_COMPACTION_FLOOR: usize = 64;

// =============================================================================
// LAUNCHERS
// =============================================================================

/// Thread name prefix used by the spawning launcher
pub const SPAWN_THREAD_NAME: &str = "deadline-task";

/// Thread name prefix for worker pool threads
pub const WORKER_THREAD_PREFIX: &str = "deadline-worker";

/// Default worker pool queue depth (64)
pub const DEFAULT_WORKER_QUEUE_CAPACITY: usize = 64;

/// Fallback worker count when parallelism cannot be queried (4)
pub const DEFAULT_WORKER_COUNT: usize = 4;

/// How long a saturated worker pool blocks before re-checking cancellation (1ms)
/// [PERF] Bounds how late an abandoned launch notices an expired deadline
pub const DEFAULT_LAUNCH_RETRY_INTERVAL: Duration = Duration::from_millis(1);
