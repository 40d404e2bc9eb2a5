/*!
 * Deadline Kit
 * Resettable deadlines with broadcast expiration for running work off-thread
 *
 * - **Deadline**: set, move or clear a point in time from any thread;
 *   observe it through `done()` or race a task against it with `run()`
 * - **Signals**: one-shot broadcast events, pooled to avoid allocation churn
 * - **Timers**: resettable alarms firing on a dedicated service thread
 * - **Launchers**: pluggable strategies for starting tasks
 */

pub mod core;
pub mod deadline;
pub mod launch;
pub mod monitoring;
pub mod sync;
pub mod timer;

// Re-exports
pub use crate::core::errors::{DeadlineExceeded, DeadlineResult, LaunchError, LaunchResult};
pub use deadline::{run_until, Deadline, DeadlineBuilder};
pub use launch::{Launch, SpawnLauncher, Task, WorkerPool, WorkerPoolConfig};
pub use monitoring::init_tracing;
pub use sync::{DoneHandle, PoolConfig, PoolStats, SignalPool};
pub use timer::{StopOutcome, Timer, TimerService};
