/*!
 * Launch Strategies
 *
 * How [`Deadline::run`](crate::Deadline::run) starts a task concurrently:
 * - **SpawnLauncher**: a fresh thread per task (default)
 * - **WorkerPool**: bounded worker threads; abandons queued launches once the
 *   deadline expires
 * - Any `Fn(DoneHandle, Task)` closure, e.g. to hand work to an external pool
 */

mod config;
mod pool;
mod spawn;
mod traits;

pub use config::WorkerPoolConfig;
pub use pool::{WorkerPool, WorkerPoolStats};
pub use spawn::SpawnLauncher;
pub use traits::{Launch, Task};
