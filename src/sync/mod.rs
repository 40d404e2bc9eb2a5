/*!
 * Synchronization Primitives
 *
 * Building blocks for deadline handling:
 * - One-shot broadcast signals with blocking, timed and async waits
 * - Two-way select used to race task completion against expiry
 * - A free list recycling signals on hot paths
 *
 * # Use Cases
 *
 * - **Expiration**: one signal per deadline, shared by every observer
 * - **Completion**: one signal per launched task, closed when it returns
 */

mod config;
mod pool;
mod signal;

pub use config::PoolConfig;
pub use pool::{PoolStats, SignalPool};
pub use signal::{select, select_deadline, Closed, DoneHandle, Either, Signal};
