/*!
 * Launch Traits
 *
 * Capability interface for starting a task concurrently with the caller.
 */

use crate::sync::DoneHandle;

/// Unit of work handed to a launcher
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Strategy for running a task concurrently with the caller of
/// [`Deadline::run`](crate::Deadline::run)
///
/// Implementations must either invoke `task` exactly once, or, if they cannot
/// start it (e.g. a saturated pool), watch `cancel` and drop `task` without
/// invoking it once `cancel` closes. `launch` may block while it waits for
/// capacity; `run` does not start waiting for completion until it returns.
pub trait Launch: Send + Sync {
    fn launch(&self, cancel: DoneHandle, task: Task);

    /// Strategy name for logging
    fn name(&self) -> &'static str {
        "custom"
    }
}

impl<F> Launch for F
where
    F: Fn(DoneHandle, Task) + Send + Sync,
{
    fn launch(&self, cancel: DoneHandle, task: Task) {
        self(cancel, task)
    }
}
