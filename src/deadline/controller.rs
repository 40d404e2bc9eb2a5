/*!
 * Deadline Controller
 *
 * Resettable deadline with a broadcast expiration signal, in the spirit of
 * socket read/write deadlines: the point in time can be moved any number of
 * times, from any thread, and every observer of `done()` sees it expire.
 *
 * # Single-writer protocol
 *
 * Everything that mutates the deadline, the timer or the current signal runs
 * under `state`. The timer callback does not take that lock; it reads the
 * current signal through `current` and closes it. `set` therefore stops the
 * timer first and, when the callback already fired or is firing, waits for
 * the signal to close before touching `current`. At no point can the callback
 * and `set` both write the same signal.
 */

use super::builder::DeadlineBuilder;
use crate::core::errors::{DeadlineExceeded, DeadlineResult};
use crate::launch::Launch;
use crate::sync::{select, DoneHandle, Either, Signal, SignalPool};
use crate::timer::{StopOutcome, Timer, TimerService};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

struct State {
    deadline: Option<Instant>,
    timer: Option<Timer>,
}

/// Resettable deadline for running tasks
///
/// # Examples
///
/// ```
/// use deadline_kit::Deadline;
/// use std::time::Duration;
///
/// let deadline = Deadline::new();
/// deadline.set_timeout(Duration::from_millis(200));
///
/// let result = deadline.run(|| std::thread::sleep(Duration::from_millis(5)));
/// assert!(result.is_ok());
///
/// deadline.set_timeout(Duration::from_millis(1));
/// let result = deadline.run(|| std::thread::sleep(Duration::from_millis(100)));
/// assert!(result.unwrap_err().is_timeout());
/// ```
pub struct Deadline {
    state: Mutex<State>,
    current: Arc<ArcSwapOption<Signal>>,
    launcher: Arc<dyn Launch>,
    pool: Arc<SignalPool>,
    timers: TimerService,
}

impl Deadline {
    /// Create a controller with default launcher, pool and timer service
    pub fn new() -> Self {
        DeadlineBuilder::new().build()
    }

    /// Create a builder for constructing a Deadline
    pub fn builder() -> DeadlineBuilder {
        DeadlineBuilder::new()
    }

    pub(super) fn from_parts(
        launcher: Arc<dyn Launch>,
        pool: Arc<SignalPool>,
        timers: TimerService,
    ) -> Self {
        Self {
            state: Mutex::new(State {
                deadline: None,
                timer: None,
            }),
            current: Arc::new(ArcSwapOption::empty()),
            launcher,
            pool,
            timers,
        }
    }

    /// Set or move the deadline; `None` clears it
    ///
    /// A signal handed out by `done()` before this call still closes when the
    /// new deadline passes, unless it had already expired, in which case new
    /// observers get a fresh signal. A deadline at or before now expires
    /// immediately. Clearing leaves the current signal as it is, with no
    /// timer armed.
    pub fn set(&self, deadline: Option<Instant>) {
        let mut state = self.state.lock();

        if let Some(timer) = &state.timer {
            if timer.stop() == StopOutcome::Fired {
                // The callback closes the signal unconditionally; wait for it
                // so it is never written by two parties.
                if let Some(signal) = self.current.load_full() {
                    signal.wait();
                }
            }
        }

        state.deadline = deadline;
        let Some(deadline) = deadline else {
            trace!("Deadline cleared");
            return;
        };

        let signal = self.open_signal();

        let now = Instant::now();
        if deadline <= now {
            signal.close();
            debug!(
                overdue_us = now.duration_since(deadline).as_micros() as u64,
                "Deadline already passed, expired immediately"
            );
            return;
        }

        let delay = deadline - now;
        match &state.timer {
            Some(timer) => {
                timer.reset(delay);
            }
            None => {
                let timer = self.expiry_timer();
                timer.reset(delay);
                state.timer = Some(timer);
            }
        }
        trace!(delay_us = delay.as_micros() as u64, "Deadline armed");
    }

    /// Set the deadline `timeout` from now
    pub fn set_timeout(&self, timeout: Duration) {
        // Unrepresentable instants are as good as no deadline.
        self.set(Instant::now().checked_add(timeout));
    }

    /// Remove the deadline; expiration is disabled until the next `set`
    pub fn clear(&self) {
        self.set(None);
    }

    /// Currently configured deadline
    pub fn deadline(&self) -> Option<Instant> {
        self.state.lock().deadline
    }

    /// Handle to the current expiration signal
    ///
    /// Never blocks. Repeated calls return the same signal until a `set`
    /// after expiry replaces it.
    pub fn done(&self) -> DoneHandle {
        if let Some(signal) = self.current.load_full() {
            return DoneHandle::new(signal);
        }

        let _state = self.state.lock();
        let signal = match self.current.load_full() {
            Some(signal) => signal,
            None => {
                let signal = self.pool.acquire();
                self.current.store(Some(Arc::clone(&signal)));
                signal
            }
        };
        DoneHandle::new(signal)
    }

    /// Whether the current deadline has expired
    pub fn is_expired(&self) -> bool {
        let current = self.current.load();
        matches!(&*current, Some(signal) if signal.is_closed())
    }

    /// Run `task` concurrently and wait for it or for the deadline
    ///
    /// Returns `Ok(())` once the task has returned, or [`DeadlineExceeded`]
    /// as soon as the deadline expires first. On expiry the task is not
    /// cancelled: it keeps running and cleans up after itself.
    ///
    /// If the task finishes at the same instant the deadline expires, either
    /// outcome is possible.
    pub fn run<F>(&self, task: F) -> DeadlineResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let expired = self.done();
        let completion = self.pool.acquire();

        let finished = Arc::clone(&completion);
        let pool = Arc::clone(&self.pool);
        self.launcher.launch(
            expired.clone(),
            Box::new(move || {
                // Armed only once invoked: an abandoned launch must not
                // report completion.
                let _finished = CompletionGuard {
                    signal: Some(finished),
                    pool,
                };
                task();
            }),
        );

        match select(&completion, expired.signal()) {
            Either::First => {
                self.pool.release(completion);
                Ok(())
            }
            Either::Second => {
                debug!(
                    launcher = self.launcher.name(),
                    "Deadline exceeded before task completed"
                );
                Err(DeadlineExceeded)
            }
        }
    }

    /// Current signal, replaced by a fresh one if missing or expired
    ///
    /// Caller holds `state` and has stopped the timer.
    fn open_signal(&self) -> Arc<Signal> {
        match self.current.load_full() {
            Some(signal) if !signal.is_closed() => signal,
            stale => {
                let fresh = self.pool.acquire();
                self.current.store(Some(Arc::clone(&fresh)));
                if let Some(stale) = stale {
                    self.pool.release(stale);
                }
                fresh
            }
        }
    }

    fn expiry_timer(&self) -> Timer {
        let current = Arc::clone(&self.current);
        Timer::new(&self.timers, move || {
            if let Some(signal) = current.load_full() {
                if signal.close() {
                    trace!("Deadline expired");
                }
            }
        })
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        // Stop the timer before offering the signal back to the pool.
        self.state.get_mut().timer.take();
        if let Some(signal) = self.current.swap(None) {
            self.pool.release(signal);
        }
    }
}

impl std::fmt::Debug for Deadline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deadline")
            .field("deadline", &self.deadline())
            .field("expired", &self.is_expired())
            .field("launcher", &self.launcher.name())
            .finish()
    }
}

/// Closes a task's completion signal however the task ends
struct CompletionGuard {
    signal: Option<Arc<Signal>>,
    pool: Arc<SignalPool>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.close();
            self.pool.release(signal);
        }
    }
}

/// Run `task` with a one-off deadline
///
/// Equivalent to building a [`Deadline`], setting it once and calling
/// [`Deadline::run`].
pub fn run_until<F>(deadline: Instant, task: F) -> DeadlineResult<()>
where
    F: FnOnce() + Send + 'static,
{
    let controller = Deadline::new();
    controller.set(Some(deadline));
    controller.run(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::PoolConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn private_deadline() -> (Deadline, Arc<SignalPool>) {
        crate::monitoring::try_init_test_tracing();
        let pool = Arc::new(SignalPool::new(PoolConfig::with_capacity(8)));
        let deadline = Deadline::builder().with_pool(pool.clone()).build();
        (deadline, pool)
    }

    #[test]
    fn test_done_is_lazy_and_stable() {
        let (deadline, pool) = private_deadline();
        assert_eq!(pool.stats().allocated, 0);

        let a = deadline.done();
        let b = deadline.done();
        assert!(a.same_signal(&b));
        assert!(!a.is_closed());
        assert_eq!(pool.stats().allocated, 1);
    }

    #[test]
    fn test_past_deadline_closes_synchronously() {
        let (deadline, _pool) = private_deadline();
        let before = deadline.done();

        deadline.set(Some(Instant::now() - Duration::from_millis(1)));

        assert!(before.is_closed());
        assert!(deadline.done().is_closed());
        assert!(deadline.is_expired());
    }

    #[test]
    fn test_set_after_expiry_replaces_signal() {
        let (deadline, _pool) = private_deadline();
        deadline.set(Some(Instant::now()));
        let expired = deadline.done();
        assert!(expired.is_closed());

        deadline.set_timeout(Duration::from_secs(60));
        let fresh = deadline.done();

        assert!(expired.is_closed());
        assert!(!fresh.is_closed());
        assert!(!fresh.same_signal(&expired));
    }

    #[test]
    fn test_reset_before_expiry_keeps_signal() {
        let (deadline, _pool) = private_deadline();
        deadline.set_timeout(Duration::from_millis(20));
        let observer = deadline.done();

        deadline.set_timeout(Duration::from_millis(200));
        thread::sleep(Duration::from_millis(60));
        assert!(!observer.is_closed());
        assert!(observer.same_signal(&deadline.done()));
    }

    #[test]
    fn test_timer_closes_observed_signal() {
        let (deadline, _pool) = private_deadline();
        let observer = deadline.done();
        deadline.set_timeout(Duration::from_millis(10));

        assert!(observer.wait_timeout(Duration::from_secs(1)));
    }

    #[test]
    fn test_clear_then_set_again() {
        let (deadline, _pool) = private_deadline();
        deadline.set_timeout(Duration::from_millis(10));
        deadline.clear();
        assert_eq!(deadline.deadline(), None);

        // A cleared, stopped timer must not make the next set wait forever.
        deadline.set_timeout(Duration::from_millis(10));
        assert!(deadline.done().wait_timeout(Duration::from_secs(1)));
    }

    #[test]
    fn test_abandoned_launch_is_not_completion() {
        let pool = Arc::new(SignalPool::new(PoolConfig::with_capacity(8)));
        let deadline = Deadline::builder()
            .with_pool(pool)
            .with_launcher(|_cancel: DoneHandle, task: crate::launch::Task| drop(task))
            .build();
        deadline.set_timeout(Duration::from_millis(20));

        assert_eq!(deadline.run(|| {}), Err(DeadlineExceeded));
    }

    #[test]
    fn test_panicking_task_still_completes() {
        let (deadline, _pool) = private_deadline();
        deadline.set_timeout(Duration::from_secs(5));

        let result = deadline.run(|| panic!("task failure"));
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_completion_signal_recycled() {
        let (deadline, pool) = private_deadline();
        deadline.set_timeout(Duration::from_secs(5));

        for _ in 0..10 {
            deadline.run(|| {}).unwrap();
        }

        // One expiration signal plus at most a couple of completion signals
        // in flight at once.
        assert!(pool.stats().recycled > 0);
        assert!(pool.stats().allocated < 10);
    }

    #[test]
    fn test_run_until() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();

        let result = run_until(Instant::now() + Duration::from_millis(500), move || {
            flag.store(true, Ordering::SeqCst)
        });

        assert_eq!(result, Ok(()));
        assert!(ran.load(Ordering::SeqCst));
    }
}
