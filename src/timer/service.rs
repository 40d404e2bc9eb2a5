/*!
 * Timer Service
 *
 * A single background thread drives every timer created from a service and
 * runs their callbacks on its own execution context. Callbacks must be short
 * and must not block on the thread that stops or resets their timer.
 *
 * # Design
 *
 * Timers are generation-stamped. Resetting or stopping bumps the generation,
 * so superseded heap entries are skipped when popped instead of searched for
 * and removed. The heap is compacted when stale entries pile up.
 */

use super::entry::{Callback, Scheduled, Status, TimerEntry};
use crate::core::limits::{GLOBAL_TIMER_THREAD_NAME, TIMER_COMPACTION_FLOOR};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::BinaryHeap;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Result of stopping a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// A pending firing was cancelled before its callback ran
    Cancelled,
    /// The callback already ran or is running right now
    Fired,
    /// Nothing was scheduled
    Idle,
}

impl StopOutcome {
    /// Whether the stop prevented the callback (Go-style `Stop() bool`)
    pub fn prevented(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

struct Queue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
    compact_at: usize,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    wakeup: Condvar,
}

struct ServiceInner {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    name: String,
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.wakeup.notify_all();

        if let Some(worker) = self.worker.lock().take() {
            // The last timer may be dropped from inside a callback.
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
        debug!(service = %self.name, "Timer service stopped");
    }
}

/// Handle to a timer thread; clones share the same thread
///
/// The thread exits once the service and every timer created from it are
/// dropped.
#[derive(Clone)]
pub struct TimerService {
    inner: Arc<ServiceInner>,
}

static GLOBAL_SERVICE: OnceLock<TimerService> = OnceLock::new();

impl TimerService {
    /// Start a timer service on a new named thread
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                heap: BinaryHeap::new(),
                next_seq: 0,
                compact_at: TIMER_COMPACTION_FLOOR,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(worker_shared))?;

        debug!(service = %name, "Timer service started");
        Ok(Self {
            inner: Arc::new(ServiceInner {
                shared,
                worker: Mutex::new(Some(worker)),
                name,
            }),
        })
    }

    /// Process-wide service used by controllers built with defaults
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the timer thread on first use, the
    /// same way `std::thread::spawn` does.
    pub fn global() -> TimerService {
        GLOBAL_SERVICE
            .get_or_init(|| {
                TimerService::new(GLOBAL_TIMER_THREAD_NAME)
                    .expect("failed to spawn the global deadline timer thread")
            })
            .clone()
    }

    /// Name of the backing thread
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Entries in the heap, including superseded ones (for diagnostics)
    pub fn pending(&self) -> usize {
        self.inner.shared.queue.lock().heap.len()
    }

    fn schedule(&self, when: Instant, generation: u64, entry: &Arc<TimerEntry>) {
        let shared = &self.inner.shared;
        let mut queue = shared.queue.lock();

        if queue.heap.len() >= queue.compact_at {
            compact(&mut queue);
        }

        let seq = queue.next_seq;
        queue.next_seq += 1;
        let earliest = queue.heap.peek().map_or(true, |head| when < head.when);
        queue.heap.push(Scheduled {
            when,
            seq,
            generation,
            entry: Arc::downgrade(entry),
        });
        drop(queue);

        if earliest {
            shared.wakeup.notify_one();
        }
    }
}

impl std::fmt::Debug for TimerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerService")
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Drop superseded entries and raise the next compaction threshold
fn compact(queue: &mut Queue) {
    let before = queue.heap.len();
    queue.heap.retain(Scheduled::is_live);
    let after = queue.heap.len();
    queue.compact_at = (after * 2).max(TIMER_COMPACTION_FLOOR);
    trace!(before, after, "Compacted timer heap");
}

fn run(shared: Arc<Shared>) {
    let mut queue = shared.queue.lock();
    loop {
        if queue.shutdown {
            break;
        }

        let next = queue.heap.peek().map(|head| head.when);
        match next {
            None => {
                shared.wakeup.wait(&mut queue);
            }
            Some(when) if when > Instant::now() => {
                shared.wakeup.wait_until(&mut queue, when);
            }
            Some(_) => {
                if let Some(due) = queue.heap.pop() {
                    MutexGuard::unlocked(&mut queue, || due.fire());
                }
            }
        }
    }
}

/// Resettable one-shot alarm
///
/// Invokes its callback on the service thread when it expires. A timer starts
/// idle; [`reset`](Timer::reset) arms it and [`stop`](Timer::stop) disarms it.
/// Dropping a timer stops it.
pub struct Timer {
    entry: Arc<TimerEntry>,
    service: TimerService,
}

impl Timer {
    /// Create an idle timer bound to `service`
    pub fn new<F>(service: &TimerService, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: Callback = Box::new(callback);
        Self {
            entry: Arc::new(TimerEntry::new(callback)),
            service: service.clone(),
        }
    }

    /// Create a timer already armed to fire after `delay`
    pub fn after<F>(service: &TimerService, delay: Duration, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let timer = Self::new(service, callback);
        timer.reset(delay);
        timer
    }

    /// Arm the timer to fire after `delay`, replacing any pending firing
    ///
    /// Returns `true` if a pending firing was replaced. A callback already in
    /// flight is not affected. A delay too large to represent never fires.
    pub fn reset(&self, delay: Duration) -> bool {
        match Instant::now().checked_add(delay) {
            Some(when) => self.reset_at(when),
            None => self.stop().prevented(),
        }
    }

    /// Arm the timer to fire at `when`
    pub fn reset_at(&self, when: Instant) -> bool {
        let (was_armed, generation) = {
            let mut state = self.entry.state.lock();
            let was_armed = state.status == Status::Armed;
            state.generation += 1;
            state.status = Status::Armed;
            (was_armed, state.generation)
        };
        self.service.schedule(when, generation, &self.entry);
        was_armed
    }

    /// Disarm the timer
    ///
    /// [`StopOutcome::Fired`] means the callback ran or is still running; a
    /// caller that must not overlap with it has to synchronize separately.
    pub fn stop(&self) -> StopOutcome {
        let mut state = self.entry.state.lock();
        let outcome = match state.status {
            Status::Armed => StopOutcome::Cancelled,
            Status::Firing | Status::Fired => StopOutcome::Fired,
            Status::Idle => StopOutcome::Idle,
        };
        state.generation += 1;
        state.status = Status::Idle;
        outcome
    }

    /// Whether a firing is pending
    pub fn is_armed(&self) -> bool {
        self.entry.state.lock().status == Status::Armed
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("armed", &self.is_armed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_timer(service: &TimerService) -> (Timer, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let timer = Timer::new(service, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, fired)
    }

    #[test]
    fn test_timer_fires_once() {
        let service = TimerService::new("test-timer").unwrap();
        let (timer, fired) = counting_timer(&service);

        assert!(!timer.reset(Duration::from_millis(10)));
        thread::sleep(Duration::from_millis(80));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
        assert_eq!(timer.stop(), StopOutcome::Fired);
        assert_eq!(timer.stop(), StopOutcome::Idle);
    }

    #[test]
    fn test_stop_cancels_pending() {
        let service = TimerService::new("test-timer").unwrap();
        let (timer, fired) = counting_timer(&service);

        timer.reset(Duration::from_millis(30));
        assert_eq!(timer.stop(), StopOutcome::Cancelled);
        thread::sleep(Duration::from_millis(80));

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reset_supersedes_previous_schedule() {
        let service = TimerService::new("test-timer").unwrap();
        let (timer, fired) = counting_timer(&service);

        timer.reset(Duration::from_millis(10));
        assert!(timer.reset(Duration::from_millis(120)));
        thread::sleep(Duration::from_millis(60));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_many_timers_fire_in_order() {
        let service = TimerService::new("test-timer").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let timers: Vec<_> = [40u64, 10, 25]
            .into_iter()
            .map(|ms| {
                let order = order.clone();
                Timer::after(&service, Duration::from_millis(ms), move || {
                    order.lock().push(ms)
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(120));
        assert_eq!(*order.lock(), vec![10, 25, 40]);
        drop(timers);
    }

    #[test]
    fn test_dropped_timer_never_fires() {
        let service = TimerService::new("test-timer").unwrap();
        let (timer, fired) = counting_timer(&service);

        timer.reset(Duration::from_millis(10));
        drop(timer);
        thread::sleep(Duration::from_millis(60));

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_callback_keeps_service_alive() {
        let service = TimerService::new("test-timer").unwrap();
        let _bad = Timer::after(&service, Duration::from_millis(5), || panic!("boom"));
        let (timer, fired) = counting_timer(&service);
        timer.reset(Duration::from_millis(30));

        thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_compaction_bounds_heap() {
        let service = TimerService::new("test-timer").unwrap();
        let (timer, _fired) = counting_timer(&service);

        for _ in 0..1_000 {
            timer.reset(Duration::from_secs(3600));
        }

        assert!(service.pending() <= TIMER_COMPACTION_FLOOR * 2);
    }
}
