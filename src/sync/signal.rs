/*!
 * One-Shot Broadcast Signal
 *
 * An open/closed event that transitions to closed at most once and can be
 * observed by any number of waiters: parked threads, async tasks, or plain
 * `is_closed` polls.
 *
 * # Design
 *
 * The closed flag is an atomic readable without locking. Waiters register a
 * wake target under the waiter lock, and `close` flips the flag under that
 * same lock before draining the list, so a waiter that registered while the
 * signal was open is always woken.
 *
 * Reopening requires `&mut Signal`, which for a shared `Arc<Signal>` is only
 * reachable through `Arc::get_mut`. A signal somebody else still observes can
 * therefore never be reopened underneath them.
 */

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// Something to wake when the signal closes
enum WakeTarget {
    Thread(Thread),
    Task(Waker),
}

impl WakeTarget {
    fn wake(self) {
        match self {
            Self::Thread(thread) => thread.unpark(),
            Self::Task(waker) => waker.wake(),
        }
    }
}

struct Waiter {
    id: u64,
    target: WakeTarget,
}

/// One-shot broadcast signal
///
/// Closed exactly once; every current and future observer sees it closed.
pub struct Signal {
    closed: AtomicBool,
    waiters: Mutex<Vec<Waiter>>,
    next_id: AtomicU64,
}

impl Signal {
    /// Create an open signal
    pub fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Check whether the signal has been closed (lock-free)
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close the signal and wake every waiter
    ///
    /// Returns `true` for the call that performed the transition and `false`
    /// if the signal was already closed.
    pub fn close(&self) -> bool {
        let drained = {
            let mut waiters = self.waiters.lock();
            if self.closed.load(Ordering::Relaxed) {
                return false;
            }
            self.closed.store(true, Ordering::Release);
            std::mem::take(&mut *waiters)
        };

        for waiter in drained {
            waiter.target.wake();
        }
        true
    }

    /// Block until the signal closes
    pub fn wait(&self) {
        wait_any(&[self], None);
    }

    /// Block until the signal closes or `timeout` elapses
    ///
    /// Returns `true` if the signal closed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_deadline(deadline),
            None => {
                self.wait();
                true
            }
        }
    }

    /// Block until the signal closes or `deadline` passes
    ///
    /// Returns `true` if the signal closed.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        wait_any(&[self], Some(deadline)).is_some()
    }

    /// Future resolving once the signal closes
    pub fn closed(&self) -> Closed<'_> {
        Closed {
            signal: self,
            id: None,
        }
    }

    /// Number of registered waiters (for diagnostics)
    pub fn waiter_count(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Return a closed signal to the open state
    ///
    /// Exclusive access proves nobody is waiting on or about to close it.
    pub(crate) fn reopen(&mut self) {
        *self.closed.get_mut() = false;
        self.waiters.get_mut().clear();
    }

    /// Register a wake target, or `None` if the signal is already closed
    fn register(&self, target: WakeTarget) -> Option<u64> {
        let mut waiters = self.waiters.lock();
        if self.closed.load(Ordering::Relaxed) {
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        waiters.push(Waiter { id, target });
        Some(id)
    }

    /// Refresh the waker of an existing async registration
    ///
    /// Returns `false` if the signal closed in the meantime.
    fn refresh(&self, id: u64, waker: &Waker) -> bool {
        let mut waiters = self.waiters.lock();
        if self.closed.load(Ordering::Relaxed) {
            return false;
        }
        match waiters.iter_mut().find(|w| w.id == id) {
            Some(waiter) => {
                if let WakeTarget::Task(current) = &waiter.target {
                    if current.will_wake(waker) {
                        return true;
                    }
                }
                waiter.target = WakeTarget::Task(waker.clone());
            }
            None => waiters.push(Waiter {
                id,
                target: WakeTarget::Task(waker.clone()),
            }),
        }
        true
    }

    fn unregister(&self, id: u64) {
        self.waiters.lock().retain(|w| w.id != id);
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Which of two selected signals was observed closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Either {
    First,
    Second,
}

/// Block until either signal closes
///
/// When both are closed at the moment of observation, `First` wins.
pub fn select(first: &Signal, second: &Signal) -> Either {
    match wait_any(&[first, second], None) {
        Some(0) => Either::First,
        _ => Either::Second,
    }
}

/// Block until either signal closes or `deadline` passes
pub fn select_deadline(first: &Signal, second: &Signal, deadline: Instant) -> Option<Either> {
    wait_any(&[first, second], Some(deadline)).map(|index| {
        if index == 0 {
            Either::First
        } else {
            Either::Second
        }
    })
}

/// Thread registrations removed on drop, including early returns
struct Registrations<'a> {
    entries: Vec<(&'a Signal, u64)>,
}

impl Drop for Registrations<'_> {
    fn drop(&mut self) {
        for (signal, id) in self.entries.drain(..) {
            signal.unregister(id);
        }
    }
}

/// Park the current thread until one of `signals` closes
///
/// Returns the index of the first closed signal in slice order, or `None`
/// when `deadline` passed first.
fn wait_any(signals: &[&Signal], deadline: Option<Instant>) -> Option<usize> {
    let first_closed = || signals.iter().position(|s| s.is_closed());

    if let Some(index) = first_closed() {
        return Some(index);
    }

    let current = thread::current();
    let mut registrations = Registrations {
        entries: Vec::with_capacity(signals.len()),
    };
    for &signal in signals {
        if let Some(id) = signal.register(WakeTarget::Thread(current.clone())) {
            registrations.entries.push((signal, id));
        }
    }

    // Unpark tokens may be stale or spurious; the flags are the truth.
    loop {
        if let Some(index) = first_closed() {
            return Some(index);
        }
        match deadline {
            None => thread::park(),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                thread::park_timeout(deadline - now);
            }
        }
    }
}

/// Future returned by [`Signal::closed`] and [`DoneHandle::closed`]
#[must_use = "futures do nothing unless polled"]
pub struct Closed<'a> {
    signal: &'a Signal,
    id: Option<u64>,
}

impl Future for Closed<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.signal.is_closed() {
            return Poll::Ready(());
        }

        let still_open = match this.id {
            Some(id) => this.signal.refresh(id, cx.waker()),
            None => match this.signal.register(WakeTarget::Task(cx.waker().clone())) {
                Some(id) => {
                    this.id = Some(id);
                    true
                }
                None => false,
            },
        };

        if still_open {
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }
}

impl Drop for Closed<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            self.signal.unregister(id);
        }
    }
}

/// Receive-only view of an expiration signal
///
/// Handed out by [`Deadline::done`](crate::Deadline::done). Observers can
/// wait on it but never close it.
#[derive(Clone)]
pub struct DoneHandle {
    signal: Arc<Signal>,
}

impl DoneHandle {
    pub(crate) fn new(signal: Arc<Signal>) -> Self {
        Self { signal }
    }

    /// Check whether the deadline has expired
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.signal.is_closed()
    }

    /// Block until the deadline expires
    pub fn wait(&self) {
        self.signal.wait();
    }

    /// Block until expiry or `timeout`; `true` if expired
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.signal.wait_timeout(timeout)
    }

    /// Block until expiry or `deadline`; `true` if expired
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        self.signal.wait_deadline(deadline)
    }

    /// Future resolving once the deadline expires
    pub fn closed(&self) -> Closed<'_> {
        self.signal.closed()
    }

    /// Whether both handles observe the same signal instance
    pub fn same_signal(&self, other: &DoneHandle) -> bool {
        Arc::ptr_eq(&self.signal, &other.signal)
    }

    pub(crate) fn signal(&self) -> &Signal {
        &self.signal
    }
}

impl fmt::Debug for DoneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DoneHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}
