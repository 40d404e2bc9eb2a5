/*!
 * Signal Pooling
 *
 * Reuses expiration and completion signals so that hot paths setting
 * deadlines and running tasks do not allocate on every call.
 *
 * # Safety of reuse
 *
 * A released signal is recycled only when the releaser holds the last
 * reference (`Arc::get_mut` succeeds). A signal still observed through a
 * `DoneHandle`, or still held by a running task wrapper, is simply dropped
 * instead. Pooling is a pure optimization: a disabled pool behaves the same.
 */

use super::config::PoolConfig;
use super::signal::Signal;
use crossbeam_queue::ArrayQueue;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Snapshot of pool activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Signals created because the free list was empty
    pub allocated: u64,
    /// Acquires served from the free list
    pub recycled: u64,
    /// Calls to `release`
    pub released: u64,
    /// Released signals dropped (still shared, or pool full/disabled)
    pub discarded: u64,
}

#[derive(Default)]
struct Counters {
    allocated: AtomicU64,
    recycled: AtomicU64,
    released: AtomicU64,
    discarded: AtomicU64,
}

/// Thread-safe free list of open signals
pub struct SignalPool {
    free: Option<ArrayQueue<Arc<Signal>>>,
    counters: Counters,
}

static GLOBAL_POOL: OnceLock<Arc<SignalPool>> = OnceLock::new();

impl SignalPool {
    /// Create a pool with the given configuration
    pub fn new(config: PoolConfig) -> Self {
        Self {
            free: config
                .is_enabled()
                .then(|| ArrayQueue::new(config.capacity)),
            counters: Counters::default(),
        }
    }

    /// Pool that never recycles
    pub fn disabled() -> Self {
        Self::new(PoolConfig::disabled())
    }

    /// Process-wide pool shared by controllers built with defaults
    pub fn global() -> Arc<SignalPool> {
        GLOBAL_POOL
            .get_or_init(|| Arc::new(SignalPool::new(PoolConfig::default())))
            .clone()
    }

    /// Get an open, unshared signal
    pub fn acquire(&self) -> Arc<Signal> {
        if let Some(signal) = self.free.as_ref().and_then(|free| free.pop()) {
            self.counters.recycled.fetch_add(1, Ordering::Relaxed);
            return signal;
        }
        self.counters.allocated.fetch_add(1, Ordering::Relaxed);
        Arc::new(Signal::new())
    }

    /// Offer a signal back for reuse
    ///
    /// Recycled only if `signal` is the last reference; otherwise dropped.
    pub fn release(&self, mut signal: Arc<Signal>) {
        self.counters.released.fetch_add(1, Ordering::Relaxed);

        let Some(free) = &self.free else {
            self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        };

        match Arc::get_mut(&mut signal) {
            Some(exclusive) => {
                exclusive.reopen();
                if free.push(signal).is_err() {
                    self.counters.discarded.fetch_add(1, Ordering::Relaxed);
                }
            }
            None => {
                self.counters.discarded.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of idle signals ready for reuse
    pub fn idle(&self) -> usize {
        self.free.as_ref().map(|free| free.len()).unwrap_or(0)
    }

    /// Current statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.counters.allocated.load(Ordering::Relaxed),
            recycled: self.counters.recycled.load(Ordering::Relaxed),
            released: self.counters.released.load(Ordering::Relaxed),
            discarded: self.counters.discarded.load(Ordering::Relaxed),
        }
    }
}

impl Default for SignalPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl std::fmt::Debug for SignalPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalPool")
            .field("idle", &self.idle())
            .field("stats", &self.stats())
            .finish()
    }
}
