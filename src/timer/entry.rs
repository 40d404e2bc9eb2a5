/*!
 * Timer Entries
 * Internal data structures for scheduled firings
 */

use parking_lot::Mutex;
use std::cmp::Ordering;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Weak;
use std::time::Instant;
use tracing::error;

pub(super) type Callback = Box<dyn Fn() + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Status {
    Idle,
    Armed,
    Firing,
    Fired,
}

/// Mutable timer state; `generation` invalidates superseded schedules
#[derive(Debug)]
pub(super) struct TimerState {
    pub generation: u64,
    pub status: Status,
}

pub(super) struct TimerEntry {
    pub state: Mutex<TimerState>,
    pub callback: Callback,
}

impl TimerEntry {
    pub fn new(callback: Callback) -> Self {
        Self {
            state: Mutex::new(TimerState {
                generation: 0,
                status: Status::Idle,
            }),
            callback,
        }
    }
}

/// One scheduled firing in the service heap
pub(super) struct Scheduled {
    pub when: Instant,
    pub seq: u64,
    pub generation: u64,
    pub entry: Weak<TimerEntry>,
}

impl Scheduled {
    /// Whether this schedule is still the one its timer is armed with
    pub fn is_live(&self) -> bool {
        self.entry.upgrade().is_some_and(|entry| {
            let state = entry.state.lock();
            state.generation == self.generation && state.status == Status::Armed
        })
    }

    /// Run the callback if the timer was not stopped or re-armed meanwhile
    pub fn fire(self) {
        let Some(entry) = self.entry.upgrade() else {
            return;
        };

        {
            let mut state = entry.state.lock();
            if state.generation != self.generation || state.status != Status::Armed {
                return;
            }
            state.status = Status::Firing;
        }

        if panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)())).is_err() {
            error!(generation = self.generation, "Timer callback panicked");
        }

        let mut state = entry.state.lock();
        if state.generation == self.generation {
            state.status = Status::Fired;
        }
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.when == other.when && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap, so earliest deadline compares greatest
        other
            .when
            .cmp(&self.when)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
