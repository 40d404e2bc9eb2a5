/*!
 * Signal Pool Configuration
 */

use crate::core::limits::DEFAULT_SIGNAL_POOL_CAPACITY;

/// Signal pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum idle signals held; 0 disables recycling
    pub capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SIGNAL_POOL_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Allocate on every acquire, drop on every release
    pub const fn disabled() -> Self {
        Self { capacity: 0 }
    }

    /// Keep up to `capacity` idle signals
    pub const fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }

    pub const fn is_enabled(&self) -> bool {
        self.capacity > 0
    }
}
