//! External (off-heap) memory accounting.
//!
//! A managed runtime only sees the memory it allocates on its own heap. Buffers
//! obtained from a native allocator are invisible to its collector unless their
//! footprint is reported separately. [`ExternalMemory`] is that reporting channel:
//! owners add their byte count when the native allocation succeeds and subtract
//! it once the allocation is actually freed.

use counter::Counter;

pub mod counter;

/// Receiver of external memory adjustments.
///
/// Implemented by the host runtime (or by [`ExternalMemoryTracker`] when no runtime
/// is attached).
pub trait ExternalMemory: Send + Sync {
    /// Adjusts the amount of externally allocated memory by `delta` bytes and returns
    /// the total after the adjustment.
    ///
    /// Positive values register new allocations, negative values release them.
    fn adjust(&self, delta: i64) -> i64;
}

/// A standalone [`ExternalMemory`] implementation that keeps the running total,
/// its high-water mark, and the number of adjustments made.
pub struct ExternalMemoryTracker {
    current: Counter,
    peak: Counter,
    adjustments: Counter,
}

impl ExternalMemoryTracker {
    pub fn new() -> ExternalMemoryTracker {
        ExternalMemoryTracker {
            current: Counter::new(0),
            peak: Counter::new(0),
            adjustments: Counter::new(0),
        }
    }

    /// Bytes currently registered.
    pub fn current(&self) -> i64 {
        self.current.read()
    }

    /// Highest value `current()` has reached.
    pub fn peak(&self) -> i64 {
        self.peak.read()
    }

    /// Number of non-zero adjustments received.
    ///
    /// **Note**: This method is primarily intended for diagnostic purposes.
    pub fn adjustments(&self) -> u64 {
        self.adjustments.read() as u64
    }
}

impl Default for ExternalMemoryTracker {
    fn default() -> Self {
        ExternalMemoryTracker::new()
    }
}

impl ExternalMemory for ExternalMemoryTracker {
    fn adjust(&self, delta: i64) -> i64 {
        if delta == 0 {
            return self.current.read();
        }
        self.adjustments.add(1);
        let total = self.current.add(delta);
        if total < 0 {
            log::warn!("external memory total dropped below zero ({total} after {delta:+})");
        }
        self.peak.raise_to(total);
        total
    }
}

impl std::fmt::Debug for ExternalMemoryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalMemoryTracker")
            .field("current", &self.current())
            .field("peak", &self.peak())
            .finish_non_exhaustive()
    }
}
