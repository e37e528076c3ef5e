use std::sync::atomic::{AtomicI64, Ordering};

/// A thread-safe signed counter that accumulates positive and negative adjustments.
///
/// Unlike a budget, the value is allowed to go below zero: a misbehaving caller
/// that releases more than it registered is visible as a negative total rather
/// than being silently clamped.
pub struct Counter(AtomicI64);

impl Counter {
    /// Creates a new `Counter` with the given initial value.
    pub fn new(value: i64) -> Counter {
        Counter(AtomicI64::new(value))
    }

    /// Adds `delta` (which may be negative) to the counter and returns the updated value.
    ///
    /// The addition wraps on overflow, matching the behavior of the underlying atomic.
    pub fn add(&self, delta: i64) -> i64 {
        self.0.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta)
    }

    /// Raises the counter to `value` if it is currently lower, returning the value
    /// held after the operation.
    pub fn raise_to(&self, value: i64) -> i64 {
        self.0.fetch_max(value, Ordering::AcqRel).max(value)
    }

    /// Returns the counter value (most likely stale by the time it is observed by the caller).
    pub fn read(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}
