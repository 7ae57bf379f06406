//! CPU/GPU progress fence.
//!
//! A [`GpuFence`] is a pair of monotonically increasing counters:
//!
//! - `cpu_value`: the next value the submitter will signal.
//! - `gpu_value`: the last value the device is known to have reached.
//!
//! `gpu_value < cpu_value` always holds. Anything stamped with a value `v`
//! is safe to reuse once `v < gpu_value`.
//!
//! The fence never blocks. Backends feed device progress in through
//! [`GpuFence::complete`], e.g. by polling a timeline semaphore once per frame.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::GraphicsError;

/// Monotonic submission fence.
#[derive(Debug)]
pub struct GpuFence {
    cpu_value: AtomicU64,
    gpu_value: AtomicU64,
}

impl GpuFence {
    /// Create a fence with `cpu_value = 1` and `gpu_value = 0`.
    pub fn new() -> Self {
        Self {
            cpu_value: AtomicU64::new(1),
            gpu_value: AtomicU64::new(0),
        }
    }

    /// The next value that will be signaled.
    pub fn cpu_value(&self) -> u64 {
        self.cpu_value.load(Ordering::Acquire)
    }

    /// The last value the device has completed.
    pub fn gpu_value(&self) -> u64 {
        self.gpu_value.load(Ordering::Acquire)
    }

    /// Signal the current CPU value and advance it.
    ///
    /// Returns the value the device will reach once the submitted work retires.
    pub fn signal(&self) -> u64 {
        let value = self.cpu_value.fetch_add(1, Ordering::AcqRel);
        log::trace!("GpuFence: signaled {}", value);
        value
    }

    /// Record that the device reached `value`.
    ///
    /// Completion is monotonic: a value lower than the current GPU value is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if `value` was never signaled.
    pub fn complete(&self, value: u64) -> Result<(), GraphicsError> {
        let cpu = self.cpu_value();
        if value >= cpu {
            return Err(GraphicsError::InvalidParameter(format!(
                "fence value {value} has not been signaled (next signal is {cpu})"
            )));
        }
        self.gpu_value.fetch_max(value, Ordering::AcqRel);
        Ok(())
    }

    /// Mark everything signaled so far as complete.
    pub fn complete_all(&self) {
        let last = self.cpu_value().saturating_sub(1);
        self.gpu_value.fetch_max(last, Ordering::AcqRel);
    }

    /// Whether the device has reached `value`.
    pub fn is_complete(&self, value: u64) -> bool {
        value <= self.gpu_value()
    }
}

impl Default for GpuFence {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(GpuFence: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_values() {
        let fence = GpuFence::new();
        assert_eq!(fence.cpu_value(), 1);
        assert_eq!(fence.gpu_value(), 0);
        assert!(fence.is_complete(0));
        assert!(!fence.is_complete(1));
    }

    #[test]
    fn test_signal_and_complete() {
        let fence = GpuFence::new();
        assert_eq!(fence.signal(), 1);
        assert_eq!(fence.signal(), 2);
        assert_eq!(fence.cpu_value(), 3);

        fence.complete(1).unwrap();
        assert_eq!(fence.gpu_value(), 1);
        assert!(fence.is_complete(1));
        assert!(!fence.is_complete(2));
    }

    #[test]
    fn test_complete_is_monotonic() {
        let fence = GpuFence::new();
        fence.signal();
        fence.signal();
        fence.complete(2).unwrap();
        fence.complete(1).unwrap();
        assert_eq!(fence.gpu_value(), 2);
    }

    #[test]
    fn test_complete_unsignaled_value() {
        let fence = GpuFence::new();
        assert!(fence.complete(1).is_err());
        assert_eq!(fence.gpu_value(), 0);
    }

    #[test]
    fn test_complete_all() {
        let fence = GpuFence::new();
        fence.complete_all();
        assert_eq!(fence.gpu_value(), 0);

        fence.signal();
        fence.signal();
        fence.complete_all();
        assert_eq!(fence.gpu_value(), 2);
        assert!(fence.gpu_value() < fence.cpu_value());
    }
}
