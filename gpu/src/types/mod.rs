//! Common types and descriptors for GPU memory resources.
//!
//! This module contains usage flags, access modes, and descriptor structs
//! used throughout the crate.

mod buffer;
mod memory;

pub use buffer::{BufferDescriptor, BufferUsage, CpuAccess, GpuAccess, MapType};
pub use memory::{MemoryDescriptor, MemoryLocation};

/// Align a value up to the given alignment.
///
/// `alignment` must be a power of two.
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Align a value up, returning `None` if the result does not fit in a `u64`.
#[inline]
pub fn checked_align_up(value: u64, alignment: u64) -> Option<u64> {
    debug_assert!(alignment.is_power_of_two());
    Some(value.checked_add(alignment - 1)? & !(alignment - 1))
}
