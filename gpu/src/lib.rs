//! # RedLilium GPU
//!
//! GPU memory management for RedLilium: transient upload memory, buffers and
//! constant buffers.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`ResourceAllocator`] - Page-based bump allocator for per-frame upload data,
//!   reclaimed once a [`GpuFence`] proves the GPU is done with it
//! - [`Buffer`] - Dedicated buffers with write, read or device-only placement
//! - [`ConstantBuffer`] - Reflection-sized constant buffers with a cached view
//! - [`GraphicsDevice`] - The device context every resource is created with
//! - Backends: Dummy (host memory, for testing) and Vulkan (`vulkan-backend` feature)
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use redlilium_gpu::{GpuFence, GraphicsDevice, ResourceAllocator};
//!
//! let device = GraphicsDevice::dummy()?;
//! let fence = Arc::new(GpuFence::new());
//! let mut allocator = ResourceAllocator::with_default_page_size(&device, fence.clone())?;
//!
//! let mut data = allocator.allocate(256, 256)?;
//! data.write(0, &[0u8; 256])?;
//! allocator.release(&mut data);
//!
//! fence.signal();
//! // ... GPU completes the frame, backend calls fence.complete(..)
//! allocator.execute_deferred_releases();
//! ```

pub mod allocator;
pub mod backend;
pub mod device;
pub mod error;
pub mod fence;
pub mod params;
pub mod profiling;
pub mod reflection;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use allocator::{AllocationData, AllocatorStats, PageId, ResourceAllocator};
pub use backend::{
    ConstantBufferViewDesc, CopyContext, DescriptorHandle, DescriptorHeap, DeviceCapabilities,
    DummyBackend, DummyCopyContext, GpuBackend, GpuMemory, ResourceId, SlotDescriptorHeap,
};
pub use device::GraphicsDevice;
pub use error::GraphicsError;
pub use fence::GpuFence;
pub use params::DeviceParameters;
pub use reflection::{BufferKind, BufferReflection, Program, ProgramReflection, ProgramVersion};
pub use resources::{Buffer, CacheState, ConstantBuffer, VariablesBuffer};
pub use types::{
    BufferDescriptor, BufferUsage, CpuAccess, GpuAccess, MapType, MemoryDescriptor,
    MemoryLocation,
};

/// GPU library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the GPU memory subsystem.
pub fn init() {
    log::info!("RedLilium GPU v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        init();
    }

    #[test]
    fn test_dummy_device() {
        let device = GraphicsDevice::dummy().unwrap();
        assert_eq!(device.name(), "Dummy Backend");
    }
}
