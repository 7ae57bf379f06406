//! GPU backend abstraction layer.
//!
//! The memory layer never talks to a graphics API directly. It consumes three
//! services, all injected through [`GraphicsDevice`](crate::GraphicsDevice):
//!
//! - [`GpuBackend`]: creates, maps and addresses dedicated memory blocks.
//! - [`CopyContext`]: device-side writes and buffer-to-buffer copies.
//! - [`DescriptorHeap`]: slots for GPU-visible view descriptors.
//!
//! # Available Backends
//!
//! - `dummy` (always built): host-memory backend for tests and headless tools
//! - `vulkan-backend`: native Vulkan memory via ash and gpu-allocator

pub mod copy;
pub mod descriptor;
pub mod dummy;

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

use std::ptr::NonNull;

use crate::error::GraphicsError;
use crate::types::{GpuAccess, MemoryDescriptor, MemoryLocation};

pub use copy::CopyContext;
pub use descriptor::{ConstantBufferViewDesc, DescriptorHandle, DescriptorHeap, SlotDescriptorHeap};
pub use dummy::{DummyBackend, DummyCopyContext};
#[cfg(feature = "vulkan-backend")]
pub use vulkan::{VulkanBackend, VulkanMemory};

/// Identity of one device memory block.
///
/// Two handles with the same id refer to the same underlying resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Optional capabilities of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Buffers have bindless handles.
    pub bindless: bool,
    /// Buffers can be made resident and evicted manually.
    pub manual_residency: bool,
    /// Maximum size of a single memory block.
    pub max_memory_size: u64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            bindless: false,
            manual_residency: false,
            max_memory_size: 1 << 32,
        }
    }
}

/// Handle to a dedicated device memory block.
///
/// The block is released when the handle is dropped.
#[allow(clippy::large_enum_variant)]
pub enum GpuMemory {
    /// Dummy backend memory (host heap)
    Dummy(dummy::DummyMemory),
    /// Vulkan buffer with its gpu-allocator allocation
    #[cfg(feature = "vulkan-backend")]
    Vulkan(vulkan::VulkanMemory),
}

impl GpuMemory {
    /// Resource identity.
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Dummy(memory) => memory.id(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(memory) => memory.id(),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        match self {
            Self::Dummy(memory) => memory.size(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(memory) => memory.size(),
        }
    }

    /// Placement of the block.
    pub fn location(&self) -> MemoryLocation {
        match self {
            Self::Dummy(memory) => memory.location(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(memory) => memory.location(),
        }
    }
}

impl std::fmt::Debug for GpuMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(memory) => f
                .debug_struct("GpuMemory::Dummy")
                .field("id", &memory.id())
                .field("size", &memory.size())
                .field("location", &memory.location())
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(memory) => f
                .debug_struct("GpuMemory::Vulkan")
                .field("id", &memory.id())
                .field("size", &memory.size())
                .field("location", &memory.location())
                .finish_non_exhaustive(),
        }
    }
}

/// GPU backend trait for creating and mapping device memory.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// Optional capabilities of this backend.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Create a dedicated memory block.
    fn create_memory(&self, descriptor: &MemoryDescriptor) -> Result<GpuMemory, GraphicsError>;

    /// Map a host-visible memory block and return its base pointer.
    fn map_memory(&self, memory: &GpuMemory) -> Result<NonNull<u8>, GraphicsError>;

    /// Release the CPU view of a memory block.
    fn unmap_memory(&self, memory: &GpuMemory);

    /// Device virtual address of the first byte of the block.
    fn device_address(&self, memory: &GpuMemory) -> u64;

    /// Bindless handle of the block.
    fn bindless_handle(&self, _memory: &GpuMemory) -> Result<u64, GraphicsError> {
        Err(GraphicsError::FeatureNotSupported(format!(
            "{} has no bindless buffer handles",
            self.name()
        )))
    }

    /// Make the block resident for GPU access; returns its GPU handle.
    fn make_resident(&self, _memory: &GpuMemory, _access: GpuAccess) -> Result<u64, GraphicsError> {
        Err(GraphicsError::FeatureNotSupported(format!(
            "{} has no manual residency control",
            self.name()
        )))
    }

    /// Evict the block from GPU memory.
    fn evict(&self, _memory: &GpuMemory) -> Result<(), GraphicsError> {
        Err(GraphicsError::FeatureNotSupported(format!(
            "{} has no manual residency control",
            self.name()
        )))
    }
}
