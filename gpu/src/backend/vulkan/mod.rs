//! Vulkan memory backend.
//!
//! Memory blocks are `VkBuffer`s bound to gpu-allocator allocations. Host
//! visible allocations are persistently mapped by gpu-allocator, so mapping
//! only hands out the existing pointer.
//!
//! The backend does not own the device. The renderer creates the instance and
//! logical device and passes them in; it also owns command recording, so no
//! [`CopyContext`](super::CopyContext) is provided here.
//!
//! GPU progress is read from a timeline semaphore with [`VulkanBackend::poll_fence`].

use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;
use gpu_allocator::vulkan::{
    Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc,
};
use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::fence::GpuFence;
use crate::types::{MemoryDescriptor, MemoryLocation};

use super::{DeviceCapabilities, GpuBackend, GpuMemory, ResourceId};

/// A `VkBuffer` with its allocation.
pub struct VulkanMemory {
    id: ResourceId,
    device: ash::Device,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    allocator: Arc<Mutex<Allocator>>,
    size: u64,
    location: MemoryLocation,
    address: u64,
}

impl VulkanMemory {
    /// Resource identity.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Placement.
    pub fn location(&self) -> MemoryLocation {
        self.location
    }

    /// The raw buffer handle, for command recording.
    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }
}

impl Drop for VulkanMemory {
    fn drop(&mut self) {
        if let Some(allocation) = self.allocation.take()
            && let Err(e) = self.allocator.lock().free(allocation)
        {
            log::error!("VulkanMemory: failed to free allocation {:?}: {}", self.id, e);
        }
        unsafe { self.device.destroy_buffer(self.buffer, None) };
    }
}

fn convert_location(location: MemoryLocation) -> gpu_allocator::MemoryLocation {
    match location {
        MemoryLocation::DeviceLocal => gpu_allocator::MemoryLocation::GpuOnly,
        MemoryLocation::Upload => gpu_allocator::MemoryLocation::CpuToGpu,
        MemoryLocation::Readback => gpu_allocator::MemoryLocation::GpuToCpu,
    }
}

/// Vulkan memory backend.
pub struct VulkanBackend {
    device: ash::Device,
    allocator: Arc<Mutex<Allocator>>,
    buffer_device_address: bool,
    next_id: AtomicU64,
}

impl VulkanBackend {
    /// Create the backend and its memory allocator.
    ///
    /// `buffer_device_address` must match the device feature; it enables real
    /// device addresses and bindless handles.
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        buffer_device_address: bool,
    ) -> Result<Self, GraphicsError> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address,
            allocation_sizes: gpu_allocator::AllocationSizes::default(),
        })
        .map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!(
                "Failed to create memory allocator: {}",
                e
            ))
        })?;

        log::info!(
            "Vulkan memory backend created (buffer device address: {})",
            buffer_device_address
        );
        Ok(Self {
            device,
            allocator: Arc::new(Mutex::new(allocator)),
            buffer_device_address,
            next_id: AtomicU64::new(1),
        })
    }

    /// Read a timeline semaphore and record the value as completed on `fence`.
    ///
    /// Returns the semaphore value.
    pub fn poll_fence(
        &self,
        semaphore: vk::Semaphore,
        fence: &GpuFence,
    ) -> Result<u64, GraphicsError> {
        let value = unsafe { self.device.get_semaphore_counter_value(semaphore) }.map_err(|e| {
            if e == vk::Result::ERROR_DEVICE_LOST {
                GraphicsError::DeviceLost
            } else {
                GraphicsError::Internal(format!("Failed to read semaphore counter: {:?}", e))
            }
        })?;
        if value > fence.gpu_value() {
            fence.complete(value)?;
        }
        Ok(value)
    }

    fn buffer_usage(&self) -> vk::BufferUsageFlags {
        let mut usage = vk::BufferUsageFlags::UNIFORM_BUFFER
            | vk::BufferUsageFlags::STORAGE_BUFFER
            | vk::BufferUsageFlags::VERTEX_BUFFER
            | vk::BufferUsageFlags::INDEX_BUFFER
            | vk::BufferUsageFlags::INDIRECT_BUFFER
            | vk::BufferUsageFlags::TRANSFER_SRC
            | vk::BufferUsageFlags::TRANSFER_DST;
        if self.buffer_device_address {
            usage |= vk::BufferUsageFlags::SHADER_DEVICE_ADDRESS;
        }
        usage
    }
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        DeviceCapabilities {
            bindless: self.buffer_device_address,
            ..Default::default()
        }
    }

    fn create_memory(&self, descriptor: &MemoryDescriptor) -> Result<GpuMemory, GraphicsError> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(descriptor.size)
            .usage(self.buffer_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to create buffer: {:?}", e))
        })?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = self.allocator.lock();
            allocator.allocate(&AllocationCreateDesc {
                name: descriptor.label.as_deref().unwrap_or("memory"),
                requirements,
                location: convert_location(descriptor.location),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
        };
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(match e {
                    gpu_allocator::AllocationError::OutOfMemory => GraphicsError::OutOfMemory,
                    e => GraphicsError::ResourceCreationFailed(format!(
                        "Failed to allocate buffer memory: {}",
                        e
                    )),
                });
            }
        };

        let (device_memory, offset) = (unsafe { allocation.memory() }, allocation.offset());
        let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        // From here on Drop cleans up the buffer and allocation.
        let mut memory = VulkanMemory {
            id,
            device: self.device.clone(),
            buffer,
            allocation: Some(allocation),
            allocator: Arc::clone(&self.allocator),
            size: descriptor.size,
            location: descriptor.location,
            address: 0,
        };

        unsafe { self.device.bind_buffer_memory(buffer, device_memory, offset) }.map_err(|e| {
            GraphicsError::ResourceCreationFailed(format!("Failed to bind buffer memory: {:?}", e))
        })?;

        if self.buffer_device_address {
            let info = vk::BufferDeviceAddressInfo::default().buffer(buffer);
            memory.address = unsafe { self.device.get_buffer_device_address(&info) };
        }

        log::trace!(
            "VulkanBackend: created memory {:?} {:?} (size: {}, location: {:?})",
            id,
            descriptor.label,
            descriptor.size,
            descriptor.location
        );
        Ok(GpuMemory::Vulkan(memory))
    }

    fn map_memory(&self, memory: &GpuMemory) -> Result<NonNull<u8>, GraphicsError> {
        let memory = vulkan_memory(memory)?;
        let mapped = memory
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_ptr());
        match mapped {
            Some(ptr) => Ok(ptr.cast()),
            None => Err(GraphicsError::AccessMismatch(format!(
                "memory {:?} ({:?}) is not host visible",
                memory.id, memory.location
            ))),
        }
    }

    fn unmap_memory(&self, memory: &GpuMemory) {
        // gpu-allocator keeps host visible memory persistently mapped.
        match vulkan_memory(memory) {
            Ok(memory) => log::trace!("VulkanBackend: unmap {:?}", memory.id),
            Err(err) => log::error!("VulkanBackend::unmap_memory: {}", err),
        }
    }

    fn device_address(&self, memory: &GpuMemory) -> u64 {
        match vulkan_memory(memory) {
            Ok(memory) => memory.address,
            Err(err) => {
                log::error!("VulkanBackend::device_address: {}", err);
                0
            }
        }
    }

    fn bindless_handle(&self, memory: &GpuMemory) -> Result<u64, GraphicsError> {
        if !self.buffer_device_address {
            return Err(GraphicsError::FeatureNotSupported(
                "buffer device address is not enabled".to_string(),
            ));
        }
        Ok(vulkan_memory(memory)?.address)
    }
}

fn vulkan_memory(memory: &GpuMemory) -> Result<&VulkanMemory, GraphicsError> {
    match memory {
        GpuMemory::Vulkan(memory) => Ok(memory),
        GpuMemory::Dummy(_) => Err(GraphicsError::Internal(
            "Vulkan backend received memory from another backend".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_foreign_memory_is_an_error() {
        let dummy = DummyBackend::new();
        let memory = dummy
            .create_memory(&MemoryDescriptor::new(64, MemoryLocation::Upload))
            .unwrap();
        assert!(matches!(
            vulkan_memory(&memory),
            Err(GraphicsError::Internal(_))
        ));
    }
}
