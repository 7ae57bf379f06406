//! Graphics device.
//!
//! The [`GraphicsDevice`] is the explicit device context every component is
//! created with. It bundles the injected services (memory backend, copy
//! context, descriptor heap) with the device's [`DeviceParameters`].

use std::ptr::NonNull;
use std::sync::Arc;

use crate::backend::{
    CopyContext, DescriptorHeap, DeviceCapabilities, DummyBackend, DummyCopyContext, GpuBackend,
    GpuMemory, SlotDescriptorHeap,
};
use crate::error::GraphicsError;
use crate::params::DeviceParameters;
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, MemoryDescriptor};

/// A graphics device context.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync`. The resources created from it are not
/// internally synchronized; see [`ResourceAllocator`](crate::ResourceAllocator).
///
/// # Example
///
/// ```ignore
/// let device = GraphicsDevice::dummy()?;
/// let buffer = device.create_buffer(
///     &BufferDescriptor::new(64, BufferUsage::CONSTANT).with_cpu_access(CpuAccess::Write),
///     None,
/// )?;
/// ```
pub struct GraphicsDevice {
    backend: Arc<dyn GpuBackend>,
    copy_context: Arc<dyn CopyContext>,
    descriptor_heap: Arc<dyn DescriptorHeap>,
    params: DeviceParameters,
}

impl GraphicsDevice {
    /// Create a device from its services.
    ///
    /// # Errors
    ///
    /// Returns an error if `params` fail validation.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        copy_context: Arc<dyn CopyContext>,
        descriptor_heap: Arc<dyn DescriptorHeap>,
        params: DeviceParameters,
    ) -> Result<Arc<Self>, GraphicsError> {
        params.validate()?;
        log::info!(
            "Creating GraphicsDevice on {} (constant buffer alignment: {})",
            backend.name(),
            params.constant_buffer_alignment
        );
        Ok(Arc::new(Self {
            backend,
            copy_context,
            descriptor_heap,
            params,
        }))
    }

    /// Create a device on the dummy backend with default parameters.
    pub fn dummy() -> Result<Arc<Self>, GraphicsError> {
        Self::dummy_with_parameters(DeviceParameters::default())
    }

    /// Create a device on the dummy backend.
    pub fn dummy_with_parameters(params: DeviceParameters) -> Result<Arc<Self>, GraphicsError> {
        Self::new(
            Arc::new(DummyBackend::new()),
            Arc::new(DummyCopyContext::new()),
            Arc::new(SlotDescriptorHeap::new(params.descriptor_heap_capacity)),
            params,
        )
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Get the device parameters.
    pub fn params(&self) -> &DeviceParameters {
        &self.params
    }

    /// Get the backend capabilities.
    pub fn capabilities(&self) -> DeviceCapabilities {
        self.backend.capabilities()
    }

    /// Get the memory backend.
    pub fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Get the copy context.
    pub fn copy_context(&self) -> &Arc<dyn CopyContext> {
        &self.copy_context
    }

    /// Get the shader-visible descriptor heap.
    pub fn descriptor_heap(&self) -> &Arc<dyn DescriptorHeap> {
        &self.descriptor_heap
    }

    /// Create a dedicated memory block.
    pub fn create_memory(&self, descriptor: &MemoryDescriptor) -> Result<GpuMemory, GraphicsError> {
        let memory = self.backend.create_memory(descriptor)?;
        log::trace!(
            "GraphicsDevice: created memory {:?} {:?}, size={}",
            memory.id(),
            descriptor.label,
            descriptor.size
        );
        Ok(memory)
    }

    /// Create a dedicated memory block and map it.
    pub fn create_mapped_memory(
        &self,
        descriptor: &MemoryDescriptor,
    ) -> Result<(GpuMemory, NonNull<u8>), GraphicsError> {
        let memory = self.create_memory(descriptor)?;
        let ptr = self.backend.map_memory(&memory)?;
        Ok((memory, ptr))
    }

    /// Create a GPU buffer.
    ///
    /// See [`Buffer::create`].
    pub fn create_buffer(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<Buffer, GraphicsError> {
        Buffer::create(self, descriptor, initial_data)
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend.name())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemoryLocation;

    #[test]
    fn test_dummy_device() {
        let device = GraphicsDevice::dummy().unwrap();
        assert_eq!(device.name(), "Dummy Backend");
        assert_eq!(device.params().constant_buffer_alignment, 256);
        assert!(!device.capabilities().bindless);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let params = DeviceParameters::new().with_constant_buffer_alignment(3);
        assert!(GraphicsDevice::dummy_with_parameters(params).is_err());
    }

    #[test]
    fn test_create_mapped_memory() {
        let device = GraphicsDevice::dummy().unwrap();
        let (memory, _ptr) = device
            .create_mapped_memory(&MemoryDescriptor::new(128, MemoryLocation::Upload))
            .unwrap();
        assert_eq!(memory.size(), 128);

        let result =
            device.create_mapped_memory(&MemoryDescriptor::new(128, MemoryLocation::DeviceLocal));
        assert!(result.is_err());
    }

    #[test]
    fn test_device_debug() {
        let device = GraphicsDevice::dummy().unwrap();
        let debug = format!("{:?}", device);
        assert!(debug.contains("GraphicsDevice"));
        assert!(debug.contains("Dummy Backend"));
    }
}
