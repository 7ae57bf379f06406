//! GPU buffer resource.

use std::ptr::NonNull;
use std::sync::Arc;

use crate::backend::{GpuMemory, ResourceId};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, check_range};
use crate::types::{
    BufferDescriptor, BufferUsage, CpuAccess, GpuAccess, MapType, MemoryDescriptor,
    checked_align_up,
};

/// A GPU buffer owning one dedicated memory block.
///
/// The CPU access mode picks the placement at creation:
///
/// | `CpuAccess` | memory    | mapped at creation |
/// |-------------|-----------|--------------------|
/// | `None`      | device    | never mappable     |
/// | `Write`     | upload    | write-discard      |
/// | `Read`      | readback  | read               |
///
/// Constant buffers are padded to the device's constant buffer alignment, so
/// [`size`](Self::size) can be larger than the requested size.
///
/// # Example
///
/// ```ignore
/// let mut buffer = device.create_buffer(
///     &BufferDescriptor::new(64, BufferUsage::CONSTANT).with_cpu_access(CpuAccess::Write),
///     None,
/// )?;
/// buffer.update_data(bytemuck::bytes_of(&uniforms), 0)?;
/// ```
pub struct Buffer {
    device: Arc<GraphicsDevice>,
    descriptor: BufferDescriptor,
    memory: GpuMemory,
    mapped: Option<NonNull<u8>>,
}

// SAFETY: `mapped` points into `memory`, which this buffer owns. Writes through
// it require `&mut self`; reads through `&self` follow the mapped-memory rules
// of the backend.
unsafe impl Send for Buffer {}
unsafe impl Sync for Buffer {}

impl Buffer {
    /// Create a buffer and optionally fill it with `initial_data`.
    ///
    /// `initial_data` is written at offset 0 through [`update_data`](Self::update_data).
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero, if the memory block cannot be
    /// created or mapped, or if `initial_data` does not fit.
    pub fn create(
        device: &Arc<GraphicsDevice>,
        descriptor: &BufferDescriptor,
        initial_data: Option<&[u8]>,
    ) -> Result<Self, GraphicsError> {
        crate::profile_function!();

        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let mut descriptor = descriptor.clone();
        if descriptor.usage.contains(BufferUsage::CONSTANT) {
            let alignment = device.params().constant_buffer_alignment;
            descriptor.size = checked_align_up(descriptor.size, alignment).ok_or_else(|| {
                GraphicsError::InvalidParameter(format!(
                    "constant buffer size {} overflows when aligned to {}",
                    descriptor.size, alignment
                ))
            })?;
        }

        let mut memory_descriptor =
            MemoryDescriptor::new(descriptor.size, descriptor.cpu_access.memory_location());
        memory_descriptor.label = descriptor.label.clone();
        let memory = device.create_memory(&memory_descriptor)?;

        let mut buffer = Self {
            device: Arc::clone(device),
            descriptor,
            memory,
            mapped: None,
        };

        match buffer.descriptor.cpu_access {
            CpuAccess::Write => {
                buffer.map(MapType::WriteDiscard)?;
            }
            CpuAccess::Read => {
                buffer.map(MapType::Read)?;
            }
            CpuAccess::None => {}
        }

        log::trace!(
            "Buffer: created {:?} {:?} (size: {}, usage: {:?}, cpu: {:?})",
            buffer.resource_id(),
            buffer.descriptor.label,
            buffer.descriptor.size,
            buffer.descriptor.usage,
            buffer.descriptor.cpu_access
        );

        if let Some(data) = initial_data {
            buffer.update_data(data, 0)?;
        }
        Ok(buffer)
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the buffer descriptor (with the aligned size).
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes after alignment.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the binding usage.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the CPU access mode.
    pub fn cpu_access(&self) -> CpuAccess {
        self.descriptor.cpu_access
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Whether the buffer currently has a CPU mapping.
    pub fn is_mapped(&self) -> bool {
        self.mapped.is_some()
    }

    /// Identity of the underlying memory block.
    pub fn resource_id(&self) -> ResourceId {
        self.memory.id()
    }

    /// Device virtual address of the first byte.
    pub fn gpu_address(&self) -> u64 {
        self.device.backend().device_address(&self.memory)
    }

    pub(crate) fn memory(&self) -> &GpuMemory {
        &self.memory
    }

    /// Write `data` into the buffer at `offset`.
    ///
    /// Write-access buffers are updated with a direct copy into the mapping
    /// (re-mapping first if [`unmap`](Self::unmap) was called). Other buffers go
    /// through the device's copy context.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidRange`] and writes nothing if the range
    /// does not fit; otherwise propagates copy context failures.
    pub fn update_data(&mut self, data: &[u8], offset: u64) -> Result<(), GraphicsError> {
        crate::profile_scope!("Buffer::update_data");

        if data.is_empty() {
            return Ok(());
        }
        if let Err(err) = check_range(offset, data.len() as u64, self.size()) {
            log::warn!("Buffer::update_data: {} on {:?}, update skipped", err, self.label());
            return Err(err);
        }

        if self.descriptor.cpu_access == CpuAccess::Write {
            let ptr = self.map(MapType::WriteDiscard)?;
            // SAFETY: the range was checked against the buffer size and the
            // mapping covers the whole buffer.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    data.as_ptr(),
                    ptr.as_ptr().add(offset as usize),
                    data.len(),
                );
            }
            return Ok(());
        }

        if self.descriptor.cpu_access == CpuAccess::Read && self.is_mapped() {
            log::warn!(
                "Buffer::update_data: {:?} is mapped for reading while being written",
                self.label()
            );
        }
        self.device
            .copy_context()
            .update_buffer(&self.memory, offset, data)
    }

    /// Copy bytes starting at `offset` into `out`.
    ///
    /// Only buffers created with [`CpuAccess::Read`] can be read; use
    /// [`map`](Self::map) on others.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::AccessMismatch`] for buffers without read access
    /// and [`GraphicsError::InvalidRange`] if the range does not fit.
    pub fn read_data(&self, offset: u64, out: &mut [u8]) -> Result<(), GraphicsError> {
        if self.descriptor.cpu_access != CpuAccess::Read {
            log::error!(
                "Buffer::read_data: {:?} was not created with read access, use map() instead",
                self.label()
            );
            return Err(GraphicsError::AccessMismatch(format!(
                "read_data on buffer {:?} created with {:?} access",
                self.label(),
                self.descriptor.cpu_access
            )));
        }
        if out.is_empty() {
            return Ok(());
        }
        check_range(offset, out.len() as u64, self.size())?;

        let (ptr, temporary) = match self.mapped {
            Some(ptr) => (ptr, false),
            None => (self.device.backend().map_memory(&self.memory)?, true),
        };
        // SAFETY: the range was checked against the buffer size.
        unsafe {
            std::ptr::copy_nonoverlapping(
                ptr.as_ptr().add(offset as usize),
                out.as_mut_ptr(),
                out.len(),
            );
        }
        if temporary {
            self.device.backend().unmap_memory(&self.memory);
        }
        Ok(())
    }

    /// Map the buffer and return a pointer to its first byte.
    ///
    /// `MapType::Read` needs read access and `MapType::WriteDiscard` needs write
    /// access. Mapping an already mapped buffer returns the cached pointer.
    /// After a write-discard map the previous contents are undefined.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::AccessMismatch`] if the map type does not match
    /// the buffer's CPU access mode.
    pub fn map(&mut self, map_type: MapType) -> Result<NonNull<u8>, GraphicsError> {
        if map_type.required_access() != self.descriptor.cpu_access {
            log::error!(
                "Buffer::map: {:?} requires {:?} access, buffer {:?} has {:?}",
                map_type,
                map_type.required_access(),
                self.label(),
                self.descriptor.cpu_access
            );
            return Err(GraphicsError::AccessMismatch(format!(
                "cannot map buffer {:?} for {:?}",
                self.label(),
                map_type
            )));
        }

        if let Some(ptr) = self.mapped {
            return Ok(ptr);
        }
        let ptr = self.device.backend().map_memory(&self.memory)?;
        self.mapped = Some(ptr);
        Ok(ptr)
    }

    /// Release the CPU mapping. Does nothing if the buffer is not mapped.
    pub fn unmap(&mut self) {
        if self.mapped.take().is_some() {
            self.device.backend().unmap_memory(&self.memory);
        }
    }

    /// Copy the whole buffer into `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidRange`] if `dst` is smaller than this buffer.
    pub fn copy_to(&self, dst: &Buffer) -> Result<(), GraphicsError> {
        self.copy_region_to(dst, 0, 0, self.size())
    }

    /// Copy `count` bytes from `src_offset` in this buffer to `dst_offset` in `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidRange`] if either range does not fit.
    pub fn copy_region_to(
        &self,
        dst: &Buffer,
        src_offset: u64,
        dst_offset: u64,
        count: u64,
    ) -> Result<(), GraphicsError> {
        if count == 0 {
            return Ok(());
        }
        check_range(src_offset, count, self.size())?;
        check_range(dst_offset, count, dst.size())?;
        self.device
            .copy_context()
            .copy_buffer(&self.memory, src_offset, &dst.memory, dst_offset, count)
    }

    /// Get the bindless handle of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::FeatureNotSupported`] on backends without
    /// bindless buffers.
    pub fn bindless_handle(&self) -> Result<u64, GraphicsError> {
        self.device.backend().bindless_handle(&self.memory)
    }

    /// Make the buffer resident for GPU access and return its GPU handle.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::FeatureNotSupported`] on backends without
    /// manual residency control.
    pub fn make_resident(&self, access: GpuAccess) -> Result<u64, GraphicsError> {
        self.device.backend().make_resident(&self.memory, access)
    }

    /// Evict the buffer from GPU memory.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::FeatureNotSupported`] on backends without
    /// manual residency control.
    pub fn evict(&self) -> Result<(), GraphicsError> {
        self.device.backend().evict(&self.memory)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.unmap();
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("cpu_access", &self.descriptor.cpu_access)
            .field("label", &self.descriptor.label)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);
