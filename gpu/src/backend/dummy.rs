//! Dummy GPU backend for testing and development.
//!
//! Memory blocks live on the host heap, so every placement is addressable and
//! the copy context is a plain `memcpy`. Device addresses are handed out from a
//! fake virtual range. The backend counts creations and map calls, and can be
//! given a memory budget to simulate out-of-memory failures.

use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::error::{GraphicsError, check_range};
use crate::types::{GpuAccess, MemoryDescriptor, MemoryLocation, align_up};

use super::{CopyContext, DeviceCapabilities, GpuBackend, GpuMemory, ResourceId};

/// Base of the fake device address range.
const ADDRESS_BASE: u64 = 0x1_0000_0000;
/// Alignment of fake device addresses (64 KiB, like committed resources).
const ADDRESS_ALIGNMENT: u64 = 64 * 1024;

/// A host-backed memory block.
pub struct DummyMemory {
    id: ResourceId,
    location: MemoryLocation,
    address: u64,
    storage: NonNull<[u8]>,
    mapped: AtomicBool,
    live_bytes: Arc<AtomicU64>,
}

// SAFETY: `storage` is exclusively owned by this block and freed only in Drop.
// Concurrent access to the bytes is governed by the same rules as mapped GPU
// memory: callers synchronize externally.
unsafe impl Send for DummyMemory {}
unsafe impl Sync for DummyMemory {}

impl DummyMemory {
    /// Resource identity.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.storage.len() as u64
    }

    /// Placement.
    pub fn location(&self) -> MemoryLocation {
        self.location
    }

    /// Fake device address of the first byte.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Whether the block is currently mapped.
    pub fn is_mapped(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    fn base_ptr(&self) -> NonNull<u8> {
        self.storage.cast()
    }
}

impl Drop for DummyMemory {
    fn drop(&mut self) {
        self.live_bytes.fetch_sub(self.size(), Ordering::AcqRel);
        // SAFETY: `storage` came from `Box::leak` in `DummyBackend::create_memory`
        // and is dropped exactly once here.
        unsafe { drop(Box::from_raw(self.storage.as_ptr())) };
    }
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    capabilities: DeviceCapabilities,
    memory_budget: Option<u64>,
    live_bytes: Arc<AtomicU64>,
    next_id: AtomicU64,
    next_address: AtomicU64,
    memory_created: AtomicUsize,
    map_calls: AtomicUsize,
    unmap_calls: AtomicUsize,
}

impl DummyBackend {
    /// Create a new dummy backend without bindless or residency support.
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::default())
    }

    /// Create a dummy backend that reports the given capabilities.
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            memory_budget: None,
            live_bytes: Arc::new(AtomicU64::new(0)),
            next_id: AtomicU64::new(1),
            next_address: AtomicU64::new(ADDRESS_BASE),
            memory_created: AtomicUsize::new(0),
            map_calls: AtomicUsize::new(0),
            unmap_calls: AtomicUsize::new(0),
        }
    }

    /// Limit the total live memory; creations beyond it fail with
    /// [`GraphicsError::OutOfMemory`].
    pub fn with_memory_budget(mut self, bytes: u64) -> Self {
        self.memory_budget = Some(bytes);
        self
    }

    /// Number of memory blocks created so far.
    pub fn memory_created(&self) -> usize {
        self.memory_created.load(Ordering::Relaxed)
    }

    /// Number of map calls that reached the backend.
    pub fn map_calls(&self) -> usize {
        self.map_calls.load(Ordering::Relaxed)
    }

    /// Number of unmap calls that reached the backend.
    pub fn unmap_calls(&self) -> usize {
        self.unmap_calls.load(Ordering::Relaxed)
    }

    /// Bytes held by live memory blocks.
    pub fn live_bytes(&self) -> u64 {
        self.live_bytes.load(Ordering::Acquire)
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn create_memory(&self, descriptor: &MemoryDescriptor) -> Result<GpuMemory, GraphicsError> {
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "memory size cannot be zero".to_string(),
            ));
        }
        if descriptor.size > self.capabilities.max_memory_size {
            return Err(GraphicsError::ResourceCreationFailed(format!(
                "memory size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_memory_size
            )));
        }
        if let Some(budget) = self.memory_budget
            && self.live_bytes() + descriptor.size > budget
        {
            log::warn!(
                "DummyBackend: budget of {} bytes exhausted ({} live, {} requested)",
                budget,
                self.live_bytes(),
                descriptor.size
            );
            return Err(GraphicsError::OutOfMemory);
        }

        let storage = vec![0u8; descriptor.size as usize].into_boxed_slice();
        let storage = NonNull::from(Box::leak(storage));

        let span = align_up(descriptor.size, ADDRESS_ALIGNMENT);
        let address = self.next_address.fetch_add(span, Ordering::Relaxed);
        let id = ResourceId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.live_bytes.fetch_add(descriptor.size, Ordering::AcqRel);
        self.memory_created.fetch_add(1, Ordering::Relaxed);

        log::trace!(
            "DummyBackend: created memory {:?} {:?} (size: {}, location: {:?})",
            id,
            descriptor.label,
            descriptor.size,
            descriptor.location
        );

        Ok(GpuMemory::Dummy(DummyMemory {
            id,
            location: descriptor.location,
            address,
            storage,
            mapped: AtomicBool::new(false),
            live_bytes: Arc::clone(&self.live_bytes),
        }))
    }

    fn map_memory(&self, memory: &GpuMemory) -> Result<NonNull<u8>, GraphicsError> {
        let memory = dummy_memory(memory)?;
        if !memory.location.is_host_visible() {
            return Err(GraphicsError::AccessMismatch(format!(
                "memory {:?} is device-local and cannot be mapped",
                memory.id
            )));
        }
        self.map_calls.fetch_add(1, Ordering::Relaxed);
        memory.mapped.store(true, Ordering::Release);
        Ok(memory.base_ptr())
    }

    fn unmap_memory(&self, memory: &GpuMemory) {
        match dummy_memory(memory) {
            Ok(memory) => {
                self.unmap_calls.fetch_add(1, Ordering::Relaxed);
                memory.mapped.store(false, Ordering::Release);
            }
            Err(err) => log::error!("DummyBackend::unmap_memory: {}", err),
        }
    }

    fn device_address(&self, memory: &GpuMemory) -> u64 {
        match dummy_memory(memory) {
            Ok(memory) => memory.address,
            Err(err) => {
                log::error!("DummyBackend::device_address: {}", err);
                0
            }
        }
    }

    fn bindless_handle(&self, memory: &GpuMemory) -> Result<u64, GraphicsError> {
        if !self.capabilities.bindless {
            return Err(GraphicsError::FeatureNotSupported(
                "Dummy Backend has no bindless buffer handles".to_string(),
            ));
        }
        Ok(dummy_memory(memory)?.address)
    }

    fn make_resident(&self, memory: &GpuMemory, access: GpuAccess) -> Result<u64, GraphicsError> {
        if !self.capabilities.manual_residency {
            return Err(GraphicsError::FeatureNotSupported(
                "Dummy Backend has no manual residency control".to_string(),
            ));
        }
        let memory = dummy_memory(memory)?;
        log::trace!("DummyBackend: make_resident {:?} ({:?})", memory.id, access);
        Ok(memory.address)
    }

    fn evict(&self, memory: &GpuMemory) -> Result<(), GraphicsError> {
        if !self.capabilities.manual_residency {
            return Err(GraphicsError::FeatureNotSupported(
                "Dummy Backend has no manual residency control".to_string(),
            ));
        }
        log::trace!("DummyBackend: evict {:?}", memory.id());
        Ok(())
    }
}

/// Copy context for the dummy backend.
///
/// Copies execute immediately on the host.
#[derive(Debug, Default)]
pub struct DummyCopyContext {
    copies: AtomicUsize,
}

impl DummyCopyContext {
    /// Create a new copy context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of update/copy operations recorded.
    pub fn copies(&self) -> usize {
        self.copies.load(Ordering::Relaxed)
    }
}

/// Downcast to dummy memory. Memory from another backend is an
/// [`GraphicsError::Internal`] error for the backend and the copy context alike.
fn dummy_memory(memory: &GpuMemory) -> Result<&DummyMemory, GraphicsError> {
    match memory {
        GpuMemory::Dummy(memory) => Ok(memory),
        #[cfg(feature = "vulkan-backend")]
        GpuMemory::Vulkan(_) => Err(GraphicsError::Internal(
            "Dummy Backend received memory from another backend".to_string(),
        )),
    }
}

impl CopyContext for DummyCopyContext {
    fn update_buffer(&self, dst: &GpuMemory, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        let dst = dummy_memory(dst)?;
        if data.is_empty() {
            return Ok(());
        }
        check_range(offset, data.len() as u64, dst.size())?;
        log::trace!(
            "DummyCopyContext: update {:?} offset={} len={}",
            dst.id,
            offset,
            data.len()
        );
        // SAFETY: the range was checked against the block size above.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                dst.base_ptr().as_ptr().add(offset as usize),
                data.len(),
            );
        }
        self.copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn copy_buffer(
        &self,
        src: &GpuMemory,
        src_offset: u64,
        dst: &GpuMemory,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), GraphicsError> {
        let src = dummy_memory(src)?;
        let dst = dummy_memory(dst)?;
        if size == 0 {
            return Ok(());
        }
        check_range(src_offset, size, src.size())?;
        check_range(dst_offset, size, dst.size())?;
        log::trace!(
            "DummyCopyContext: copy {:?}+{} -> {:?}+{} ({} bytes)",
            src.id,
            src_offset,
            dst.id,
            dst_offset,
            size
        );
        // SAFETY: both ranges were checked; `copy` tolerates overlap when src == dst.
        unsafe {
            std::ptr::copy(
                src.base_ptr().as_ptr().add(src_offset as usize),
                dst.base_ptr().as_ptr().add(dst_offset as usize),
                size as usize,
            );
        }
        self.copies.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
