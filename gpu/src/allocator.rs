//! Page-based upload allocator with fence-gated reclamation.
//!
//! Short-lived CPU-written data (per-draw constants, dynamic vertices) is
//! bump-allocated out of large, persistently mapped upload pages instead of
//! getting a dedicated resource per request.
//!
//! # Lifecycle
//!
//! ```text
//!  allocate ──► active page (bump cursor) ──full──► used pages ──count 0──► available pages
//!                   ▲                                                            │
//!                   └─────────────────────── reused as next active ◄─────────────┘
//! ```
//!
//! - Every allocation is stamped with the fence's CPU value at allocation time.
//! - [`ResourceAllocator::release`] only queues the allocation.
//! - [`ResourceAllocator::execute_deferred_releases`] reclaims queued allocations
//!   whose stamp is strictly below the fence's GPU value. Call it once per frame.
//! - Requests larger than the page size get a dedicated "mega" block that is
//!   dropped when its release clears.
//!
//! Pages are never freed before the allocator itself; emptied pages are pooled.
//!
//! # Thread Safety
//!
//! `ResourceAllocator` is NOT internally synchronized. All calls must come from
//! one submitting thread or be serialized by the owner.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::ptr::NonNull;
use std::sync::Arc;

use crate::backend::{GpuMemory, ResourceId};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, check_range};
use crate::fence::GpuFence;
use crate::types::{MemoryDescriptor, MemoryLocation, align_up};

/// Identifier of an upload page.
///
/// Ids grow each time a new page becomes active. [`PageId::MEGA`] tags
/// allocations that own a dedicated block instead of living in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PageId(pub u64);

impl PageId {
    /// Sentinel for oversized allocations that bypass paging.
    pub const MEGA: PageId = PageId(u64::MAX);
}

/// One slice handed out by [`ResourceAllocator::allocate`].
///
/// The CPU pointer stays valid until the allocation is released and the fence
/// has passed its stamp. Releasing takes the resource handle out, so a second
/// release of the same value is a no-op.
#[derive(Debug, Default)]
pub struct AllocationData {
    page_id: PageId,
    offset: u64,
    size: u64,
    device_address: u64,
    cpu_ptr: Option<NonNull<u8>>,
    resource: Option<ResourceId>,
    fence_value: u64,
}

impl AllocationData {
    /// Page this allocation lives in, or [`PageId::MEGA`].
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Whether this allocation owns a dedicated block.
    pub fn is_mega(&self) -> bool {
        self.page_id == PageId::MEGA
    }

    /// Byte offset inside the page (0 for mega allocations).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Device address of the first byte.
    pub fn device_address(&self) -> u64 {
        self.device_address
    }

    /// CPU pointer to the first byte, `None` once released.
    pub fn cpu_ptr(&self) -> Option<NonNull<u8>> {
        self.cpu_ptr
    }

    /// Underlying resource, `None` once released.
    pub fn resource(&self) -> Option<ResourceId> {
        self.resource
    }

    /// Fence CPU value at allocation time.
    pub fn fence_value(&self) -> u64 {
        self.fence_value
    }

    /// Copy `bytes` into the allocation at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidRange`] if the write does not fit and
    /// [`GraphicsError::InvalidParameter`] if the allocation was released.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), GraphicsError> {
        let Some(ptr) = self.cpu_ptr else {
            return Err(GraphicsError::InvalidParameter(
                "write to a released allocation".to_string(),
            ));
        };
        if bytes.is_empty() {
            return Ok(());
        }
        check_range(offset, bytes.len() as u64, self.size)?;
        // SAFETY: the range lies inside this allocation, which the allocator
        // keeps mapped until the release clears the fence.
        unsafe {
            std::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                ptr.as_ptr().add(offset as usize),
                bytes.len(),
            );
        }
        Ok(())
    }

    /// View the allocation as a mutable byte slice.
    ///
    /// # Safety
    ///
    /// The allocation must not have been released, and the GPU must not be
    /// reading the slice concurrently.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        match self.cpu_ptr {
            // SAFETY: upheld by the caller.
            Some(ptr) => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.size as usize) },
            None => &mut [],
        }
    }
}

/// A persistently mapped upload page.
struct Page {
    memory: GpuMemory,
    base_ptr: NonNull<u8>,
    base_address: u64,
    current_offset: u64,
    allocation_count: u32,
}

impl Page {
    fn reset(&mut self) {
        self.current_offset = 0;
        self.allocation_count = 0;
    }
}

/// A release waiting for the fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PendingRelease {
    fence_value: u64,
    sequence: u64,
    page_id: PageId,
    resource: ResourceId,
}

/// Counters describing allocator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocatorStats {
    /// Pages created from the device.
    pub pages_created: u64,
    /// Times a pooled page became active again.
    pub pages_reused: u64,
    /// Oversized allocations served with a dedicated block.
    pub mega_allocations: u64,
    /// Dedicated blocks still alive.
    pub live_mega_pages: usize,
    /// Full pages still holding live allocations.
    pub used_pages: usize,
    /// Empty pages waiting for reuse.
    pub available_pages: usize,
    /// Releases not yet cleared by the fence.
    pub pending_releases: usize,
}

/// Page-based linear allocator for transient upload memory.
///
/// # Example
///
/// ```ignore
/// let mut allocator = ResourceAllocator::new(&device, 64 * 1024, fence.clone())?;
///
/// let mut data = allocator.allocate(size_of::<CameraUniforms>() as u64, 256)?;
/// data.write(0, bytemuck::bytes_of(&camera))?;
/// // bind data.device_address() ...
/// allocator.release(&mut data);
///
/// // once per frame, after polling the fence
/// allocator.execute_deferred_releases();
/// ```
pub struct ResourceAllocator {
    device: Arc<GraphicsDevice>,
    fence: Arc<GpuFence>,
    page_size: u64,
    /// Page arena. Indices stay stable for the allocator's lifetime.
    pages: Vec<Page>,
    active_page: usize,
    current_page_id: PageId,
    used_pages: HashMap<PageId, usize>,
    available_pages: VecDeque<usize>,
    mega_pages: HashMap<ResourceId, GpuMemory>,
    deferred_releases: BinaryHeap<Reverse<PendingRelease>>,
    next_sequence: u64,
    pages_reused: u64,
    mega_allocations: u64,
}

// SAFETY: the raw pointers point into memory owned by `pages`, which moves
// with the allocator. The allocator is used from one thread at a time.
unsafe impl Send for ResourceAllocator {}

impl ResourceAllocator {
    /// Create an allocator with one active page of `page_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `page_size` is zero or the first page cannot be
    /// created and mapped.
    pub fn new(
        device: &Arc<GraphicsDevice>,
        page_size: u64,
        fence: Arc<GpuFence>,
    ) -> Result<Self, GraphicsError> {
        if page_size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "page size cannot be zero".to_string(),
            ));
        }

        let first = create_page(device, page_size)?;
        log::debug!("ResourceAllocator: created with page size {}", page_size);

        Ok(Self {
            device: Arc::clone(device),
            fence,
            page_size,
            pages: vec![first],
            active_page: 0,
            current_page_id: PageId(0),
            used_pages: HashMap::new(),
            available_pages: VecDeque::new(),
            mega_pages: HashMap::new(),
            deferred_releases: BinaryHeap::new(),
            next_sequence: 0,
            pages_reused: 0,
            mega_allocations: 0,
        })
    }

    /// Create an allocator using the device's configured upload page size.
    pub fn with_default_page_size(
        device: &Arc<GraphicsDevice>,
        fence: Arc<GpuFence>,
    ) -> Result<Self, GraphicsError> {
        Self::new(device, device.params().upload_page_size, fence)
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// The fence gating reclamation.
    pub fn fence(&self) -> &Arc<GpuFence> {
        &self.fence
    }

    /// Id of the page currently receiving allocations.
    pub fn current_page_id(&self) -> PageId {
        self.current_page_id
    }

    /// Bump cursor of the active page.
    pub fn active_page_offset(&self) -> u64 {
        self.pages[self.active_page].current_offset
    }

    /// Live allocations in the active page.
    pub fn active_page_allocations(&self) -> u32 {
        self.pages[self.active_page].allocation_count
    }

    /// Resource backing the active page.
    pub fn active_page_resource(&self) -> ResourceId {
        self.pages[self.active_page].memory.id()
    }

    /// Current counters.
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            pages_created: self.pages.len() as u64,
            pages_reused: self.pages_reused,
            mega_allocations: self.mega_allocations,
            live_mega_pages: self.mega_pages.len(),
            used_pages: self.used_pages.len(),
            available_pages: self.available_pages.len(),
            pending_releases: self.deferred_releases.len(),
        }
    }

    /// Allocate `size` bytes aligned to `alignment` within a page.
    ///
    /// `alignment` is relative to the page start and must be a power of two.
    /// Requests larger than the page size get a dedicated block.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] for a bad alignment, or the
    /// device error if a new page or dedicated block cannot be created. A
    /// failed call leaves the allocator unchanged.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Result<AllocationData, GraphicsError> {
        crate::profile_scope!("ResourceAllocator::allocate");

        if !alignment.is_power_of_two() {
            return Err(GraphicsError::InvalidParameter(format!(
                "alignment must be a power of 2, got {alignment}"
            )));
        }

        let mut data = if size > self.page_size {
            self.allocate_mega_page(size)?
        } else {
            let mut offset = align_up(self.pages[self.active_page].current_offset, alignment);
            if offset + size > self.page_size {
                self.allocate_new_page()?;
                offset = 0;
            }

            let page = &mut self.pages[self.active_page];
            page.current_offset = offset + size;
            page.allocation_count += 1;

            AllocationData {
                page_id: self.current_page_id,
                offset,
                size,
                device_address: page.base_address + offset,
                // SAFETY: offset + size <= page_size, so the pointer stays inside the page.
                cpu_ptr: Some(unsafe { page.base_ptr.add(offset as usize) }),
                resource: Some(page.memory.id()),
                fence_value: 0,
            }
        };

        data.fence_value = self.fence.cpu_value();
        log::trace!(
            "ResourceAllocator: allocated {} bytes in {:?} at offset {} (fence {})",
            size,
            data.page_id,
            data.offset,
            data.fence_value
        );
        Ok(data)
    }

    /// Queue an allocation for reclamation once the fence passes its stamp.
    ///
    /// The resource handle is taken out of `data`; releasing the same value
    /// again, or a default-constructed value, does nothing.
    pub fn release(&mut self, data: &mut AllocationData) {
        let Some(resource) = data.resource.take() else {
            log::trace!("ResourceAllocator: ignoring release of an empty allocation");
            return;
        };
        data.cpu_ptr = None;

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.deferred_releases.push(Reverse(PendingRelease {
            fence_value: data.fence_value,
            sequence,
            page_id: data.page_id,
            resource,
        }));
    }

    /// Reclaim every queued release whose stamp is below the fence's GPU value.
    ///
    /// Never waits on the GPU. Returns the number of releases processed.
    pub fn execute_deferred_releases(&mut self) -> usize {
        crate::profile_scope!("ResourceAllocator::execute_deferred_releases");

        let gpu_value = self.fence.gpu_value();
        let mut reclaimed = 0;

        while let Some(Reverse(pending)) = self.deferred_releases.peek().copied() {
            if pending.fence_value >= gpu_value {
                break;
            }
            self.deferred_releases.pop();
            self.reclaim(pending);
            reclaimed += 1;
        }

        if reclaimed > 0 {
            log::trace!(
                "ResourceAllocator: reclaimed {} allocations (gpu value {}, {} pending)",
                reclaimed,
                gpu_value,
                self.deferred_releases.len()
            );
        }
        crate::profile_plot!("upload_pending_releases", self.deferred_releases.len());
        reclaimed
    }

    fn reclaim(&mut self, pending: PendingRelease) {
        if pending.page_id == PageId::MEGA {
            if self.mega_pages.remove(&pending.resource).is_none() {
                log::error!(
                    "ResourceAllocator: released unknown mega page {:?}",
                    pending.resource
                );
            }
            return;
        }

        if pending.page_id == self.current_page_id {
            let page = &mut self.pages[self.active_page];
            page.allocation_count = page.allocation_count.saturating_sub(1);
            if page.allocation_count == 0 {
                page.current_offset = 0;
            }
            return;
        }

        let Some(&index) = self.used_pages.get(&pending.page_id) else {
            log::error!(
                "ResourceAllocator: release for unknown page {:?}",
                pending.page_id
            );
            return;
        };
        let page = &mut self.pages[index];
        page.allocation_count = page.allocation_count.saturating_sub(1);
        if page.allocation_count == 0 {
            self.used_pages.remove(&pending.page_id);
            self.available_pages.push_back(index);
            log::debug!(
                "ResourceAllocator: {:?} is empty, returned to pool ({} available)",
                pending.page_id,
                self.available_pages.len()
            );
        }
    }

    /// Retire the active page and make a fresh or pooled page active.
    fn allocate_new_page(&mut self) -> Result<(), GraphicsError> {
        let next = match self.available_pages.pop_front() {
            Some(index) => {
                self.pages[index].reset();
                self.pages_reused += 1;
                index
            }
            None => {
                let page = create_page(&self.device, self.page_size)?;
                self.pages.push(page);
                self.pages.len() - 1
            }
        };

        let retired = std::mem::replace(&mut self.active_page, next);
        if self.pages[retired].allocation_count == 0 {
            self.pages[retired].reset();
            self.available_pages.push_back(retired);
        } else {
            self.used_pages.insert(self.current_page_id, retired);
        }
        self.current_page_id = PageId(self.current_page_id.0 + 1);

        log::debug!(
            "ResourceAllocator: {:?} is now active ({} pages, {} used, {} available)",
            self.current_page_id,
            self.pages.len(),
            self.used_pages.len(),
            self.available_pages.len()
        );
        Ok(())
    }

    fn allocate_mega_page(&mut self, size: u64) -> Result<AllocationData, GraphicsError> {
        let descriptor =
            MemoryDescriptor::new(size, MemoryLocation::Upload).with_label("upload_mega_page");
        let (memory, ptr) = self.device.create_mapped_memory(&descriptor)?;
        let resource = memory.id();
        let device_address = self.device.backend().device_address(&memory);

        self.mega_pages.insert(resource, memory);
        self.mega_allocations += 1;
        log::debug!(
            "ResourceAllocator: {} bytes exceed the page size, created mega page {:?}",
            size,
            resource
        );

        Ok(AllocationData {
            page_id: PageId::MEGA,
            offset: 0,
            size,
            device_address,
            cpu_ptr: Some(ptr),
            resource: Some(resource),
            fence_value: 0,
        })
    }
}

fn create_page(device: &GraphicsDevice, page_size: u64) -> Result<Page, GraphicsError> {
    let descriptor = MemoryDescriptor::new(page_size, MemoryLocation::Upload).with_label("upload_page");
    let (memory, base_ptr) = device.create_mapped_memory(&descriptor)?;
    let base_address = device.backend().device_address(&memory);
    log::debug!("ResourceAllocator: created page {:?}", memory.id());
    Ok(Page {
        memory,
        base_ptr,
        base_address,
        current_offset: 0,
        allocation_count: 0,
    })
}

impl Drop for ResourceAllocator {
    fn drop(&mut self) {
        self.execute_deferred_releases();
        if !self.deferred_releases.is_empty() {
            log::warn!(
                "ResourceAllocator: dropped with {} releases still behind the fence",
                self.deferred_releases.len()
            );
        }
    }
}

impl std::fmt::Debug for ResourceAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAllocator")
            .field("page_size", &self.page_size)
            .field("current_page_id", &self.current_page_id)
            .field("active_page_offset", &self.active_page_offset())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(page_size: u64) -> (ResourceAllocator, Arc<GpuFence>) {
        let device = GraphicsDevice::dummy().unwrap();
        let fence = Arc::new(GpuFence::new());
        let allocator = ResourceAllocator::new(&device, page_size, fence.clone()).unwrap();
        (allocator, fence)
    }

    /// Signal the current frame and mark it complete on the GPU.
    fn retire_frame(fence: &GpuFence) {
        let value = fence.signal();
        fence.complete(value).unwrap();
    }

    #[test]
    fn test_zero_page_size() {
        let device = GraphicsDevice::dummy().unwrap();
        let result = ResourceAllocator::new(&device, 0, Arc::new(GpuFence::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_bump_allocation() {
        let (mut allocator, fence) = setup(4096);

        let a = allocator.allocate(100, 64).unwrap();
        let b = allocator.allocate(100, 64).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 128);
        assert_eq!(b.device_address() - a.device_address(), 128);
        assert_eq!(a.page_id(), b.page_id());
        assert_eq!(a.fence_value(), fence.cpu_value());
        assert_eq!(allocator.active_page_allocations(), 2);
        assert_eq!(allocator.active_page_offset(), 228);
    }

    #[test]
    fn test_invalid_alignment() {
        let (mut allocator, _fence) = setup(4096);
        assert!(allocator.allocate(16, 0).is_err());
        assert!(allocator.allocate(16, 48).is_err());
        assert_eq!(allocator.active_page_allocations(), 0);
    }

    #[test]
    fn test_exact_fit_stays_in_page() {
        let (mut allocator, _fence) = setup(1024);
        let a = allocator.allocate(512, 256).unwrap();
        let b = allocator.allocate(512, 256).unwrap();
        assert_eq!(a.page_id(), b.page_id());
        assert_eq!(allocator.active_page_offset(), 1024);
        assert_eq!(allocator.stats().pages_created, 1);
    }

    #[test]
    fn test_overflow_rotates_page() {
        let (mut allocator, _fence) = setup(4096);
        let first_resource = allocator.active_page_resource();

        let a = allocator.allocate(3000, 256).unwrap();
        let b = allocator.allocate(3000, 256).unwrap();

        assert_eq!(a.page_id(), PageId(0));
        assert_eq!(b.page_id(), PageId(1));
        assert_eq!(b.offset(), 0);
        assert_eq!(a.resource(), Some(first_resource));
        assert_ne!(b.resource(), a.resource());

        let stats = allocator.stats();
        assert_eq!(stats.pages_created, 2);
        assert_eq!(stats.used_pages, 1);
    }

    #[test]
    fn test_mega_page_bypasses_active_page() {
        let (mut allocator, _fence) = setup(1024);
        allocator.allocate(100, 16).unwrap();
        let offset = allocator.active_page_offset();
        let count = allocator.active_page_allocations();

        let mega = allocator.allocate(5000, 256).unwrap();
        assert!(mega.is_mega());
        assert_eq!(mega.size(), 5000);
        assert_eq!(allocator.active_page_offset(), offset);
        assert_eq!(allocator.active_page_allocations(), count);
        assert_eq!(allocator.stats().live_mega_pages, 1);
    }

    #[test]
    fn test_mega_page_released_after_fence() {
        let (mut allocator, fence) = setup(1024);
        let mut mega = allocator.allocate(2048, 256).unwrap();
        allocator.release(&mut mega);

        assert_eq!(allocator.execute_deferred_releases(), 0);
        assert_eq!(allocator.stats().live_mega_pages, 1);

        retire_frame(&fence);
        assert_eq!(allocator.execute_deferred_releases(), 1);
        assert_eq!(allocator.stats().live_mega_pages, 0);
    }

    #[test]
    fn test_release_is_deferred_until_fence_passes() {
        let (mut allocator, fence) = setup(4096);
        let mut a = allocator.allocate(256, 256).unwrap();
        allocator.release(&mut a);

        // gpu_value == stamp is not enough; the stamp must be strictly below.
        let value = fence.signal();
        assert_eq!(value, a.fence_value());
        fence.complete(value).unwrap();
        assert_eq!(fence.gpu_value(), a.fence_value());
        assert_eq!(allocator.execute_deferred_releases(), 0);
        assert_eq!(allocator.active_page_allocations(), 1);

        retire_frame(&fence);
        assert_eq!(allocator.execute_deferred_releases(), 1);
        assert_eq!(allocator.active_page_allocations(), 0);
        assert_eq!(allocator.active_page_offset(), 0);
    }

    #[test]
    fn test_double_release_is_noop() {
        let (mut allocator, fence) = setup(4096);
        let mut a = allocator.allocate(64, 64).unwrap();
        let _b = allocator.allocate(64, 64).unwrap();
        allocator.release(&mut a);
        allocator.release(&mut a);
        assert!(a.cpu_ptr().is_none());
        assert_eq!(allocator.stats().pending_releases, 1);

        let mut empty = AllocationData::default();
        allocator.release(&mut empty);
        assert_eq!(allocator.stats().pending_releases, 1);

        retire_frame(&fence);
        retire_frame(&fence);
        allocator.execute_deferred_releases();
        assert_eq!(allocator.active_page_allocations(), 1);
    }

    #[test]
    fn test_page_returns_to_pool_and_is_reused() {
        let (mut allocator, fence) = setup(4096);
        let first_resource = allocator.active_page_resource();

        let mut a = allocator.allocate(3000, 256).unwrap();
        let _b = allocator.allocate(3000, 256).unwrap();
        allocator.release(&mut a);
        retire_frame(&fence);
        retire_frame(&fence);
        allocator.execute_deferred_releases();

        let stats = allocator.stats();
        assert_eq!(stats.used_pages, 0);
        assert_eq!(stats.available_pages, 1);

        // Overflow page 1: the pooled page comes back instead of a new one.
        let c = allocator.allocate(3000, 256).unwrap();
        assert_eq!(c.resource(), Some(first_resource));
        assert_eq!(c.offset(), 0);
        let stats = allocator.stats();
        assert_eq!(stats.pages_created, 2);
        assert_eq!(stats.pages_reused, 1);
    }

    #[test]
    fn test_out_of_order_release_is_drained_by_fence_value() {
        let (mut allocator, fence) = setup(4096);
        let mut early = allocator.allocate(64, 64).unwrap();
        fence.signal();
        fence.signal();
        let mut late = allocator.allocate(64, 64).unwrap();
        assert!(late.fence_value() > early.fence_value());

        // Release the newer allocation first.
        allocator.release(&mut late);
        allocator.release(&mut early);

        fence.complete(early.fence_value() + 1).unwrap();
        assert_eq!(allocator.execute_deferred_releases(), 1);
        assert_eq!(allocator.stats().pending_releases, 1);
        assert_eq!(allocator.active_page_allocations(), 1);
    }

    #[test]
    fn test_write_and_read_back() {
        let (mut allocator, _fence) = setup(4096);
        let mut a = allocator.allocate(8, 8).unwrap();
        a.write(0, &[1, 2, 3, 4]).unwrap();
        a.write(4, &[5, 6, 7, 8]).unwrap();
        assert!(a.write(6, &[0; 4]).is_err());

        let bytes = unsafe { a.as_mut_slice() };
        assert_eq!(bytes, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_write_after_release_fails() {
        let (mut allocator, _fence) = setup(4096);
        let mut a = allocator.allocate(8, 8).unwrap();
        allocator.release(&mut a);
        assert!(matches!(
            a.write(0, &[1]),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_failed_page_creation_leaves_state_unchanged() {
        let backend = Arc::new(crate::backend::DummyBackend::new().with_memory_budget(4096));
        let device = GraphicsDevice::new(
            backend,
            Arc::new(crate::backend::DummyCopyContext::new()),
            Arc::new(crate::backend::SlotDescriptorHeap::new(16)),
            crate::DeviceParameters::default(),
        )
        .unwrap();
        let mut allocator =
            ResourceAllocator::new(&device, 4096, Arc::new(GpuFence::new())).unwrap();

        allocator.allocate(3000, 256).unwrap();
        let result = allocator.allocate(3000, 256);
        assert_eq!(result.unwrap_err(), GraphicsError::OutOfMemory);
        assert_eq!(allocator.current_page_id(), PageId(0));
        assert_eq!(allocator.active_page_allocations(), 1);
        assert_eq!(allocator.stats().used_pages, 0);
    }
}
