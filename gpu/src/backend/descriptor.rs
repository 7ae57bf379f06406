//! Shader-visible descriptor heap.
//!
//! A [`DescriptorHeap`] hands out slots for view descriptors. Slots are
//! recycled, so a [`DescriptorHandle`] carries a generation: a handle to a
//! freed-and-reused slot never compares equal to the new occupant.

use parking_lot::Mutex;

use crate::error::GraphicsError;

use super::ResourceId;

/// One slot in a descriptor heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle {
    /// Slot index inside the heap.
    pub slot: u32,
    /// Reuse count of the slot when this handle was issued.
    pub generation: u32,
}

/// Contents of a constant buffer view descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantBufferViewDesc {
    /// Resource the view points into.
    pub resource: ResourceId,
    /// Device address of the first byte.
    pub buffer_location: u64,
    /// Size of the viewed range in bytes.
    pub size_in_bytes: u32,
}

/// Shader-visible descriptor heap service.
pub trait DescriptorHeap: Send + Sync {
    /// Reserve a slot.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::DescriptorHeapFull`] when no slot is free.
    fn allocate_entry(&self) -> Result<DescriptorHandle, GraphicsError>;

    /// Write a constant buffer view into a reserved slot.
    fn create_constant_buffer_view(
        &self,
        entry: DescriptorHandle,
        desc: &ConstantBufferViewDesc,
    ) -> Result<(), GraphicsError>;

    /// Return a slot to the heap.
    fn release_entry(&self, entry: DescriptorHandle);
}

#[derive(Debug, Default)]
struct SlotState {
    generations: Vec<u32>,
    views: Vec<Option<ConstantBufferViewDesc>>,
    occupied: Vec<bool>,
    free_list: Vec<u32>,
}

/// CPU-side descriptor heap with a fixed number of recyclable slots.
///
/// Used by the dummy backend and as the bookkeeping half of real heaps.
#[derive(Debug)]
pub struct SlotDescriptorHeap {
    capacity: u32,
    state: Mutex<SlotState>,
}

impl SlotDescriptorHeap {
    /// Create a heap with `capacity` slots.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Total number of slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of slots currently reserved.
    pub fn len(&self) -> u32 {
        let state = self.state.lock();
        state.occupied.iter().filter(|o| **o).count() as u32
    }

    /// Whether no slot is reserved.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The view written into `entry`, if the handle is still live.
    pub fn view(&self, entry: DescriptorHandle) -> Option<ConstantBufferViewDesc> {
        let state = self.state.lock();
        let slot = entry.slot as usize;
        if state.generations.get(slot) != Some(&entry.generation) || !state.occupied[slot] {
            return None;
        }
        state.views[slot]
    }
}

impl DescriptorHeap for SlotDescriptorHeap {
    fn allocate_entry(&self) -> Result<DescriptorHandle, GraphicsError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let slot = match state.free_list.pop() {
            Some(slot) => {
                let index = slot as usize;
                state.generations[index] = state.generations[index].wrapping_add(1);
                state.views[index] = None;
                slot
            }
            None => {
                let slot = state.generations.len() as u32;
                if slot >= self.capacity {
                    return Err(GraphicsError::DescriptorHeapFull);
                }
                state.generations.push(0);
                state.views.push(None);
                state.occupied.push(false);
                slot
            }
        };
        state.occupied[slot as usize] = true;
        Ok(DescriptorHandle {
            slot,
            generation: state.generations[slot as usize],
        })
    }

    fn create_constant_buffer_view(
        &self,
        entry: DescriptorHandle,
        desc: &ConstantBufferViewDesc,
    ) -> Result<(), GraphicsError> {
        let mut state = self.state.lock();
        let slot = entry.slot as usize;
        if state.generations.get(slot) != Some(&entry.generation) || !state.occupied[slot] {
            return Err(GraphicsError::InvalidParameter(format!(
                "stale descriptor handle {entry:?}"
            )));
        }
        state.views[slot] = Some(*desc);
        Ok(())
    }

    fn release_entry(&self, entry: DescriptorHandle) {
        let mut state = self.state.lock();
        let slot = entry.slot as usize;
        if state.generations.get(slot) != Some(&entry.generation) || !state.occupied[slot] {
            log::warn!("SlotDescriptorHeap: ignoring release of stale handle {:?}", entry);
            return;
        }
        state.occupied[slot] = false;
        state.views[slot] = None;
        state.free_list.push(entry.slot);
    }
}
