//! Raw device memory descriptors.

/// Where a device memory block is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryLocation {
    /// Fast device memory, not CPU-visible.
    #[default]
    DeviceLocal,
    /// CPU-write-optimized memory the device reads from.
    Upload,
    /// CPU-read-optimized memory the device writes into.
    Readback,
}

impl MemoryLocation {
    /// Whether memory at this location can be mapped by the CPU.
    pub fn is_host_visible(self) -> bool {
        !matches!(self, Self::DeviceLocal)
    }
}

/// Descriptor for one dedicated device memory block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Placement.
    pub location: MemoryLocation,
}

impl MemoryDescriptor {
    /// Create a new memory descriptor.
    pub fn new(size: u64, location: MemoryLocation) -> Self {
        Self {
            label: None,
            size,
            location,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
