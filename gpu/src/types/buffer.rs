//! Buffer types and descriptors.

use bitflags::bitflags;

use super::MemoryLocation;

bitflags! {
    /// How the GPU may bind a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a constant (uniform) buffer.
        const CONSTANT = 1 << 0;
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 1;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 2;
        /// Buffer can be read by shaders as a generic resource.
        const SHADER_RESOURCE = 1 << 3;
        /// Buffer can be written by shaders.
        const UNORDERED_ACCESS = 1 << 4;
        /// Buffer can hold indirect draw/dispatch arguments.
        const INDIRECT = 1 << 5;
        /// Buffer can be the target of stream output.
        const STREAM_OUTPUT = 1 << 6;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// CPU access mode a buffer is created with.
///
/// The modes are exclusive: a buffer is either written by the CPU, read back by
/// the CPU, or not CPU-visible at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CpuAccess {
    /// Device-local memory, never mapped.
    #[default]
    None,
    /// Upload memory, persistently mapped for write-discard.
    Write,
    /// Readback memory, persistently mapped for read.
    Read,
}

impl CpuAccess {
    /// Memory placement used for buffers with this access mode.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            Self::None => MemoryLocation::DeviceLocal,
            Self::Write => MemoryLocation::Upload,
            Self::Read => MemoryLocation::Readback,
        }
    }
}

/// Mapping mode for [`Buffer::map`](crate::Buffer::map).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapType {
    /// Map for CPU reads. Requires [`CpuAccess::Read`].
    Read,
    /// Map for CPU writes; previous contents are undefined. Requires [`CpuAccess::Write`].
    WriteDiscard,
}

impl MapType {
    /// The CPU access mode this map type requires.
    pub fn required_access(self) -> CpuAccess {
        match self {
            Self::Read => CpuAccess::Read,
            Self::WriteDiscard => CpuAccess::Write,
        }
    }
}

/// GPU access requested when making a buffer resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuAccess {
    /// Shaders only read the buffer.
    #[default]
    ReadOnly,
    /// Shaders read and write the buffer.
    ReadWrite,
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Requested size in bytes (before alignment).
    pub size: u64,
    /// Binding usage flags.
    pub usage: BufferUsage,
    /// CPU access mode.
    pub cpu_access: CpuAccess,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor with no CPU access.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
            cpu_access: CpuAccess::None,
        }
    }

    /// Set the CPU access mode.
    pub fn with_cpu_access(mut self, cpu_access: CpuAccess) -> Self {
        self.cpu_access = cpu_access;
        self
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
