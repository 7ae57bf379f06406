//! Device-side copy service.

use crate::error::GraphicsError;

use super::GpuMemory;

/// Records writes into memory the CPU cannot address directly.
///
/// Implementations stage `data` as needed; the caller's slice may be reused as
/// soon as the call returns.
pub trait CopyContext: Send + Sync {
    /// Write `data` into `dst` at `offset`.
    fn update_buffer(&self, dst: &GpuMemory, offset: u64, data: &[u8]) -> Result<(), GraphicsError>;

    /// Copy `size` bytes from `src` to `dst`.
    fn copy_buffer(
        &self,
        src: &GpuMemory,
        src_offset: u64,
        dst: &GpuMemory,
        dst_offset: u64,
        size: u64,
    ) -> Result<(), GraphicsError>;
}
