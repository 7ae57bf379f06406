//! CPU shadow copy of a write buffer.

use std::ops::Range;
use std::sync::Arc;

use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, check_range};
use crate::resources::Buffer;
use crate::types::{BufferDescriptor, CpuAccess};

/// A write-access [`Buffer`] with a CPU-side shadow copy.
///
/// Values are staged into the shadow with [`set_blob`](Self::set_blob) and
/// pushed to the GPU with [`upload_to_gpu`](Self::upload_to_gpu). The buffer
/// tracks the byte range written since the last upload.
#[derive(Debug)]
pub struct VariablesBuffer {
    buffer: Buffer,
    data: Vec<u8>,
    dirty: Option<Range<u64>>,
}

impl VariablesBuffer {
    /// Create the buffer. `descriptor.cpu_access` is forced to [`CpuAccess::Write`].
    pub fn new(
        device: &Arc<GraphicsDevice>,
        descriptor: &BufferDescriptor,
    ) -> Result<Self, GraphicsError> {
        let descriptor = descriptor.clone().with_cpu_access(CpuAccess::Write);
        let buffer = Buffer::create(device, &descriptor, None)?;
        let data = vec![0u8; buffer.size() as usize];
        Ok(Self {
            buffer,
            data,
            dirty: None,
        })
    }

    /// The GPU buffer.
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// Size of the shadow copy (equals the aligned buffer size).
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Byte range changed since the last upload.
    pub fn dirty_range(&self) -> Option<Range<u64>> {
        self.dirty.clone()
    }

    /// Whether the shadow has changes not yet uploaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty.is_some()
    }

    /// Copy `bytes` into the shadow at `offset`.
    pub fn set_blob(&mut self, offset: u64, bytes: &[u8]) -> Result<(), GraphicsError> {
        if bytes.is_empty() {
            return Ok(());
        }
        if let Err(err) = check_range(offset, bytes.len() as u64, self.size()) {
            log::warn!("VariablesBuffer::set_blob: {}", err);
            return Err(err);
        }
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);

        let end = offset + bytes.len() as u64;
        self.dirty = Some(match self.dirty.take() {
            Some(range) => range.start.min(offset)..range.end.max(end),
            None => offset..end,
        });
        Ok(())
    }

    /// Read `len` bytes of the shadow at `offset`.
    pub fn blob(&self, offset: u64, len: u64) -> Result<&[u8], GraphicsError> {
        if len == 0 {
            return Ok(&[]);
        }
        check_range(offset, len, self.size())?;
        Ok(&self.data[offset as usize..(offset + len) as usize])
    }

    /// Upload `size` bytes of the shadow starting at `offset`.
    ///
    /// `size == 0` uploads everything from `offset` to the end; `offset` must
    /// still lie inside the buffer. Uploaded bytes are removed from the front or
    /// back of the dirty range when they cover it.
    pub fn upload_to_gpu(&mut self, offset: u64, size: u64) -> Result<(), GraphicsError> {
        let size = if size == 0 {
            self.size().saturating_sub(offset)
        } else {
            size
        };
        if let Err(err) = check_range(offset, size, self.size()) {
            log::warn!("VariablesBuffer::upload_to_gpu: {}, upload skipped", err);
            return Err(err);
        }

        let range = offset as usize..(offset + size) as usize;
        self.buffer.update_data(&self.data[range], offset)?;

        let end = offset + size;
        if let Some(dirty) = self.dirty.take() {
            let remaining = if offset <= dirty.start && end >= dirty.end {
                None
            } else if offset <= dirty.start && end > dirty.start {
                Some(end..dirty.end)
            } else if offset < dirty.end && end >= dirty.end {
                Some(dirty.start..offset)
            } else {
                Some(dirty)
            };
            self.dirty = remaining;
        }
        Ok(())
    }

    /// Upload the dirty range, if any.
    pub fn upload_to_gpu_all(&mut self) -> Result<bool, GraphicsError> {
        let Some(dirty) = self.dirty.clone() else {
            return Ok(false);
        };
        self.upload_to_gpu(dirty.start, dirty.end - dirty.start)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, MapType};

    fn create(size: u64) -> VariablesBuffer {
        let device = GraphicsDevice::dummy().unwrap();
        VariablesBuffer::new(&device, &BufferDescriptor::new(size, BufferUsage::CONSTANT)).unwrap()
    }

    fn gpu_bytes(vars: &mut VariablesBuffer) -> Vec<u8> {
        let ptr = vars.buffer.map(MapType::WriteDiscard).unwrap();
        unsafe { std::slice::from_raw_parts(ptr.as_ptr(), vars.size() as usize).to_vec() }
    }

    #[test]
    fn test_shadow_matches_aligned_size() {
        let vars = create(20);
        assert_eq!(vars.size(), 256);
        assert_eq!(vars.buffer().cpu_access(), CpuAccess::Write);
        assert!(!vars.is_dirty());
    }

    #[test]
    fn test_dirty_range_grows() {
        let mut vars = create(256);
        vars.set_blob(16, &[1; 4]).unwrap();
        vars.set_blob(64, &[2; 8]).unwrap();
        assert_eq!(vars.dirty_range(), Some(16..72));
        assert_eq!(vars.blob(64, 2).unwrap(), &[2, 2]);
    }

    #[test]
    fn test_upload_all_clears_dirty() {
        let mut vars = create(256);
        vars.set_blob(4, &[9; 4]).unwrap();
        assert!(vars.upload_to_gpu_all().unwrap());
        assert!(!vars.is_dirty());
        assert!(!vars.upload_to_gpu_all().unwrap());
        assert_eq!(&gpu_bytes(&mut vars)[4..8], &[9; 4]);
    }

    #[test]
    fn test_partial_upload_trims_dirty() {
        let mut vars = create(256);
        vars.set_blob(0, &[1; 32]).unwrap();
        vars.upload_to_gpu(0, 16).unwrap();
        assert_eq!(vars.dirty_range(), Some(16..32));
        vars.upload_to_gpu(16, 0).unwrap();
        assert!(!vars.is_dirty());
    }

    #[test]
    fn test_out_of_range() {
        let mut vars = create(256);
        assert!(vars.set_blob(250, &[0; 8]).is_err());
        assert!(vars.upload_to_gpu(200, 100).is_err());
        assert!(matches!(
            vars.upload_to_gpu(300, 0),
            Err(GraphicsError::InvalidRange { .. })
        ));
        assert!(vars.upload_to_gpu(256, 0).is_err());
        assert!(vars.blob(256, 1).is_err());
        assert!(!vars.is_dirty());
    }
}
