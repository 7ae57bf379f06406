//! Constant buffers sized from shader reflection.

use std::cell::Cell;
use std::ops::Deref;
use std::sync::Arc;

use crate::backend::{ConstantBufferViewDesc, DescriptorHandle};
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::reflection::{BufferKind, BufferReflection, Program};
use crate::resources::{Buffer, VariablesBuffer};
use crate::types::{BufferDescriptor, BufferUsage};

/// State of a lazily built view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No view, or the view was superseded by a write.
    Stale,
    /// A view built since the last write.
    Valid(DescriptorHandle),
}

/// Memoized constant buffer view.
#[derive(Debug)]
pub struct ViewCache {
    state: Cell<CacheState>,
}

impl ViewCache {
    fn new() -> Self {
        Self {
            state: Cell::new(CacheState::Stale),
        }
    }

    /// Current state.
    pub fn state(&self) -> CacheState {
        self.state.get()
    }

    /// Mark stale and return the superseded handle, if any.
    fn take(&self) -> Option<DescriptorHandle> {
        match self.state.replace(CacheState::Stale) {
            CacheState::Valid(handle) => Some(handle),
            CacheState::Stale => None,
        }
    }
}

/// A CPU-writable constant buffer described by shader reflection.
///
/// Dereferences to the underlying [`Buffer`]. Values are staged into a CPU
/// shadow and pushed with [`upload_to_gpu`](Self::upload_to_gpu); every upload
/// invalidates the cached view, and the next [`cbv`](Self::cbv) builds a new one.
///
/// # Example
///
/// ```ignore
/// let mut cb = ConstantBuffer::from_program(&device, &program, "PerFrame", 0)?;
/// cb.set_value(0, &frame_uniforms)?;
/// cb.upload_to_gpu(0, 0)?;
/// let view = cb.cbv()?;
/// ```
#[derive(Debug)]
pub struct ConstantBuffer {
    variables: VariablesBuffer,
    reflection: Arc<BufferReflection>,
    cbv: ViewCache,
}

impl ConstantBuffer {
    /// Create a constant buffer for `reflection`.
    ///
    /// The size is `override_size` when nonzero, otherwise the reflected size;
    /// either is then padded to the constant buffer alignment.
    pub fn create(
        device: &Arc<GraphicsDevice>,
        reflection: Arc<BufferReflection>,
        override_size: u64,
    ) -> Result<Self, GraphicsError> {
        let size = if override_size != 0 {
            override_size
        } else {
            reflection.required_size()
        };
        let descriptor =
            BufferDescriptor::new(size, BufferUsage::CONSTANT).with_label(reflection.name());
        let variables = VariablesBuffer::new(device, &descriptor)?;

        log::debug!(
            "ConstantBuffer: created '{}' ({} bytes, reflected {})",
            reflection.name(),
            variables.size(),
            reflection.required_size()
        );
        Ok(Self {
            variables,
            reflection,
            cbv: ViewCache::new(),
        })
    }

    /// Create the constant buffer `name` declared by the program's active version.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::NotFound`] naming the buffer if the program
    /// declares no constant buffer called `name`.
    pub fn from_program(
        device: &Arc<GraphicsDevice>,
        program: &Program,
        name: &str,
        override_size: u64,
    ) -> Result<Self, GraphicsError> {
        let reflector = program.active_version().reflector();
        let Some(reflection) = reflector.buffer_desc(name, BufferKind::Constant) else {
            log::error!(
                "Can't find a constant buffer named \"{}\" in program \"{}\"",
                name,
                program.name()
            );
            return Err(GraphicsError::NotFound(format!(
                "constant buffer \"{name}\" in program \"{}\"",
                program.name()
            )));
        };
        Self::create(device, reflection, override_size)
    }

    /// Reflection this buffer was created from.
    pub fn reflection(&self) -> &Arc<BufferReflection> {
        &self.reflection
    }

    /// The GPU buffer.
    pub fn buffer(&self) -> &Buffer {
        self.variables.buffer()
    }

    /// The CPU shadow and dirty tracking.
    pub fn variables(&self) -> &VariablesBuffer {
        &self.variables
    }

    /// Stage `bytes` at `offset`. Takes effect on the GPU after an upload.
    pub fn set_blob(&mut self, offset: u64, bytes: &[u8]) -> Result<(), GraphicsError> {
        self.variables.set_blob(offset, bytes)
    }

    /// Stage a plain-old-data value at `offset`.
    pub fn set_value<T: bytemuck::Pod>(&mut self, offset: u64, value: &T) -> Result<(), GraphicsError> {
        self.variables.set_blob(offset, bytemuck::bytes_of(value))
    }

    /// Read staged bytes.
    pub fn blob(&self, offset: u64, len: u64) -> Result<&[u8], GraphicsError> {
        self.variables.blob(offset, len)
    }

    /// Upload `size` staged bytes at `offset` (`size == 0`: to the end) and
    /// invalidate the cached view.
    pub fn upload_to_gpu(&mut self, offset: u64, size: u64) -> Result<(), GraphicsError> {
        self.variables.upload_to_gpu(offset, size)?;
        self.invalidate_view();
        Ok(())
    }

    /// Upload the dirty range, if any. Returns whether anything was uploaded.
    pub fn upload_to_gpu_all(&mut self) -> Result<bool, GraphicsError> {
        let uploaded = self.variables.upload_to_gpu_all()?;
        if uploaded {
            self.invalidate_view();
        }
        Ok(uploaded)
    }

    /// Get the constant buffer view, building it if the cache is stale.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::DescriptorHeapFull`] if no descriptor slot is free.
    pub fn cbv(&self) -> Result<DescriptorHandle, GraphicsError> {
        crate::profile_function!();

        if let CacheState::Valid(handle) = self.cbv.state() {
            return Ok(handle);
        }

        let buffer = self.buffer();
        let size_in_bytes = u32::try_from(buffer.size()).map_err(|_| {
            GraphicsError::InvalidParameter(format!(
                "constant buffer of {} bytes is too large for a view",
                buffer.size()
            ))
        })?;
        let desc = ConstantBufferViewDesc {
            resource: buffer.resource_id(),
            buffer_location: buffer.gpu_address(),
            size_in_bytes,
        };

        let heap = buffer.device().descriptor_heap();
        let entry = heap.allocate_entry()?;
        if let Err(err) = heap.create_constant_buffer_view(entry, &desc) {
            heap.release_entry(entry);
            return Err(err);
        }

        log::trace!(
            "ConstantBuffer: built view {:?} for '{}'",
            entry,
            self.reflection.name()
        );
        self.cbv.state.set(CacheState::Valid(entry));
        Ok(entry)
    }

    /// State of the cached view.
    pub fn view_state(&self) -> CacheState {
        self.cbv.state()
    }

    fn invalidate_view(&mut self) {
        if let Some(handle) = self.cbv.take() {
            self.buffer().device().descriptor_heap().release_entry(handle);
        }
    }
}

impl Deref for ConstantBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Buffer {
        self.buffer()
    }
}

impl Drop for ConstantBuffer {
    fn drop(&mut self) {
        self.invalidate_view();
    }
}

static_assertions::assert_impl_all!(ConstantBuffer: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{ProgramReflection, ProgramVersion};

    fn program() -> Program {
        let reflection = ProgramReflection::new()
            .with_buffer(BufferReflection::new("PerFrame", BufferKind::Constant, 80))
            .with_buffer(BufferReflection::new("Lights", BufferKind::Structured, 1024));
        Program::new(
            "forward",
            Arc::new(ProgramVersion::new(Arc::new(reflection))),
        )
    }

    #[test]
    fn test_size_from_reflection() {
        let device = GraphicsDevice::dummy().unwrap();
        let cb = ConstantBuffer::from_program(&device, &program(), "PerFrame", 0).unwrap();
        assert_eq!(cb.size(), 256);
        assert_eq!(cb.label(), Some("PerFrame"));
        assert_eq!(cb.reflection().required_size(), 80);
    }

    #[test]
    fn test_override_size() {
        let device = GraphicsDevice::dummy().unwrap();
        let cb = ConstantBuffer::from_program(&device, &program(), "PerFrame", 600).unwrap();
        assert_eq!(cb.size(), 768);
    }

    #[test]
    fn test_missing_name() {
        let device = GraphicsDevice::dummy().unwrap();
        let err = ConstantBuffer::from_program(&device, &program(), "NoSuchBuffer", 0).unwrap_err();
        assert!(matches!(&err, GraphicsError::NotFound(msg) if msg.contains("NoSuchBuffer")));

        // Structured buffers do not resolve as constant buffers.
        assert!(ConstantBuffer::from_program(&device, &program(), "Lights", 0).is_err());
    }

    #[test]
    fn test_view_cached_until_upload() {
        let device = GraphicsDevice::dummy().unwrap();
        let mut cb = ConstantBuffer::from_program(&device, &program(), "PerFrame", 0).unwrap();
        assert_eq!(cb.view_state(), CacheState::Stale);

        let first = cb.cbv().unwrap();
        assert_eq!(cb.cbv().unwrap(), first);

        cb.set_value(0, &[1.0f32, 2.0, 3.0, 4.0]).unwrap();
        cb.upload_to_gpu(0, 0).unwrap();
        assert_eq!(cb.view_state(), CacheState::Stale);

        let second = cb.cbv().unwrap();
        assert_ne!(second, first);
    }

    #[test]
    fn test_slot_released_on_drop() {
        let heap = Arc::new(crate::backend::SlotDescriptorHeap::new(8));
        let device = GraphicsDevice::new(
            Arc::new(crate::backend::DummyBackend::new()),
            Arc::new(crate::backend::DummyCopyContext::new()),
            heap.clone(),
            crate::DeviceParameters::default(),
        )
        .unwrap();

        let cb = ConstantBuffer::from_program(&device, &program(), "PerFrame", 0).unwrap();
        let view = cb.cbv().unwrap();
        let desc = heap.view(view).unwrap();
        assert_eq!(desc.resource, cb.resource_id());
        assert_eq!(desc.size_in_bytes, 256);

        drop(cb);
        assert!(heap.is_empty());
    }
}
