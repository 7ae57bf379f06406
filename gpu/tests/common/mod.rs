//! Common utilities for GPU memory integration tests.
//!
//! Tests run against the dummy backend, configured through a [`DeviceProfile`]
//! so the same test can cover devices with and without optional capabilities.

use std::sync::Arc;

use redlilium_gpu::{
    Buffer, BufferDescriptor, BufferUsage, CpuAccess, DeviceCapabilities, DeviceParameters,
    DummyBackend, DummyCopyContext, GpuFence, GraphicsDevice, MapType, SlotDescriptorHeap,
};

/// Install the test logger once per process.
pub fn init_logging() {
    if env_logger::builder().is_test(true).try_init().is_ok() {
        redlilium_gpu::init();
    }
}

// ============================================================================
// Device Profiles
// ============================================================================

/// Device configurations exercised by the tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProfile {
    /// No bindless, no residency control, 256-byte constant alignment.
    Basic,
    /// Bindless handles and manual residency.
    Bindless,
    /// 512-byte constant alignment.
    WideAlignment,
}

impl DeviceProfile {
    /// Capabilities reported by the backend.
    pub fn capabilities(self) -> DeviceCapabilities {
        match self {
            DeviceProfile::Bindless => DeviceCapabilities {
                bindless: true,
                manual_residency: true,
                ..Default::default()
            },
            DeviceProfile::Basic | DeviceProfile::WideAlignment => DeviceCapabilities::default(),
        }
    }

    /// Device parameters.
    pub fn parameters(self) -> DeviceParameters {
        match self {
            DeviceProfile::WideAlignment => {
                DeviceParameters::new().with_constant_buffer_alignment(512)
            }
            DeviceProfile::Basic | DeviceProfile::Bindless => DeviceParameters::new(),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context giving access to the device and to the dummy services behind it.
pub struct TestContext {
    /// The backend, for inspecting counters.
    pub backend: Arc<DummyBackend>,
    /// The copy context, for inspecting counters.
    #[allow(dead_code)]
    pub copy_context: Arc<DummyCopyContext>,
    /// The descriptor heap, for inspecting views.
    #[allow(dead_code)]
    pub heap: Arc<SlotDescriptorHeap>,
    /// Device handed to every resource.
    pub device: Arc<GraphicsDevice>,
    /// Fence shared with allocators.
    #[allow(dead_code)]
    pub fence: Arc<GpuFence>,
}

impl TestContext {
    /// Create a context for the given profile.
    pub fn new(profile: DeviceProfile) -> Self {
        init_logging();

        let params = profile.parameters();
        let backend = Arc::new(DummyBackend::with_capabilities(profile.capabilities()));
        let copy_context = Arc::new(DummyCopyContext::new());
        let heap = Arc::new(SlotDescriptorHeap::new(params.descriptor_heap_capacity));
        let device = GraphicsDevice::new(
            backend.clone(),
            copy_context.clone(),
            heap.clone(),
            params,
        )
        .expect("Failed to create device");

        Self {
            backend,
            copy_context,
            heap,
            device,
            fence: Arc::new(GpuFence::new()),
        }
    }

    /// Create a buffer with the given CPU access.
    #[allow(dead_code)]
    pub fn create_buffer(&self, size: u64, usage: BufferUsage, cpu_access: CpuAccess) -> Buffer {
        Buffer::create(
            &self.device,
            &BufferDescriptor::new(size, usage).with_cpu_access(cpu_access),
            None,
        )
        .expect("Failed to create buffer")
    }

    /// Signal the current frame and mark it complete on the GPU.
    #[allow(dead_code)]
    pub fn retire_frame(&self) {
        let value = self.fence.signal();
        self.fence.complete(value).expect("Failed to complete fence");
    }
}

/// Generate a recognizable byte pattern.
#[allow(dead_code)]
pub fn generate_test_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Read the contents of a write-mapped buffer.
#[allow(dead_code)]
pub fn read_write_buffer(buffer: &mut Buffer) -> Vec<u8> {
    let ptr = buffer
        .map(MapType::WriteDiscard)
        .expect("Failed to map buffer");
    unsafe { std::slice::from_raw_parts(ptr.as_ptr(), buffer.size() as usize).to_vec() }
}
