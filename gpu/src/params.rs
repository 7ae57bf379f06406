//! Device configuration.
//!
//! [`DeviceParameters`] holds the device-mandated constants the memory layer
//! needs. There are no process-wide defaults: every component reads these from
//! the [`GraphicsDevice`](crate::GraphicsDevice) it was created with.

use crate::error::GraphicsError;

/// Parameters for creating a [`GraphicsDevice`](crate::GraphicsDevice).
///
/// # Example
///
/// ```ignore
/// let params = DeviceParameters::new()
///     .with_constant_buffer_alignment(256)
///     .with_upload_page_size(4 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceParameters {
    /// Placement alignment for constant buffers, in bytes. Power of two.
    pub constant_buffer_alignment: u64,
    /// Page size used by [`ResourceAllocator::with_default_page_size`](crate::ResourceAllocator::with_default_page_size).
    pub upload_page_size: u64,
    /// Number of slots in the dummy backend's descriptor heap.
    pub descriptor_heap_capacity: u32,
}

impl DeviceParameters {
    /// Constant buffer placement alignment mandated by D3D12 and most Vulkan drivers.
    pub const DEFAULT_CONSTANT_BUFFER_ALIGNMENT: u64 = 256;
    /// Default upload page size (2 MiB).
    pub const DEFAULT_UPLOAD_PAGE_SIZE: u64 = 2 * 1024 * 1024;
    /// Default descriptor heap capacity.
    pub const DEFAULT_DESCRIPTOR_HEAP_CAPACITY: u32 = 4096;

    /// Create parameters with default values.
    pub fn new() -> Self {
        Self {
            constant_buffer_alignment: Self::DEFAULT_CONSTANT_BUFFER_ALIGNMENT,
            upload_page_size: Self::DEFAULT_UPLOAD_PAGE_SIZE,
            descriptor_heap_capacity: Self::DEFAULT_DESCRIPTOR_HEAP_CAPACITY,
        }
    }

    /// Set the constant buffer alignment.
    pub fn with_constant_buffer_alignment(mut self, alignment: u64) -> Self {
        self.constant_buffer_alignment = alignment;
        self
    }

    /// Set the default upload page size.
    pub fn with_upload_page_size(mut self, page_size: u64) -> Self {
        self.upload_page_size = page_size;
        self
    }

    /// Set the descriptor heap capacity.
    pub fn with_descriptor_heap_capacity(mut self, capacity: u32) -> Self {
        self.descriptor_heap_capacity = capacity;
        self
    }

    /// Validate the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the alignment is not a
    /// power of two or the page size is zero.
    pub fn validate(&self) -> Result<(), GraphicsError> {
        if !self.constant_buffer_alignment.is_power_of_two() {
            return Err(GraphicsError::InvalidParameter(format!(
                "constant buffer alignment must be a power of 2, got {}",
                self.constant_buffer_alignment
            )));
        }
        if self.upload_page_size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "upload page size cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DeviceParameters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = DeviceParameters::default();
        assert_eq!(params.constant_buffer_alignment, 256);
        assert_eq!(params.upload_page_size, 2 * 1024 * 1024);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_invalid_alignment() {
        let params = DeviceParameters::new().with_constant_buffer_alignment(100);
        assert!(matches!(
            params.validate(),
            Err(GraphicsError::InvalidParameter(_))
        ));

        let params = DeviceParameters::new().with_constant_buffer_alignment(0);
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_zero_page_size() {
        let params = DeviceParameters::new().with_upload_page_size(0);
        assert!(params.validate().is_err());
    }
}
