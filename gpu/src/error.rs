//! Graphics error types.

use thiserror::Error;

/// Errors that can occur in the GPU memory layer.
///
/// Validation failures (`AccessMismatch`, `InvalidRange`, `NotFound`) leave the
/// target untouched. Creation failures (`ResourceCreationFailed`, `OutOfMemory`)
/// come from the device and are not retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// The operation requires a CPU access mode the resource was not created with.
    #[error("access mismatch: {0}")]
    AccessMismatch(String),
    /// An offset/size pair does not fit inside the target resource.
    #[error("invalid range: offset {offset} + size {size} exceeds capacity {capacity}")]
    InvalidRange {
        /// Requested byte offset.
        offset: u64,
        /// Requested byte count.
        size: u64,
        /// Size of the resource in bytes.
        capacity: u64,
    },
    /// The backend does not provide the requested capability.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// A named resource could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// No free slot left in a descriptor heap.
    #[error("descriptor heap is full")]
    DescriptorHeapFull,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GraphicsError {
    /// Build an [`InvalidRange`](Self::InvalidRange) error.
    pub fn invalid_range(offset: u64, size: u64, capacity: u64) -> Self {
        Self::InvalidRange {
            offset,
            size,
            capacity,
        }
    }
}

/// Check that `offset..offset + size` lies inside a resource of `capacity` bytes.
pub(crate) fn check_range(offset: u64, size: u64, capacity: u64) -> Result<(), GraphicsError> {
    match offset.checked_add(size) {
        Some(end) if offset < capacity && end <= capacity => Ok(()),
        _ => Err(GraphicsError::invalid_range(offset, size, capacity)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphicsError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GraphicsError::NotFound("constant buffer \"Camera\"".to_string());
        assert_eq!(err.to_string(), "not found: constant buffer \"Camera\"");

        let err = GraphicsError::invalid_range(16, 32, 40);
        assert_eq!(
            err.to_string(),
            "invalid range: offset 16 + size 32 exceeds capacity 40"
        );
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(0, 256, 256).is_ok());
        assert!(check_range(255, 1, 256).is_ok());
        assert!(check_range(256, 0, 256).is_err());
        assert!(check_range(200, 100, 256).is_err());
        assert!(check_range(u64::MAX, 2, 256).is_err());
    }
}
