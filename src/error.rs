//! Error types for the validating layer.
//!
//! The raw kernels never report errors: malformed shapes there are undefined
//! behaviour. These errors come from the safe entry points, which check
//! operand extents before a kernel is reached.

use thiserror::Error;

use crate::dispatch::Operation;
use crate::simd::SimdLevel;

/// Result type for densemul operations
pub type Result<T> = std::result::Result<T, DenseError>;

/// Errors reported before dispatch
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DenseError {
    /// Operand extents do not fit the operation
    #[error("{op}: operand {operand} expected extent {expected}, got {actual}")]
    ShapeMismatch {
        /// Operation being dispatched
        op: Operation,
        /// Which operand (`A`, `B` or `C`) and which extent
        operand: &'static str,
        /// Extent implied by the other operands
        expected: usize,
        /// Extent actually supplied
        actual: usize,
    },

    /// Backing slice is shorter than the view it should hold
    #[error("Buffer too small: expected at least {expected} elements, got {actual}")]
    BufferTooSmall {
        /// Required element count (including padding)
        expected: usize,
        /// Slice length
        actual: usize,
    },

    /// A padded operand has a non-zero element in its padding
    #[error("Padding element at index {index} is not zero")]
    DirtyPadding {
        /// Offset of the offending element in the backing slice
        index: usize,
    },

    /// Vector mode not compiled in or not supported by this CPU
    #[error("Vector mode not available on this platform: {0:?}")]
    UnsupportedBackend(SimdLevel),

    /// Tuning values that would stall or break the blocked kernels
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_error() {
        let err = DenseError::ShapeMismatch {
            op: Operation::Gemv,
            operand: "B length",
            expected: 3,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "gemv: operand B length expected extent 3, got 4"
        );
    }

    #[test]
    fn test_buffer_too_small_error() {
        let err = DenseError::BufferTooSmall {
            expected: 32,
            actual: 17,
        };
        assert_eq!(
            err.to_string(),
            "Buffer too small: expected at least 32 elements, got 17"
        );
    }

    #[test]
    fn test_unsupported_backend_error() {
        let err = DenseError::UnsupportedBackend(SimdLevel::Avx512);
        assert_eq!(
            err.to_string(),
            "Vector mode not available on this platform: Avx512"
        );
    }

    #[test]
    fn test_dirty_padding_error() {
        let err = DenseError::DirtyPadding { index: 9 };
        assert_eq!(err.to_string(), "Padding element at index 9 is not zero");
    }
}
