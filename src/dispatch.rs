//! Algorithm selection: which code path a call takes.
//!
//! A call goes down exactly one of three paths:
//!
//! - [`KernelPath::Naive`] when any matrix operand is not row-major
//! - [`KernelPath::Small`] when the problem is below the operation's
//!   threshold (no cache blocking, lowest fixed overhead)
//! - [`KernelPath::Large`] otherwise (cache-blocked, deeper unrolling)
//!
//! The vectorized paths call through a [`KernelTable`], picked once per
//! call from the element type and the vector mode.

use std::fmt;

use crate::config::GemmBlock;
use crate::simd::SimdLevel;

/// `a, m, n, b, c, padded`
pub type GemvKernel<T> = unsafe fn(*const T, usize, usize, *const T, *mut T, bool);
/// `a, m, n, b, c`
pub type GevmKernel<T> = unsafe fn(*const T, usize, usize, *const T, *mut T);
/// `a, m, n, b, c, column block`
pub type GevmBlockedKernel<T> = unsafe fn(*const T, usize, usize, *const T, *mut T, usize);
/// `a, b, c, m, n, k`
pub type GemmKernel<T> = unsafe fn(*const T, *const T, *mut T, usize, usize, usize);
/// `a, b, c, m, n, k, blocks`
pub type GemmBlockedKernel<T> =
    unsafe fn(*const T, *const T, *mut T, usize, usize, usize, GemmBlock);

/// The six kernels of one backend for one element type.
#[derive(Clone, Copy)]
pub struct KernelTable<T> {
    pub level: SimdLevel,
    pub lanes: usize,
    pub gemv_small: GemvKernel<T>,
    pub gemv_large: GemvKernel<T>,
    pub gevm_small: GevmKernel<T>,
    /// Accumulates into the destination; it must be zeroed first
    pub gevm_large: GevmBlockedKernel<T>,
    pub gemm_small: GemmKernel<T>,
    pub gemm_large: GemmBlockedKernel<T>,
}

impl<T> fmt::Debug for KernelTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelTable")
            .field("level", &self.level)
            .field("lanes", &self.lanes)
            .finish_non_exhaustive()
    }
}

/// The three operations of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// matrix × vector
    Gemv,
    /// vector × matrix
    Gevm,
    /// matrix × matrix
    Gemm,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Gemv => "gemv",
            Operation::Gevm => "gevm",
            Operation::Gemm => "gemm",
        })
    }
}

/// Code path taken by one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelPath {
    /// Layout-agnostic scalar loops
    Naive,
    /// Register-blocked kernel without cache blocking
    Small,
    /// Cache-blocked kernel
    Large,
}

impl KernelPath {
    pub fn is_vectorized(self) -> bool {
        !matches!(self, KernelPath::Naive)
    }
}

/// Picks the path for one call.
///
/// `size` is the element count of the larger operand.
pub fn select_path(all_row_major: bool, size: usize, small_threshold: usize) -> KernelPath {
    if !all_row_major {
        KernelPath::Naive
    } else if size < small_threshold {
        KernelPath::Small
    } else {
        KernelPath::Large
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    #[test]
    fn test_layout_wins_over_size() {
        assert_eq!(select_path(false, 1, 100), KernelPath::Naive);
        assert_eq!(select_path(false, 1_000_000, 100), KernelPath::Naive);
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(select_path(true, 99, 100), KernelPath::Small);
        assert_eq!(select_path(true, 100, 100), KernelPath::Large);
        assert_eq!(select_path(true, 101, 100), KernelPath::Large);
        assert_eq!(select_path(true, 0, 0), KernelPath::Large);
    }

    #[test]
    fn test_portable_table() {
        let table = f64::kernel_table(SimdLevel::Portable);
        assert_eq!(table.level, SimdLevel::Portable);
        assert_eq!(table.lanes, 4);
        assert!(format!("{table:?}").contains("Portable"));
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Gevm.to_string(), "gevm");
        assert!(KernelPath::Large.is_vectorized());
        assert!(!KernelPath::Naive.is_vectorized());
    }
}
