//! Numeric element types the kernels are instantiated for.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul};

use crate::dispatch::KernelTable;
use crate::simd::{SimdLevel, portable};

/// Scalar type stored in a dense view.
///
/// Implemented for `f32` and `f64`. Each implementation maps a vector mode
/// to the table of kernels compiled for it.
pub trait Element:
    Copy
    + Debug
    + Default
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + Mul<Output = Self>
    + AddAssign
    + 'static
{
    const ZERO: Self;

    /// Kernels for this element type in the given vector mode.
    ///
    /// # Panics
    ///
    /// Panics if the mode is not compiled into this build.
    fn kernel_table(level: SimdLevel) -> KernelTable<Self>;
}

impl Element for f32 {
    const ZERO: f32 = 0.0;

    fn kernel_table(level: SimdLevel) -> KernelTable<f32> {
        match level {
            SimdLevel::Portable => portable::F32_KERNELS,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => crate::simd::x86::avx2_f32::KERNELS,
            #[cfg(all(target_arch = "x86_64", feature = "avx512"))]
            SimdLevel::Avx512 => crate::simd::x86::avx512_f32::KERNELS,
            #[allow(unreachable_patterns)]
            other => panic!("no f32 kernels compiled for vector mode {other:?}"),
        }
    }
}

impl Element for f64 {
    const ZERO: f64 = 0.0;

    fn kernel_table(level: SimdLevel) -> KernelTable<f64> {
        match level {
            SimdLevel::Portable => portable::F64_KERNELS,
            #[cfg(target_arch = "x86_64")]
            SimdLevel::Avx2 => crate::simd::x86::avx2_f64::KERNELS,
            #[cfg(all(target_arch = "x86_64", feature = "avx512"))]
            SimdLevel::Avx512 => crate::simd::x86::avx512_f64::KERNELS,
            #[allow(unreachable_patterns)]
            other => panic!("no f64 kernels compiled for vector mode {other:?}"),
        }
    }
}
