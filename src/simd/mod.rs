//! Vector register abstraction and backend detection.
//!
//! Every kernel is written once against the [`Simd`] trait and instantiated
//! per backend:
//!
//! | Level | Registers | f32 lanes | f64 lanes |
//! |-------|-----------|-----------|-----------|
//! | `Portable` | fixed arrays | 8 | 4 |
//! | `Avx2` | `__m256` / `__m256d` + FMA | 8 | 4 |
//! | `Avx512` (feature `avx512`) | `__m512` / `__m512d` | 16 | 8 |
//!
//! The portable backend always exists, so at least one vector mode is
//! usable on any target. x86 backends are picked at runtime with
//! `is_x86_feature_detected!`.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::element::Element;
use crate::error::{DenseError, Result};

/// Builds the [`KernelTable`](crate::dispatch::KernelTable) of one backend
/// from the generic kernels.
macro_rules! kernel_table {
    ($level:expr, $backend:ty) => {
        $crate::dispatch::KernelTable {
            level: $level,
            lanes: <$backend as $crate::simd::Simd>::LANES,
            gemv_small: $crate::kernels::gemv::gemv_small::<$backend>,
            gemv_large: $crate::kernels::gemv::gemv_large::<$backend>,
            gevm_small: $crate::kernels::gevm::gevm_small::<$backend>,
            gevm_large: $crate::blocked::gevm::gevm_large::<$backend>,
            gemm_small: $crate::kernels::gemm::gemm_small::<$backend>,
            gemm_large: $crate::blocked::gemm::gemm_large::<$backend>,
        }
    };
}

pub(crate) use kernel_table;

pub mod portable;
#[cfg(target_arch = "x86_64")]
pub mod x86;

pub use portable::{Portable, PortableF32, PortableF64};

/// One vector register of `LANES` elements and the operations the kernels
/// need on it.
///
/// # Safety
///
/// Implementations may use target-specific intrinsics. Callers must ensure
/// the CPU supports the backend and that every pointer passed to `loadu` or
/// `storeu` is valid for `LANES` consecutive elements.
pub trait Simd {
    type Elem: Element;
    type Reg: Copy;

    /// Elements per register
    const LANES: usize;

    unsafe fn zero() -> Self::Reg;

    /// Broadcast one scalar to every lane
    unsafe fn splat(value: Self::Elem) -> Self::Reg;

    /// Unaligned load of `LANES` elements
    unsafe fn loadu(ptr: *const Self::Elem) -> Self::Reg;

    /// Unaligned store of `LANES` elements
    unsafe fn storeu(ptr: *mut Self::Elem, value: Self::Reg);

    unsafe fn add(a: Self::Reg, b: Self::Reg) -> Self::Reg;

    /// `a * b + c` per lane
    unsafe fn fmadd(a: Self::Reg, b: Self::Reg, c: Self::Reg) -> Self::Reg;

    /// Horizontal reduction: sum of all lanes
    unsafe fn hsum(value: Self::Reg) -> Self::Elem;
}

/// Vector modes the kernels can be instantiated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimdLevel {
    Portable,
    Avx2,
    Avx512,
}

impl SimdLevel {
    /// Best vector mode for this machine, detected once.
    pub fn detect() -> SimdLevel {
        static LEVEL: OnceLock<SimdLevel> = OnceLock::new();
        *LEVEL.get_or_init(|| {
            let level = [SimdLevel::Avx512, SimdLevel::Avx2]
                .into_iter()
                .find(|level| level.is_available())
                .unwrap_or(SimdLevel::Portable);
            debug!(?level, "detected vector mode");
            level
        })
    }

    /// Whether kernels for this mode are compiled in and the CPU supports it.
    pub fn is_available(self) -> bool {
        match self {
            SimdLevel::Portable => true,
            SimdLevel::Avx2 => avx2_available(),
            SimdLevel::Avx512 => avx512_available(),
        }
    }

    /// Recoverable form of the availability check.
    pub fn require(self) -> Result<SimdLevel> {
        if self.is_available() {
            Ok(self)
        } else {
            Err(DenseError::UnsupportedBackend(self))
        }
    }

    /// Every vector mode usable here, widest last.
    pub fn available() -> Vec<SimdLevel> {
        [SimdLevel::Portable, SimdLevel::Avx2, SimdLevel::Avx512]
            .into_iter()
            .filter(|level| level.is_available())
            .collect()
    }

    /// Register width for element type `T` in this mode.
    ///
    /// # Panics
    ///
    /// Panics if the mode is not compiled in.
    pub fn lanes<T: Element>(self) -> usize {
        T::kernel_table(self).lanes
    }
}

#[cfg(target_arch = "x86_64")]
fn avx2_available() -> bool {
    is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
}

#[cfg(not(target_arch = "x86_64"))]
fn avx2_available() -> bool {
    false
}

#[cfg(all(target_arch = "x86_64", feature = "avx512"))]
fn avx512_available() -> bool {
    is_x86_feature_detected!("avx512f")
}

#[cfg(not(all(target_arch = "x86_64", feature = "avx512")))]
fn avx512_available() -> bool {
    false
}
