//! AVX2/FMA and AVX-512 registers for x86_64.
//!
//! The trait methods are `#[inline(always)]` and carry no target features of
//! their own. Each backend gets a set of `#[target_feature]` entry points
//! (see `target_feature_kernels!`) that instantiate the generic kernels, so
//! the whole kernel body is compiled with the backend's instruction set.

use std::arch::x86_64::*;

use super::{Simd, SimdLevel};
use crate::dispatch::KernelTable;

/// 4 × f64 in one YMM register.
pub struct Avx2F64;

/// 8 × f32 in one YMM register.
pub struct Avx2F32;

impl Simd for Avx2F64 {
    type Elem = f64;
    type Reg = __m256d;

    const LANES: usize = 4;

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn zero() -> __m256d {
        _mm256_setzero_pd()
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn splat(value: f64) -> __m256d {
        _mm256_set1_pd(value)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn loadu(ptr: *const f64) -> __m256d {
        _mm256_loadu_pd(ptr)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn storeu(ptr: *mut f64, value: __m256d) {
        _mm256_storeu_pd(ptr, value)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn add(a: __m256d, b: __m256d) -> __m256d {
        _mm256_add_pd(a, b)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn fmadd(a: __m256d, b: __m256d, c: __m256d) -> __m256d {
        _mm256_fmadd_pd(a, b, c)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn hsum(value: __m256d) -> f64 {
        // [a b c d] -> [a+c b+d] -> a+c+b+d
        let lo = _mm256_castpd256_pd128(value);
        let hi = _mm256_extractf128_pd(value, 1);
        let pair = _mm_add_pd(lo, hi);
        let high = _mm_unpackhi_pd(pair, pair);
        _mm_cvtsd_f64(_mm_add_sd(pair, high))
    }
}

impl Simd for Avx2F32 {
    type Elem = f32;
    type Reg = __m256;

    const LANES: usize = 8;

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn zero() -> __m256 {
        _mm256_setzero_ps()
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn splat(value: f32) -> __m256 {
        _mm256_set1_ps(value)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn loadu(ptr: *const f32) -> __m256 {
        _mm256_loadu_ps(ptr)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn storeu(ptr: *mut f32, value: __m256) {
        _mm256_storeu_ps(ptr, value)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn add(a: __m256, b: __m256) -> __m256 {
        _mm256_add_ps(a, b)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn fmadd(a: __m256, b: __m256, c: __m256) -> __m256 {
        _mm256_fmadd_ps(a, b, c)
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn hsum(value: __m256) -> f32 {
        let lo = _mm256_castps256_ps128(value);
        let hi = _mm256_extractf128_ps(value, 1);
        let quad = _mm_add_ps(lo, hi);
        let pair = _mm_add_ps(quad, _mm_movehl_ps(quad, quad));
        let single = _mm_add_ss(pair, _mm_shuffle_ps(pair, pair, 0b01));
        _mm_cvtss_f32(single)
    }
}

#[cfg(feature = "avx512")]
pub use avx512::{Avx512F32, Avx512F64};

#[cfg(feature = "avx512")]
mod avx512 {
    use std::arch::x86_64::*;

    use crate::simd::Simd;

    /// 8 × f64 in one ZMM register.
    pub struct Avx512F64;

    /// 16 × f32 in one ZMM register.
    pub struct Avx512F32;

    impl Simd for Avx512F64 {
        type Elem = f64;
        type Reg = __m512d;

        const LANES: usize = 8;

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn zero() -> __m512d {
            _mm512_setzero_pd()
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn splat(value: f64) -> __m512d {
            _mm512_set1_pd(value)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn loadu(ptr: *const f64) -> __m512d {
            _mm512_loadu_pd(ptr)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn storeu(ptr: *mut f64, value: __m512d) {
            _mm512_storeu_pd(ptr, value)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn add(a: __m512d, b: __m512d) -> __m512d {
            _mm512_add_pd(a, b)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn fmadd(a: __m512d, b: __m512d, c: __m512d) -> __m512d {
            _mm512_fmadd_pd(a, b, c)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn hsum(value: __m512d) -> f64 {
            _mm512_reduce_add_pd(value)
        }
    }

    impl Simd for Avx512F32 {
        type Elem = f32;
        type Reg = __m512;

        const LANES: usize = 16;

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn zero() -> __m512 {
            _mm512_setzero_ps()
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn splat(value: f32) -> __m512 {
            _mm512_set1_ps(value)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn loadu(ptr: *const f32) -> __m512 {
            _mm512_loadu_ps(ptr)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn storeu(ptr: *mut f32, value: __m512) {
            _mm512_storeu_ps(ptr, value)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn add(a: __m512, b: __m512) -> __m512 {
            _mm512_add_ps(a, b)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn fmadd(a: __m512, b: __m512, c: __m512) -> __m512 {
            _mm512_fmadd_ps(a, b, c)
        }

        #[inline(always)]
        #[allow(unsafe_op_in_unsafe_fn)]
        unsafe fn hsum(value: __m512) -> f32 {
            _mm512_reduce_add_ps(value)
        }
    }
}

/// Stamps out `#[target_feature]` entry points for one backend and the
/// kernel table pointing at them.
macro_rules! target_feature_kernels {
    ($features:literal, $level:expr, $backend:ty, $t:ty) => {
        use crate::config::GemmBlock;

        #[target_feature(enable = $features)]
        unsafe fn gemv_small(a: *const $t, m: usize, n: usize, b: *const $t, c: *mut $t, padded: bool) {
            unsafe { crate::kernels::gemv::gemv_small::<$backend>(a, m, n, b, c, padded) }
        }

        #[target_feature(enable = $features)]
        unsafe fn gemv_large(a: *const $t, m: usize, n: usize, b: *const $t, c: *mut $t, padded: bool) {
            unsafe { crate::kernels::gemv::gemv_large::<$backend>(a, m, n, b, c, padded) }
        }

        #[target_feature(enable = $features)]
        unsafe fn gevm_small(a: *const $t, m: usize, n: usize, b: *const $t, c: *mut $t) {
            unsafe { crate::kernels::gevm::gevm_small::<$backend>(a, m, n, b, c) }
        }

        #[target_feature(enable = $features)]
        unsafe fn gevm_large(
            a: *const $t,
            m: usize,
            n: usize,
            b: *const $t,
            c: *mut $t,
            n_block: usize,
        ) {
            unsafe { crate::blocked::gevm::gevm_large::<$backend>(a, m, n, b, c, n_block) }
        }

        #[target_feature(enable = $features)]
        unsafe fn gemm_small(a: *const $t, b: *const $t, c: *mut $t, m: usize, n: usize, k: usize) {
            unsafe { crate::kernels::gemm::gemm_small::<$backend>(a, b, c, m, n, k) }
        }

        #[target_feature(enable = $features)]
        #[allow(clippy::too_many_arguments)]
        unsafe fn gemm_large(
            a: *const $t,
            b: *const $t,
            c: *mut $t,
            m: usize,
            n: usize,
            k: usize,
            block: GemmBlock,
        ) {
            unsafe { crate::blocked::gemm::gemm_large::<$backend>(a, b, c, m, n, k, block) }
        }

        pub(crate) const KERNELS: KernelTable<$t> = KernelTable {
            level: $level,
            lanes: <$backend as Simd>::LANES,
            gemv_small,
            gemv_large,
            gevm_small,
            gevm_large,
            gemm_small,
            gemm_large,
        };
    };
}

pub(crate) mod avx2_f64 {
    use super::*;

    target_feature_kernels!("avx2,fma", SimdLevel::Avx2, Avx2F64, f64);
}

pub(crate) mod avx2_f32 {
    use super::*;

    target_feature_kernels!("avx2,fma", SimdLevel::Avx2, Avx2F32, f32);
}

#[cfg(feature = "avx512")]
pub(crate) mod avx512_f64 {
    use super::*;

    target_feature_kernels!("avx512f", SimdLevel::Avx512, Avx512F64, f64);
}

#[cfg(feature = "avx512")]
pub(crate) mod avx512_f32 {
    use super::*;

    target_feature_kernels!("avx512f", SimdLevel::Avx512, Avx512F32, f32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avx2_hsum_f64() {
        if !SimdLevel::Avx2.is_available() {
            println!("Skipping - AVX2 not available");
            return;
        }

        let data = [1.5, -2.0, 4.0, 8.25];
        let sum = unsafe { Avx2F64::hsum(Avx2F64::loadu(data.as_ptr())) };
        assert_eq!(sum, 11.75);
    }

    #[test]
    fn test_avx2_hsum_f32() {
        if !SimdLevel::Avx2.is_available() {
            println!("Skipping - AVX2 not available");
            return;
        }

        let data: Vec<f32> = (1..=8).map(|i| i as f32).collect();
        let sum = unsafe { Avx2F32::hsum(Avx2F32::loadu(data.as_ptr())) };
        assert_eq!(sum, 36.0);
    }

    #[test]
    fn test_avx2_fmadd_store() {
        if !SimdLevel::Avx2.is_available() {
            println!("Skipping - AVX2 not available");
            return;
        }

        let a = [1.0, 2.0, 3.0, 4.0];
        let mut out = [0.0; 5];
        unsafe {
            let r = Avx2F64::fmadd(Avx2F64::splat(2.0), Avx2F64::loadu(a.as_ptr()), Avx2F64::splat(1.0));
            Avx2F64::storeu(out.as_mut_ptr().add(1), r);
        }
        assert_eq!(out, [0.0, 3.0, 5.0, 7.0, 9.0]);
    }
}
