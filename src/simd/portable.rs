//! Fixed-width array registers that run anywhere.
//!
//! The widths match AVX2 (8 × f32, 4 × f64) so the blocking and remainder
//! paths are exercised the same way on every target.

use std::marker::PhantomData;

use super::{Simd, SimdLevel, kernel_table};
use crate::dispatch::KernelTable;
use crate::element::Element;

/// `W` lanes of `T` held in a plain array.
pub struct Portable<T, const W: usize>(PhantomData<T>);

pub type PortableF32 = Portable<f32, 8>;
pub type PortableF64 = Portable<f64, 4>;

impl<T: Element, const W: usize> Simd for Portable<T, W> {
    type Elem = T;
    type Reg = [T; W];

    const LANES: usize = W;

    #[inline(always)]
    unsafe fn zero() -> [T; W] {
        [T::ZERO; W]
    }

    #[inline(always)]
    unsafe fn splat(value: T) -> [T; W] {
        [value; W]
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn loadu(ptr: *const T) -> [T; W] {
        ptr.cast::<[T; W]>().read_unaligned()
    }

    #[inline(always)]
    #[allow(unsafe_op_in_unsafe_fn)]
    unsafe fn storeu(ptr: *mut T, value: [T; W]) {
        ptr.cast::<[T; W]>().write_unaligned(value)
    }

    #[inline(always)]
    unsafe fn add(a: [T; W], b: [T; W]) -> [T; W] {
        std::array::from_fn(|l| a[l] + b[l])
    }

    #[inline(always)]
    unsafe fn fmadd(a: [T; W], b: [T; W], c: [T; W]) -> [T; W] {
        std::array::from_fn(|l| a[l] * b[l] + c[l])
    }

    #[inline(always)]
    unsafe fn hsum(value: [T; W]) -> T {
        value.into_iter().fold(T::ZERO, |acc, x| acc + x)
    }
}

pub(crate) const F32_KERNELS: KernelTable<f32> = kernel_table!(SimdLevel::Portable, PortableF32);
pub(crate) const F64_KERNELS: KernelTable<f64> = kernel_table!(SimdLevel::Portable, PortableF64);
