//! Row-major vector × matrix kernels.
//!
//! The dual of GEMV: output columns are blocked in groups of 8, 4 and 1
//! vectors, and each scalar `a[k]` is broadcast across a register before
//! the multiply-add against row `k` of `B`. Columns past the last whole
//! vector are finished with a scalar loop.

use std::ops::Range;

use crate::element::Element;
use crate::simd::Simd;

/// `c[0..n] = a (m) · B (m×n)` for small problems.
///
/// Each column group is fully summed in registers before it is stored, so
/// the destination does not need to be zeroed.
///
/// # Safety
///
/// - The CPU supports backend `V`
/// - `aa` is valid for `m` reads, `bb` for `m * n`, `cc` for `n` writes
/// - `cc` does not overlap `aa` or `bb`
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
#[allow(clippy::identity_op)]
pub unsafe fn gevm_small<V: Simd>(
    aa: *const V::Elem,
    m: usize,
    n: usize,
    bb: *const V::Elem,
    cc: *mut V::Elem,
) {
    let w = V::LANES;
    let mut j = 0;

    while j + 8 * w <= n {
        let mut r1 = V::zero();
        let mut r2 = V::zero();
        let mut r3 = V::zero();
        let mut r4 = V::zero();
        let mut r5 = V::zero();
        let mut r6 = V::zero();
        let mut r7 = V::zero();
        let mut r8 = V::zero();

        for k in 0..m {
            let a1 = V::splat(*aa.add(k));
            let row = bb.add(k * n + j);

            r1 = V::fmadd(a1, V::loadu(row.add(0 * w)), r1);
            r2 = V::fmadd(a1, V::loadu(row.add(1 * w)), r2);
            r3 = V::fmadd(a1, V::loadu(row.add(2 * w)), r3);
            r4 = V::fmadd(a1, V::loadu(row.add(3 * w)), r4);
            r5 = V::fmadd(a1, V::loadu(row.add(4 * w)), r5);
            r6 = V::fmadd(a1, V::loadu(row.add(5 * w)), r6);
            r7 = V::fmadd(a1, V::loadu(row.add(6 * w)), r7);
            r8 = V::fmadd(a1, V::loadu(row.add(7 * w)), r8);
        }

        V::storeu(cc.add(j + 0 * w), r1);
        V::storeu(cc.add(j + 1 * w), r2);
        V::storeu(cc.add(j + 2 * w), r3);
        V::storeu(cc.add(j + 3 * w), r4);
        V::storeu(cc.add(j + 4 * w), r5);
        V::storeu(cc.add(j + 5 * w), r6);
        V::storeu(cc.add(j + 6 * w), r7);
        V::storeu(cc.add(j + 7 * w), r8);

        j += 8 * w;
    }

    while j + 4 * w <= n {
        let mut r1 = V::zero();
        let mut r2 = V::zero();
        let mut r3 = V::zero();
        let mut r4 = V::zero();

        for k in 0..m {
            let a1 = V::splat(*aa.add(k));
            let row = bb.add(k * n + j);

            r1 = V::fmadd(a1, V::loadu(row.add(0 * w)), r1);
            r2 = V::fmadd(a1, V::loadu(row.add(1 * w)), r2);
            r3 = V::fmadd(a1, V::loadu(row.add(2 * w)), r3);
            r4 = V::fmadd(a1, V::loadu(row.add(3 * w)), r4);
        }

        V::storeu(cc.add(j + 0 * w), r1);
        V::storeu(cc.add(j + 1 * w), r2);
        V::storeu(cc.add(j + 2 * w), r3);
        V::storeu(cc.add(j + 3 * w), r4);

        j += 4 * w;
    }

    while j + w <= n {
        let mut r1 = V::zero();

        for k in 0..m {
            let a1 = V::splat(*aa.add(k));
            r1 = V::fmadd(a1, V::loadu(bb.add(k * n + j)), r1);
        }

        V::storeu(cc.add(j), r1);

        j += w;
    }

    while j < n {
        let mut value = <V::Elem as Element>::ZERO;
        for k in 0..m {
            value += *aa.add(k) * *bb.add(k * n + j);
        }
        *cc.add(j) = value;

        j += 1;
    }
}

/// Adds the contribution of rows `ks` of `B`, restricted to columns `js`,
/// into `c[js]`.
///
/// This is the tile body of the blocked GEVM; the destination holds the
/// partial sums of earlier `k` blocks and is read, added to and stored back.
///
/// # Safety
///
/// - The CPU supports backend `V`
/// - `ks` lies within the `m` rows and `js` within the `n` columns of `B`
/// - `cc` is valid for reads and writes over `js` and holds the sums so far
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
#[allow(clippy::identity_op)]
pub unsafe fn gevm_accumulate_tile<V: Simd>(
    aa: *const V::Elem,
    n: usize,
    bb: *const V::Elem,
    cc: *mut V::Elem,
    ks: Range<usize>,
    js: Range<usize>,
) {
    let w = V::LANES;
    let j_end = js.end;
    let mut j = js.start;

    while j + 8 * w <= j_end {
        let mut r1 = V::zero();
        let mut r2 = V::zero();
        let mut r3 = V::zero();
        let mut r4 = V::zero();
        let mut r5 = V::zero();
        let mut r6 = V::zero();
        let mut r7 = V::zero();
        let mut r8 = V::zero();

        for k in ks.clone() {
            let a1 = V::splat(*aa.add(k));
            let row = bb.add(k * n + j);

            r1 = V::fmadd(a1, V::loadu(row.add(0 * w)), r1);
            r2 = V::fmadd(a1, V::loadu(row.add(1 * w)), r2);
            r3 = V::fmadd(a1, V::loadu(row.add(2 * w)), r3);
            r4 = V::fmadd(a1, V::loadu(row.add(3 * w)), r4);
            r5 = V::fmadd(a1, V::loadu(row.add(4 * w)), r5);
            r6 = V::fmadd(a1, V::loadu(row.add(5 * w)), r6);
            r7 = V::fmadd(a1, V::loadu(row.add(6 * w)), r7);
            r8 = V::fmadd(a1, V::loadu(row.add(7 * w)), r8);
        }

        let out = cc.add(j);
        V::storeu(out.add(0 * w), V::add(r1, V::loadu(out.add(0 * w))));
        V::storeu(out.add(1 * w), V::add(r2, V::loadu(out.add(1 * w))));
        V::storeu(out.add(2 * w), V::add(r3, V::loadu(out.add(2 * w))));
        V::storeu(out.add(3 * w), V::add(r4, V::loadu(out.add(3 * w))));
        V::storeu(out.add(4 * w), V::add(r5, V::loadu(out.add(4 * w))));
        V::storeu(out.add(5 * w), V::add(r6, V::loadu(out.add(5 * w))));
        V::storeu(out.add(6 * w), V::add(r7, V::loadu(out.add(6 * w))));
        V::storeu(out.add(7 * w), V::add(r8, V::loadu(out.add(7 * w))));

        j += 8 * w;
    }

    while j + 4 * w <= j_end {
        let mut r1 = V::zero();
        let mut r2 = V::zero();
        let mut r3 = V::zero();
        let mut r4 = V::zero();

        for k in ks.clone() {
            let a1 = V::splat(*aa.add(k));
            let row = bb.add(k * n + j);

            r1 = V::fmadd(a1, V::loadu(row.add(0 * w)), r1);
            r2 = V::fmadd(a1, V::loadu(row.add(1 * w)), r2);
            r3 = V::fmadd(a1, V::loadu(row.add(2 * w)), r3);
            r4 = V::fmadd(a1, V::loadu(row.add(3 * w)), r4);
        }

        let out = cc.add(j);
        V::storeu(out.add(0 * w), V::add(r1, V::loadu(out.add(0 * w))));
        V::storeu(out.add(1 * w), V::add(r2, V::loadu(out.add(1 * w))));
        V::storeu(out.add(2 * w), V::add(r3, V::loadu(out.add(2 * w))));
        V::storeu(out.add(3 * w), V::add(r4, V::loadu(out.add(3 * w))));

        j += 4 * w;
    }

    while j + w <= j_end {
        let mut r1 = V::zero();

        for k in ks.clone() {
            let a1 = V::splat(*aa.add(k));
            r1 = V::fmadd(a1, V::loadu(bb.add(k * n + j)), r1);
        }

        V::storeu(cc.add(j), V::add(r1, V::loadu(cc.add(j))));

        j += w;
    }

    while j < j_end {
        let mut value = <V::Elem as Element>::ZERO;
        for k in ks.clone() {
            value += *aa.add(k) * *bb.add(k * n + j);
        }
        *cc.add(j) += value;

        j += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::testing::{Real, assert_close, cast, gevm_ref, pattern, widen};
    use crate::simd::{PortableF32, PortableF64};

    const SIZES: [usize; 10] = [0, 1, 2, 3, 4, 5, 8, 9, 16, 17];
    const COLS: [usize; 12] = [0, 1, 3, 4, 5, 15, 16, 17, 32, 33, 36, 70];

    fn check_small<V: Simd>(name: &str)
    where
        V::Elem: Real,
    {
        for m in SIZES {
            for n in COLS {
                let a = pattern(m, 9);
                let b = pattern(m * n, 11);
                let expected = gevm_ref(&a, m, n, &b);
                let (a, b) = (cast::<V::Elem>(&a), cast::<V::Elem>(&b));

                let mut c = cast::<V::Elem>(&vec![f64::NAN; n]);
                unsafe { gevm_small::<V>(a.as_ptr(), m, n, b.as_ptr(), c.as_mut_ptr()) };

                assert_close(&expected, &widen(&c), &format!("{name} gevm_small {m}x{n}"));
            }
        }
    }

    #[test]
    fn test_small_portable() {
        check_small::<PortableF64>("portable f64");
        check_small::<PortableF32>("portable f32");
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_small_avx2() {
        if !crate::simd::SimdLevel::Avx2.is_available() {
            println!("Skipping - AVX2 not available");
            return;
        }
        check_small::<crate::simd::x86::Avx2F64>("avx2 f64");
        check_small::<crate::simd::x86::Avx2F32>("avx2 f32");
    }

    #[test]
    fn test_tile_accumulates_into_destination() {
        let (m, n) = (6, 40);
        let a = pattern(m, 9);
        let b = pattern(m * n, 11);
        let expected = gevm_ref(&a, m, n, &b);

        // Two row blocks over an inner column range; columns outside stay 0
        let mut c = vec![0.0; n];
        unsafe {
            gevm_accumulate_tile::<PortableF64>(a.as_ptr(), n, b.as_ptr(), c.as_mut_ptr(), 0..4, 2..39);
            gevm_accumulate_tile::<PortableF64>(a.as_ptr(), n, b.as_ptr(), c.as_mut_ptr(), 4..6, 2..39);
        }

        assert_eq!(c[0], 0.0);
        assert_eq!(c[1], 0.0);
        assert_eq!(c[39], 0.0);
        assert_close(&expected[2..39], &c[2..39], "tile");
    }

    #[test]
    fn test_small_f32() {
        let (m, n) = (3, 19);
        let a = [1.0f32, -2.0, 0.5];
        let b: Vec<f32> = (0..m * n).map(|i| (i % 6) as f32).collect();

        let mut c = vec![0.0f32; n];
        unsafe { gevm_small::<PortableF32>(a.as_ptr(), m, n, b.as_ptr(), c.as_mut_ptr()) };

        for j in 0..n {
            let expected: f32 = (0..m).map(|k| a[k] * b[k * n + j]).sum();
            assert_eq!(c[j], expected, "column {j}");
        }
    }
}
