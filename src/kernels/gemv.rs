//! Row-major matrix × vector kernels.
//!
//! Both kernels walk the output rows in groups of 8, then 2, then a single
//! row, keeping one accumulator register per row. The shared index `k` is
//! vectorized up to the largest multiple of `LANES` ≤ `n`, then a scalar
//! remainder loop covers the rest of the row.
//!
//! Rows are stored back to back, so reading past `n` on any row but the
//! last lands in the next row. Padding therefore only lifts the remainder
//! loop of the final row, which runs whole vectors into the zero pads of
//! `A` and `b`.

use super::fma_rows;
use crate::simd::Simd;

/// Rows handled by the grouped loops; the final row is left out when it
/// is followed by a pad.
#[inline(always)]
fn body_rows(m: usize, padded: bool) -> usize {
    if padded { m.saturating_sub(1) } else { m }
}

/// `c[0..m] = A (m×n) · b (n)` for small problems.
///
/// # Safety
///
/// - The CPU supports backend `V`
/// - `aa` is valid for `m * n` reads, `bb` for `n`, `cc` for `m` writes
/// - With `padded`, `aa` stays readable up to the next multiple of
///   `V::LANES` past the start of its last row and `bb` past its end, and
///   both pads are zero
/// - `cc` does not overlap `aa` or `bb`
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn gemv_small<V: Simd>(
    aa: *const V::Elem,
    m: usize,
    n: usize,
    bb: *const V::Elem,
    cc: *mut V::Elem,
    padded: bool,
) {
    let w = V::LANES;
    let last = n - n % w;
    let body = body_rows(m, padded);

    let mut i = 0;

    // 8 rows
    while i + 8 <= body {
        let a0 = aa.add(i * n);
        let a1 = aa.add((i + 1) * n);
        let a2 = aa.add((i + 2) * n);
        let a3 = aa.add((i + 3) * n);
        let a4 = aa.add((i + 4) * n);
        let a5 = aa.add((i + 5) * n);
        let a6 = aa.add((i + 6) * n);
        let a7 = aa.add((i + 7) * n);

        let mut r0 = V::zero();
        let mut r1 = V::zero();
        let mut r2 = V::zero();
        let mut r3 = V::zero();
        let mut r4 = V::zero();
        let mut r5 = V::zero();
        let mut r6 = V::zero();
        let mut r7 = V::zero();

        let mut k = 0;
        while k < last {
            let b1 = V::loadu(bb.add(k));
            fma_rows!(V, b1, k; r0 += a0, r1 += a1, r2 += a2, r3 += a3, r4 += a4, r5 += a5, r6 += a6, r7 += a7);
            k += w;
        }

        let rows = [a0, a1, a2, a3, a4, a5, a6, a7];
        let mut sums = [
            V::hsum(r0),
            V::hsum(r1),
            V::hsum(r2),
            V::hsum(r3),
            V::hsum(r4),
            V::hsum(r5),
            V::hsum(r6),
            V::hsum(r7),
        ];
        finish_rows(&rows, &mut sums, bb, k, n);
        store_rows(cc.add(i), &sums);

        i += 8;
    }

    // 2 rows
    while i + 2 <= body {
        let a0 = aa.add(i * n);
        let a1 = aa.add((i + 1) * n);

        let mut r0 = V::zero();
        let mut r1 = V::zero();

        let mut k = 0;
        while k < last {
            let b1 = V::loadu(bb.add(k));
            fma_rows!(V, b1, k; r0 += a0, r1 += a1);
            k += w;
        }

        let mut sums = [V::hsum(r0), V::hsum(r1)];
        finish_rows(&[a0, a1], &mut sums, bb, k, n);
        store_rows(cc.add(i), &sums);

        i += 2;
    }

    // last row
    if i < body {
        *cc.add(i) = single_row::<V>(aa.add(i * n), bb, n, last);
        i += 1;
    }

    // padded final row
    if i < m {
        *cc.add(i) = single_row::<V>(aa.add(i * n), bb, n, n.next_multiple_of(w));
    }
}

/// `c[0..m] = A (m×n) · b (n)` with the `k` loop unrolled by 4 and 2
/// vectors for long rows.
///
/// # Safety
///
/// Same contract as [`gemv_small`].
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn gemv_large<V: Simd>(
    aa: *const V::Elem,
    m: usize,
    n: usize,
    bb: *const V::Elem,
    cc: *mut V::Elem,
    padded: bool,
) {
    let w = V::LANES;
    let last = n - n % w;
    let body = body_rows(m, padded);

    let mut i = 0;

    // 8 rows
    while i + 8 <= body {
        let a0 = aa.add(i * n);
        let a1 = aa.add((i + 1) * n);
        let a2 = aa.add((i + 2) * n);
        let a3 = aa.add((i + 3) * n);
        let a4 = aa.add((i + 4) * n);
        let a5 = aa.add((i + 5) * n);
        let a6 = aa.add((i + 6) * n);
        let a7 = aa.add((i + 7) * n);

        let mut r0 = V::zero();
        let mut r1 = V::zero();
        let mut r2 = V::zero();
        let mut r3 = V::zero();
        let mut r4 = V::zero();
        let mut r5 = V::zero();
        let mut r6 = V::zero();
        let mut r7 = V::zero();

        let mut k = 0;

        while k + 4 * w <= last {
            let (k1, k2, k3, k4) = (k, k + w, k + 2 * w, k + 3 * w);
            let b1 = V::loadu(bb.add(k1));
            let b2 = V::loadu(bb.add(k2));
            let b3 = V::loadu(bb.add(k3));
            let b4 = V::loadu(bb.add(k4));
            fma_rows!(V, b1, k1; r0 += a0, r1 += a1, r2 += a2, r3 += a3, r4 += a4, r5 += a5, r6 += a6, r7 += a7);
            fma_rows!(V, b2, k2; r0 += a0, r1 += a1, r2 += a2, r3 += a3, r4 += a4, r5 += a5, r6 += a6, r7 += a7);
            fma_rows!(V, b3, k3; r0 += a0, r1 += a1, r2 += a2, r3 += a3, r4 += a4, r5 += a5, r6 += a6, r7 += a7);
            fma_rows!(V, b4, k4; r0 += a0, r1 += a1, r2 += a2, r3 += a3, r4 += a4, r5 += a5, r6 += a6, r7 += a7);
            k += 4 * w;
        }

        while k + 2 * w <= last {
            let (k1, k2) = (k, k + w);
            let b1 = V::loadu(bb.add(k1));
            let b2 = V::loadu(bb.add(k2));
            fma_rows!(V, b1, k1; r0 += a0, r1 += a1, r2 += a2, r3 += a3, r4 += a4, r5 += a5, r6 += a6, r7 += a7);
            fma_rows!(V, b2, k2; r0 += a0, r1 += a1, r2 += a2, r3 += a3, r4 += a4, r5 += a5, r6 += a6, r7 += a7);
            k += 2 * w;
        }

        if k < last {
            let b1 = V::loadu(bb.add(k));
            fma_rows!(V, b1, k; r0 += a0, r1 += a1, r2 += a2, r3 += a3, r4 += a4, r5 += a5, r6 += a6, r7 += a7);
            k += w;
        }

        let rows = [a0, a1, a2, a3, a4, a5, a6, a7];
        let mut sums = [
            V::hsum(r0),
            V::hsum(r1),
            V::hsum(r2),
            V::hsum(r3),
            V::hsum(r4),
            V::hsum(r5),
            V::hsum(r6),
            V::hsum(r7),
        ];
        finish_rows(&rows, &mut sums, bb, k, n);
        store_rows(cc.add(i), &sums);

        i += 8;
    }

    // 2 rows
    while i + 2 <= body {
        let a0 = aa.add(i * n);
        let a1 = aa.add((i + 1) * n);

        let mut r0 = V::zero();
        let mut r1 = V::zero();

        let mut k = 0;

        while k + 4 * w <= last {
            let (k1, k2, k3, k4) = (k, k + w, k + 2 * w, k + 3 * w);
            let b1 = V::loadu(bb.add(k1));
            let b2 = V::loadu(bb.add(k2));
            let b3 = V::loadu(bb.add(k3));
            let b4 = V::loadu(bb.add(k4));
            fma_rows!(V, b1, k1; r0 += a0, r1 += a1);
            fma_rows!(V, b2, k2; r0 += a0, r1 += a1);
            fma_rows!(V, b3, k3; r0 += a0, r1 += a1);
            fma_rows!(V, b4, k4; r0 += a0, r1 += a1);
            k += 4 * w;
        }

        while k + 2 * w <= last {
            let (k1, k2) = (k, k + w);
            let b1 = V::loadu(bb.add(k1));
            let b2 = V::loadu(bb.add(k2));
            fma_rows!(V, b1, k1; r0 += a0, r1 += a1);
            fma_rows!(V, b2, k2; r0 += a0, r1 += a1);
            k += 2 * w;
        }

        if k < last {
            let b1 = V::loadu(bb.add(k));
            fma_rows!(V, b1, k; r0 += a0, r1 += a1);
            k += w;
        }

        let mut sums = [V::hsum(r0), V::hsum(r1)];
        finish_rows(&[a0, a1], &mut sums, bb, k, n);
        store_rows(cc.add(i), &sums);

        i += 2;
    }

    // last row
    if i < body {
        *cc.add(i) = single_row::<V>(aa.add(i * n), bb, n, last);
        i += 1;
    }

    // padded final row
    if i < m {
        *cc.add(i) = single_row::<V>(aa.add(i * n), bb, n, n.next_multiple_of(w));
    }
}

/// One row vectorized up to `last`, then scalar up to `n` if `last < n`.
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn single_row<V: Simd>(a0: *const V::Elem, bb: *const V::Elem, n: usize, last: usize) -> V::Elem {
    let mut r0 = V::zero();

    let mut k = 0;
    while k < last {
        let b1 = V::loadu(bb.add(k));
        fma_rows!(V, b1, k; r0 += a0);
        k += V::LANES;
    }

    let mut sums = [V::hsum(r0)];
    finish_rows(&[a0], &mut sums, bb, k, n);
    sums[0]
}

/// Scalar remainder `k..n` for each row of a group.
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn finish_rows<T: crate::element::Element, const R: usize>(
    rows: &[*const T; R],
    sums: &mut [T; R],
    bb: *const T,
    from: usize,
    n: usize,
) {
    for k in from..n {
        let b = *bb.add(k);
        for (sum, row) in sums.iter_mut().zip(rows) {
            *sum += *row.add(k) * b;
        }
    }
}

#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
unsafe fn store_rows<T: Copy, const R: usize>(cc: *mut T, sums: &[T; R]) {
    for (r, &sum) in sums.iter().enumerate() {
        *cc.add(r) = sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::GemvKernel;
    use crate::kernels::testing::{Real, assert_close, cast, gemv_ref, pattern, widen};
    use crate::simd::{PortableF32, PortableF64, SimdLevel};
    use crate::view::padded_len;

    const SIZES: [usize; 9] = [0, 1, 2, 3, 7, 8, 9, 16, 17];

    fn check_all_shapes<V: Simd>(name: &str)
    where
        V::Elem: Real,
    {
        for m in SIZES {
            for n in SIZES.iter().copied().chain([33, 65, 100]) {
                let a = pattern(m * n, 10);
                let b = pattern(n, 7);
                let expected = gemv_ref(&a, m, n, &b);
                let (a, b) = (cast::<V::Elem>(&a), cast::<V::Elem>(&b));

                let mut small = cast::<V::Elem>(&vec![f64::NAN; m]);
                let mut large = small.clone();
                unsafe {
                    gemv_small::<V>(a.as_ptr(), m, n, b.as_ptr(), small.as_mut_ptr(), false);
                    gemv_large::<V>(a.as_ptr(), m, n, b.as_ptr(), large.as_mut_ptr(), false);
                }

                assert_close(&expected, &widen(&small), &format!("{name} small {m}x{n}"));
                assert_close(&expected, &widen(&large), &format!("{name} large {m}x{n}"));
            }
        }
    }

    #[test]
    fn test_portable_boundaries() {
        check_all_shapes::<PortableF64>("portable f64");
        check_all_shapes::<PortableF32>("portable f32");
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2_boundaries() {
        if !SimdLevel::Avx2.is_available() {
            println!("Skipping - AVX2 not available");
            return;
        }
        check_all_shapes::<crate::simd::x86::Avx2F64>("avx2 f64");
        check_all_shapes::<crate::simd::x86::Avx2F32>("avx2 f32");
    }

    #[test]
    fn test_two_by_three() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [7.0, 8.0, 9.0];
        let mut c = [0.0; 2];
        unsafe { gemv_small::<PortableF64>(a.as_ptr(), 2, 3, b.as_ptr(), c.as_mut_ptr(), false) };
        assert_eq!(c, [50.0, 122.0]);
    }

    #[test]
    fn test_padded_skips_remainder() {
        for m in [1, 2, 3, 9, 10, 17] {
            let n = 5;
            let a = pattern(m * n, 10);
            let b = pattern(n, 7);
            let expected = gemv_ref(&a, m, n, &b);

            let mut a_padded = a.clone();
            a_padded.resize(m * n - n + padded_len(n), 0.0);
            let mut b_padded = b.clone();
            b_padded.resize(padded_len(n), 0.0);

            let mut small = vec![0.0; m];
            let mut large = vec![0.0; m];
            unsafe {
                gemv_small::<PortableF64>(a_padded.as_ptr(), m, n, b_padded.as_ptr(), small.as_mut_ptr(), true);
                gemv_large::<PortableF64>(a_padded.as_ptr(), m, n, b_padded.as_ptr(), large.as_mut_ptr(), true);
            }

            assert_close(&expected, &small, &format!("padded small m={m}"));
            assert_close(&expected, &large, &format!("padded large m={m}"));
        }
    }

    #[test]
    fn test_padded_rows_do_not_read_next_row() {
        // Row 1 starts with inf; a vector run past the end of row 0 would
        // turn c[0] into NaN.
        for m in [2, 3, 9] {
            let n = 5;
            let mut a = vec![1.0; m * n - n + padded_len(n)];
            a[m * n..].fill(0.0);
            a[n] = f64::INFINITY;
            let mut b = vec![0.0; padded_len(n)];
            b[..n].fill(1.0);

            let kernels: [GemvKernel<f64>; 2] = [gemv_small::<PortableF64>, gemv_large::<PortableF64>];
            for kernel in kernels {
                let mut c = vec![0.0; m];
                unsafe { kernel(a.as_ptr(), m, n, b.as_ptr(), c.as_mut_ptr(), true) };

                assert_eq!(c[0], 5.0, "m={m}");
                assert_eq!(c[1], f64::INFINITY, "m={m}");
                assert!(c[2..].iter().all(|&x| x == 5.0), "m={m}: {c:?}");
            }
        }
    }

    #[test]
    fn test_f32_remainder() {
        // n = lanes + 1 leaves one column for the scalar loop
        let (m, n) = (3, 9);
        let a: Vec<f32> = (0..m * n).map(|i| (i % 5) as f32).collect();
        let b: Vec<f32> = (0..n).map(|i| (i % 3) as f32 + 1.0).collect();

        let mut c = vec![0.0f32; m];
        unsafe { gemv_large::<PortableF32>(a.as_ptr(), m, n, b.as_ptr(), c.as_mut_ptr(), false) };

        for i in 0..m {
            let expected: f32 = (0..n).map(|k| a[i * n + k] * b[k]).sum();
            assert_eq!(c[i], expected, "row {i}");
        }
    }
}
