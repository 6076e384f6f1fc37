//! Row-major matrix × matrix kernels.
//!
//! Output columns are taken in bands of 8, 4, 2 and 1 vectors. Inside a
//! band, rows are grouped so the accumulators fit the register file:
//!
//! | columns | rows per step |
//! |---------|---------------|
//! | 8 vectors | 1 |
//! | 4 vectors | 2, 1 |
//! | 2 vectors | 4, 2, 1 |
//! | 1 vector | 2, 1 |
//! | scalar pairs | 2, 1 |
//! | last scalar column | 2, 1 |
//!
//! For every output element the shared index is summed in order `0..k`.

use std::ops::Range;

use crate::element::Element;
use crate::simd::Simd;

/// `C (m×n) = A (m×k) · B (k×n)` for small problems.
///
/// Each output tile is summed in registers and stored once.
///
/// # Safety
///
/// - The CPU supports backend `V`
/// - `a` is valid for `m * k` reads, `b` for `k * n`, `c` for `m * n` writes
/// - `c` does not overlap `a` or `b`
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
#[allow(clippy::identity_op)]
pub unsafe fn gemm_small<V: Simd>(
    a: *const V::Elem,
    b: *const V::Elem,
    c: *mut V::Elem,
    m: usize,
    n: usize,
    k: usize,
) {
    let w = V::LANES;
    let mut j = 0;

    while j + 8 * w <= n {
        for i in 0..m {
            let mut r1 = V::zero();
            let mut r2 = V::zero();
            let mut r3 = V::zero();
            let mut r4 = V::zero();
            let mut r5 = V::zero();
            let mut r6 = V::zero();
            let mut r7 = V::zero();
            let mut r8 = V::zero();

            for p in 0..k {
                let a1 = V::splat(*a.add(i * k + p));
                let row = b.add(p * n + j);

                r1 = V::fmadd(a1, V::loadu(row.add(0 * w)), r1);
                r2 = V::fmadd(a1, V::loadu(row.add(1 * w)), r2);
                r3 = V::fmadd(a1, V::loadu(row.add(2 * w)), r3);
                r4 = V::fmadd(a1, V::loadu(row.add(3 * w)), r4);
                r5 = V::fmadd(a1, V::loadu(row.add(4 * w)), r5);
                r6 = V::fmadd(a1, V::loadu(row.add(5 * w)), r6);
                r7 = V::fmadd(a1, V::loadu(row.add(6 * w)), r7);
                r8 = V::fmadd(a1, V::loadu(row.add(7 * w)), r8);
            }

            let out = c.add(i * n + j);
            V::storeu(out.add(0 * w), r1);
            V::storeu(out.add(1 * w), r2);
            V::storeu(out.add(2 * w), r3);
            V::storeu(out.add(3 * w), r4);
            V::storeu(out.add(4 * w), r5);
            V::storeu(out.add(5 * w), r6);
            V::storeu(out.add(6 * w), r7);
            V::storeu(out.add(7 * w), r8);
        }

        j += 8 * w;
    }

    while j + 4 * w <= n {
        let mut i = 0;

        while i + 2 <= m {
            let mut r11 = V::zero();
            let mut r12 = V::zero();
            let mut r21 = V::zero();
            let mut r22 = V::zero();
            let mut r31 = V::zero();
            let mut r32 = V::zero();
            let mut r41 = V::zero();
            let mut r42 = V::zero();

            for p in 0..k {
                let row = b.add(p * n + j);
                let b1 = V::loadu(row.add(0 * w));
                let b2 = V::loadu(row.add(1 * w));
                let b3 = V::loadu(row.add(2 * w));
                let b4 = V::loadu(row.add(3 * w));

                let a1 = V::splat(*a.add(i * k + p));
                let a2 = V::splat(*a.add((i + 1) * k + p));

                r11 = V::fmadd(a1, b1, r11);
                r12 = V::fmadd(a2, b1, r12);
                r21 = V::fmadd(a1, b2, r21);
                r22 = V::fmadd(a2, b2, r22);
                r31 = V::fmadd(a1, b3, r31);
                r32 = V::fmadd(a2, b3, r32);
                r41 = V::fmadd(a1, b4, r41);
                r42 = V::fmadd(a2, b4, r42);
            }

            let out1 = c.add(i * n + j);
            let out2 = c.add((i + 1) * n + j);
            V::storeu(out1.add(0 * w), r11);
            V::storeu(out2.add(0 * w), r12);
            V::storeu(out1.add(1 * w), r21);
            V::storeu(out2.add(1 * w), r22);
            V::storeu(out1.add(2 * w), r31);
            V::storeu(out2.add(2 * w), r32);
            V::storeu(out1.add(3 * w), r41);
            V::storeu(out2.add(3 * w), r42);

            i += 2;
        }

        if i < m {
            let mut r1 = V::zero();
            let mut r2 = V::zero();
            let mut r3 = V::zero();
            let mut r4 = V::zero();

            for p in 0..k {
                let row = b.add(p * n + j);
                let a1 = V::splat(*a.add(i * k + p));

                r1 = V::fmadd(a1, V::loadu(row.add(0 * w)), r1);
                r2 = V::fmadd(a1, V::loadu(row.add(1 * w)), r2);
                r3 = V::fmadd(a1, V::loadu(row.add(2 * w)), r3);
                r4 = V::fmadd(a1, V::loadu(row.add(3 * w)), r4);
            }

            let out = c.add(i * n + j);
            V::storeu(out.add(0 * w), r1);
            V::storeu(out.add(1 * w), r2);
            V::storeu(out.add(2 * w), r3);
            V::storeu(out.add(3 * w), r4);
        }

        j += 4 * w;
    }

    while j + 2 * w <= n {
        let mut i = 0;

        while i + 4 <= m {
            let mut r11 = V::zero();
            let mut r12 = V::zero();
            let mut r13 = V::zero();
            let mut r14 = V::zero();
            let mut r21 = V::zero();
            let mut r22 = V::zero();
            let mut r23 = V::zero();
            let mut r24 = V::zero();

            for p in 0..k {
                let b1 = V::loadu(b.add(p * n + j));
                let b2 = V::loadu(b.add(p * n + j + w));

                let a1 = V::splat(*a.add(i * k + p));
                let a2 = V::splat(*a.add((i + 1) * k + p));
                let a3 = V::splat(*a.add((i + 2) * k + p));
                let a4 = V::splat(*a.add((i + 3) * k + p));

                r11 = V::fmadd(a1, b1, r11);
                r12 = V::fmadd(a2, b1, r12);
                r13 = V::fmadd(a3, b1, r13);
                r14 = V::fmadd(a4, b1, r14);
                r21 = V::fmadd(a1, b2, r21);
                r22 = V::fmadd(a2, b2, r22);
                r23 = V::fmadd(a3, b2, r23);
                r24 = V::fmadd(a4, b2, r24);
            }

            V::storeu(c.add(i * n + j), r11);
            V::storeu(c.add((i + 1) * n + j), r12);
            V::storeu(c.add((i + 2) * n + j), r13);
            V::storeu(c.add((i + 3) * n + j), r14);
            V::storeu(c.add(i * n + j + w), r21);
            V::storeu(c.add((i + 1) * n + j + w), r22);
            V::storeu(c.add((i + 2) * n + j + w), r23);
            V::storeu(c.add((i + 3) * n + j + w), r24);

            i += 4;
        }

        while i + 2 <= m {
            let mut r11 = V::zero();
            let mut r12 = V::zero();
            let mut r21 = V::zero();
            let mut r22 = V::zero();

            for p in 0..k {
                let b1 = V::loadu(b.add(p * n + j));
                let b2 = V::loadu(b.add(p * n + j + w));

                let a1 = V::splat(*a.add(i * k + p));
                let a2 = V::splat(*a.add((i + 1) * k + p));

                r11 = V::fmadd(a1, b1, r11);
                r12 = V::fmadd(a2, b1, r12);
                r21 = V::fmadd(a1, b2, r21);
                r22 = V::fmadd(a2, b2, r22);
            }

            V::storeu(c.add(i * n + j), r11);
            V::storeu(c.add((i + 1) * n + j), r12);
            V::storeu(c.add(i * n + j + w), r21);
            V::storeu(c.add((i + 1) * n + j + w), r22);

            i += 2;
        }

        if i < m {
            let mut r1 = V::zero();
            let mut r2 = V::zero();

            for p in 0..k {
                let a1 = V::splat(*a.add(i * k + p));
                r1 = V::fmadd(a1, V::loadu(b.add(p * n + j)), r1);
                r2 = V::fmadd(a1, V::loadu(b.add(p * n + j + w)), r2);
            }

            V::storeu(c.add(i * n + j), r1);
            V::storeu(c.add(i * n + j + w), r2);
        }

        j += 2 * w;
    }

    while j + w <= n {
        let mut i = 0;

        while i + 2 <= m {
            let mut r1 = V::zero();
            let mut r2 = V::zero();

            for p in 0..k {
                let b1 = V::loadu(b.add(p * n + j));
                r1 = V::fmadd(V::splat(*a.add(i * k + p)), b1, r1);
                r2 = V::fmadd(V::splat(*a.add((i + 1) * k + p)), b1, r2);
            }

            V::storeu(c.add(i * n + j), r1);
            V::storeu(c.add((i + 1) * n + j), r2);

            i += 2;
        }

        if i < m {
            let mut r1 = V::zero();

            for p in 0..k {
                r1 = V::fmadd(V::splat(*a.add(i * k + p)), V::loadu(b.add(p * n + j)), r1);
            }

            V::storeu(c.add(i * n + j), r1);
        }

        j += w;
    }

    let zero = <V::Elem as Element>::ZERO;

    // Scalar column pairs
    while j + 2 <= n {
        let (j1, j2) = (j, j + 1);
        let mut i = 0;

        while i + 2 <= m {
            let (mut r11, mut r12, mut r21, mut r22) = (zero, zero, zero, zero);

            for p in 0..k {
                let a1 = *a.add(i * k + p);
                let a2 = *a.add((i + 1) * k + p);
                let b1 = *b.add(p * n + j1);
                let b2 = *b.add(p * n + j2);

                r11 += a1 * b1;
                r21 += a1 * b2;
                r12 += a2 * b1;
                r22 += a2 * b2;
            }

            *c.add(i * n + j1) = r11;
            *c.add(i * n + j2) = r21;
            *c.add((i + 1) * n + j1) = r12;
            *c.add((i + 1) * n + j2) = r22;

            i += 2;
        }

        if i < m {
            let (mut r1, mut r2) = (zero, zero);

            for p in 0..k {
                let a1 = *a.add(i * k + p);
                r1 += a1 * *b.add(p * n + j1);
                r2 += a1 * *b.add(p * n + j2);
            }

            *c.add(i * n + j1) = r1;
            *c.add(i * n + j2) = r2;
        }

        j += 2;
    }

    // Last column
    if j < n {
        let mut i = 0;

        while i + 2 <= m {
            let (mut r1, mut r2) = (zero, zero);

            for p in 0..k {
                let b1 = *b.add(p * n + j);
                r1 += *a.add(i * k + p) * b1;
                r2 += *a.add((i + 1) * k + p) * b1;
            }

            *c.add(i * n + j) = r1;
            *c.add((i + 1) * n + j) = r2;

            i += 2;
        }

        if i < m {
            let mut r1 = zero;

            for p in 0..k {
                r1 += *a.add(i * k + p) * *b.add(p * n + j);
            }

            *c.add(i * n + j) = r1;
        }
    }
}

/// One tile of the blocked GEMM: `C[rows, cols] += A[rows, depth] · B[depth, cols]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
    pub depth: Range<usize>,
}

/// Adds one depth block into a destination tile.
///
/// Loads the current destination sub-tile into registers, accumulates the
/// block and stores it back; partial sums carry across depth blocks through
/// memory.
///
/// # Safety
///
/// - The CPU supports backend `V`
/// - `a` is `? × k` and `b` is `k × n`, row-major, and `tile` lies inside
///   both and inside `c` (`? × n`)
/// - `c` holds the sums of earlier depth blocks (zero before the first)
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
#[allow(clippy::identity_op)]
pub unsafe fn gemm_accumulate_tile<V: Simd>(
    a: *const V::Elem,
    b: *const V::Elem,
    c: *mut V::Elem,
    n: usize,
    k: usize,
    tile: &Tile,
) {
    let w = V::LANES;
    let (i_begin, i_end) = (tile.rows.start, tile.rows.end);
    let j_end = tile.cols.end;
    let mut j = tile.cols.start;

    while j + 4 * w <= j_end {
        let (j1, j2, j3) = (j + w, j + 2 * w, j + 3 * w);
        let mut i = i_begin;

        while i + 2 <= i_end {
            let out1 = c.add(i * n);
            let out2 = c.add((i + 1) * n);

            let mut r11 = V::loadu(out1.add(j));
            let mut r12 = V::loadu(out1.add(j1));
            let mut r13 = V::loadu(out1.add(j2));
            let mut r14 = V::loadu(out1.add(j3));
            let mut r21 = V::loadu(out2.add(j));
            let mut r22 = V::loadu(out2.add(j1));
            let mut r23 = V::loadu(out2.add(j2));
            let mut r24 = V::loadu(out2.add(j3));

            for p in tile.depth.clone() {
                let a1 = V::splat(*a.add(i * k + p));
                let a2 = V::splat(*a.add((i + 1) * k + p));

                let row = b.add(p * n);
                let b1 = V::loadu(row.add(j));
                let b2 = V::loadu(row.add(j1));
                let b3 = V::loadu(row.add(j2));
                let b4 = V::loadu(row.add(j3));

                r11 = V::fmadd(a1, b1, r11);
                r12 = V::fmadd(a1, b2, r12);
                r13 = V::fmadd(a1, b3, r13);
                r14 = V::fmadd(a1, b4, r14);
                r21 = V::fmadd(a2, b1, r21);
                r22 = V::fmadd(a2, b2, r22);
                r23 = V::fmadd(a2, b3, r23);
                r24 = V::fmadd(a2, b4, r24);
            }

            V::storeu(out1.add(j), r11);
            V::storeu(out1.add(j1), r12);
            V::storeu(out1.add(j2), r13);
            V::storeu(out1.add(j3), r14);
            V::storeu(out2.add(j), r21);
            V::storeu(out2.add(j1), r22);
            V::storeu(out2.add(j2), r23);
            V::storeu(out2.add(j3), r24);

            i += 2;
        }

        if i < i_end {
            let out = c.add(i * n);

            let mut r1 = V::loadu(out.add(j));
            let mut r2 = V::loadu(out.add(j1));
            let mut r3 = V::loadu(out.add(j2));
            let mut r4 = V::loadu(out.add(j3));

            for p in tile.depth.clone() {
                let a1 = V::splat(*a.add(i * k + p));
                let row = b.add(p * n);

                r1 = V::fmadd(a1, V::loadu(row.add(j)), r1);
                r2 = V::fmadd(a1, V::loadu(row.add(j1)), r2);
                r3 = V::fmadd(a1, V::loadu(row.add(j2)), r3);
                r4 = V::fmadd(a1, V::loadu(row.add(j3)), r4);
            }

            V::storeu(out.add(j), r1);
            V::storeu(out.add(j1), r2);
            V::storeu(out.add(j2), r3);
            V::storeu(out.add(j3), r4);
        }

        j += 4 * w;
    }

    while j + 2 * w <= j_end {
        let j1 = j + w;
        let mut i = i_begin;

        while i + 4 <= i_end {
            let out1 = c.add(i * n);
            let out2 = c.add((i + 1) * n);
            let out3 = c.add((i + 2) * n);
            let out4 = c.add((i + 3) * n);

            let mut r11 = V::loadu(out1.add(j));
            let mut r12 = V::loadu(out1.add(j1));
            let mut r21 = V::loadu(out2.add(j));
            let mut r22 = V::loadu(out2.add(j1));
            let mut r31 = V::loadu(out3.add(j));
            let mut r32 = V::loadu(out3.add(j1));
            let mut r41 = V::loadu(out4.add(j));
            let mut r42 = V::loadu(out4.add(j1));

            for p in tile.depth.clone() {
                let a1 = V::splat(*a.add(i * k + p));
                let a2 = V::splat(*a.add((i + 1) * k + p));
                let a3 = V::splat(*a.add((i + 2) * k + p));
                let a4 = V::splat(*a.add((i + 3) * k + p));

                let b1 = V::loadu(b.add(p * n + j));
                let b2 = V::loadu(b.add(p * n + j1));

                r11 = V::fmadd(a1, b1, r11);
                r12 = V::fmadd(a1, b2, r12);
                r21 = V::fmadd(a2, b1, r21);
                r22 = V::fmadd(a2, b2, r22);
                r31 = V::fmadd(a3, b1, r31);
                r32 = V::fmadd(a3, b2, r32);
                r41 = V::fmadd(a4, b1, r41);
                r42 = V::fmadd(a4, b2, r42);
            }

            V::storeu(out1.add(j), r11);
            V::storeu(out1.add(j1), r12);
            V::storeu(out2.add(j), r21);
            V::storeu(out2.add(j1), r22);
            V::storeu(out3.add(j), r31);
            V::storeu(out3.add(j1), r32);
            V::storeu(out4.add(j), r41);
            V::storeu(out4.add(j1), r42);

            i += 4;
        }

        while i + 2 <= i_end {
            let out1 = c.add(i * n);
            let out2 = c.add((i + 1) * n);

            let mut r11 = V::loadu(out1.add(j));
            let mut r12 = V::loadu(out1.add(j1));
            let mut r21 = V::loadu(out2.add(j));
            let mut r22 = V::loadu(out2.add(j1));

            for p in tile.depth.clone() {
                let a1 = V::splat(*a.add(i * k + p));
                let a2 = V::splat(*a.add((i + 1) * k + p));

                let b1 = V::loadu(b.add(p * n + j));
                let b2 = V::loadu(b.add(p * n + j1));

                r11 = V::fmadd(a1, b1, r11);
                r12 = V::fmadd(a1, b2, r12);
                r21 = V::fmadd(a2, b1, r21);
                r22 = V::fmadd(a2, b2, r22);
            }

            V::storeu(out1.add(j), r11);
            V::storeu(out1.add(j1), r12);
            V::storeu(out2.add(j), r21);
            V::storeu(out2.add(j1), r22);

            i += 2;
        }

        if i < i_end {
            let out = c.add(i * n);

            let mut r1 = V::loadu(out.add(j));
            let mut r2 = V::loadu(out.add(j1));

            for p in tile.depth.clone() {
                let a1 = V::splat(*a.add(i * k + p));
                r1 = V::fmadd(a1, V::loadu(b.add(p * n + j)), r1);
                r2 = V::fmadd(a1, V::loadu(b.add(p * n + j1)), r2);
            }

            V::storeu(out.add(j), r1);
            V::storeu(out.add(j1), r2);
        }

        j += 2 * w;
    }

    while j + w <= j_end {
        for i in tile.rows.clone() {
            let out = c.add(i * n + j);
            let mut r1 = V::loadu(out);

            for p in tile.depth.clone() {
                r1 = V::fmadd(V::splat(*a.add(i * k + p)), V::loadu(b.add(p * n + j)), r1);
            }

            V::storeu(out, r1);
        }

        j += w;
    }

    while j < j_end {
        for i in tile.rows.clone() {
            let mut value = *c.add(i * n + j);

            for p in tile.depth.clone() {
                value += *a.add(i * k + p) * *b.add(p * n + j);
            }

            *c.add(i * n + j) = value;
        }

        j += 1;
    }
}
