//! Blocked matrix × matrix.

use crate::config::GemmBlock;
use crate::element::Element;
use crate::kernels::gemm::{Tile, gemm_accumulate_tile};
use crate::simd::Simd;

/// Cache-blocked `C (m×n) = A (m×k) · B (k×n)`.
///
/// Loop order: column blocks, then row blocks, then shared-index blocks.
/// Each destination tile is zeroed once and then receives every depth block
/// in turn, so partial sums live in `c` between blocks. The destination does
/// not need to be zeroed by the caller.
///
/// # Safety
///
/// - The CPU supports backend `V`
/// - `a` is valid for `m * k` reads, `b` for `k * n`, `c` for `m * n` writes
/// - `c` does not overlap `a` or `b`
/// - every block extent is non-zero
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
#[allow(clippy::too_many_arguments)]
pub unsafe fn gemm_large<V: Simd>(
    a: *const V::Elem,
    b: *const V::Elem,
    c: *mut V::Elem,
    m: usize,
    n: usize,
    k: usize,
    block: GemmBlock,
) {
    for jj in (0..n).step_by(block.cols) {
        let j_end = (jj + block.cols).min(n);

        for ii in (0..m).step_by(block.rows) {
            let i_end = (ii + block.rows).min(m);

            for i in ii..i_end {
                for j in jj..j_end {
                    *c.add(i * n + j) = <V::Elem as Element>::ZERO;
                }
            }

            for kk in (0..k).step_by(block.depth) {
                let tile = Tile {
                    rows: ii..i_end,
                    cols: jj..j_end,
                    depth: kk..(kk + block.depth).min(k),
                };
                gemm_accumulate_tile::<V>(a, b, c, n, k, &tile);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::testing::{assert_close, gemm_ref, pattern};
    use crate::simd::PortableF64;

    #[test]
    fn test_matches_reference_across_blocks() {
        let blocks = [
            GemmBlock::default(),
            GemmBlock { rows: 3, cols: 10, depth: 4 },
            GemmBlock { rows: 1, cols: 1, depth: 1 },
        ];

        for block in blocks {
            for (m, n, k) in [(1, 1, 1), (5, 9, 3), (13, 37, 11), (70, 140, 130)] {
                let a = pattern(m * k, 10);
                let b = pattern(k * n, 9);
                let expected = gemm_ref(&a, &b, m, n, k);

                let mut c = vec![f64::NAN; m * n];
                unsafe { gemm_large::<PortableF64>(a.as_ptr(), b.as_ptr(), c.as_mut_ptr(), m, n, k, block) };

                assert_close(&expected, &c, &format!("gemm_large {m}x{n}x{k} {block:?}"));
            }
        }
    }

    #[test]
    fn test_empty_depth_zeroes_destination() {
        let (m, n) = (3, 5);
        let mut c = vec![7.0; m * n];
        unsafe {
            gemm_large::<PortableF64>(
                std::ptr::null(),
                std::ptr::null(),
                c.as_mut_ptr(),
                m,
                n,
                0,
                GemmBlock::default(),
            )
        };
        assert!(c.iter().all(|&x| x == 0.0));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_avx2() {
        if !crate::simd::SimdLevel::Avx2.is_available() {
            println!("Skipping - AVX2 not available");
            return;
        }
        let (m, n, k) = (67, 131, 129);
        let a = pattern(m * k, 10);
        let b = pattern(k * n, 9);
        let expected = gemm_ref(&a, &b, m, n, k);

        let mut c = vec![0.0; m * n];
        unsafe {
            (crate::simd::x86::avx2_f64::KERNELS.gemm_large)(
                a.as_ptr(),
                b.as_ptr(),
                c.as_mut_ptr(),
                m,
                n,
                k,
                GemmBlock::default(),
            )
        };

        assert_close(&expected, &c, "avx2 gemm_large");
    }
}
