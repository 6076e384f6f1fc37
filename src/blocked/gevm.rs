//! Blocked vector × matrix.

use crate::kernels::gevm::gevm_accumulate_tile;
use crate::simd::Simd;

/// Rows of `B` visited per block when all columns fit one column block.
pub const K_BLOCK_NARROW: usize = 8;
/// Rows of `B` visited per block otherwise.
pub const K_BLOCK_WIDE: usize = 4;

/// Cache-blocked `c[0..n] += a (m) · B (m×n)`.
///
/// The outer loop walks column blocks of `n_block` elements, the inner one
/// walks the rows of `B` in blocks of 8 (when `n < n_block`) or 4. Each
/// block pair is added into `c`, so `c` must be zeroed before the call.
///
/// # Safety
///
/// - The CPU supports backend `V`
/// - `aa` is valid for `m` reads, `bb` for `m * n`, `cc` for `n` reads and writes
/// - `cc` does not overlap `aa` or `bb`
/// - `n_block > 0`
#[inline(always)]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn gevm_large<V: Simd>(
    aa: *const V::Elem,
    m: usize,
    n: usize,
    bb: *const V::Elem,
    cc: *mut V::Elem,
    n_block: usize,
) {
    let k_block = if n < n_block { K_BLOCK_NARROW } else { K_BLOCK_WIDE };

    for jj in (0..n).step_by(n_block) {
        let j_end = (jj + n_block).min(n);

        for kk in (0..m).step_by(k_block) {
            let k_end = (kk + k_block).min(m);
            gevm_accumulate_tile::<V>(aa, n, bb, cc, kk..k_end, jj..j_end);
        }
    }
}
