//! Row-split matrix × matrix.

use tracing::debug;

use super::{join, rows_per_thread};
use crate::config::GemmBlock;
use crate::dispatch::{GemmBlockedKernel, GemmKernel};
use crate::element::Element;
use crate::view::MatrixView;

/// Kernel each thread runs on its rows.
#[derive(Clone, Copy)]
pub enum RowKernel<T> {
    Small(GemmKernel<T>),
    Large(GemmBlockedKernel<T>, GemmBlock),
}

impl<T> RowKernel<T> {
    /// # Safety
    ///
    /// Same contract as the wrapped kernel.
    unsafe fn run(self, a: *const T, b: *const T, c: *mut T, m: usize, n: usize, k: usize) {
        match self {
            RowKernel::Small(kernel) => unsafe { kernel(a, b, c, m, n, k) },
            RowKernel::Large(kernel, block) => unsafe { kernel(a, b, c, m, n, k, block) },
        }
    }
}

/// Runs `kernel` over disjoint row chunks of row-major `A` and `C` on up to
/// `threads` scoped threads; `B` is shared read-only.
///
/// `c` must hold exactly `A.rows() * B.cols()` elements.
pub fn gemm_rows<T: Element>(
    kernel: RowKernel<T>,
    a: &MatrixView<'_, T>,
    b: &MatrixView<'_, T>,
    c: &mut [T],
    threads: usize,
) {
    let (m, k, n) = (a.rows(), a.cols(), b.cols());
    assert_eq!(b.rows(), k, "B: expected {k} rows");
    assert_eq!(c.len(), m * n, "C: expected {m}x{n}={} elements", m * n);

    if n == 0 {
        return;
    }

    let chunk = rows_per_thread(m, threads);
    debug!(m, n, k, threads, rows_per_thread = chunk, "splitting gemm rows");

    let a_storage = a.storage();
    let b_storage = b.storage();

    std::thread::scope(|scope| {
        let handles: Vec<_> = c
            .chunks_mut(chunk * n)
            .enumerate()
            .map(|(tid, c_rows)| {
                let a_rows = &a_storage[tid * chunk * k..];
                let rows = c_rows.len() / n;
                scope.spawn(move || {
                    // SAFETY: `a_rows` holds this chunk's `rows * k`
                    // elements, `b_storage` all `k * n` of B and `c_rows`
                    // exactly `rows * n` elements owned by this thread.
                    unsafe {
                        kernel.run(a_rows.as_ptr(), b_storage.as_ptr(), c_rows.as_mut_ptr(), rows, n, k)
                    }
                })
            })
            .collect();

        for handle in handles {
            join(handle);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::testing::{assert_close, gemm_ref, pattern};
    use crate::simd::portable::F64_KERNELS;

    #[test]
    fn test_small_and_large_kernels_split_rows() {
        let (m, n, k) = (37, 21, 30);
        let a = pattern(m * k, 10);
        let b = pattern(k * n, 9);
        let expected = gemm_ref(&a, &b, m, n, k);

        let kernels = [
            RowKernel::Small(F64_KERNELS.gemm_small),
            RowKernel::Large(F64_KERNELS.gemm_large, GemmBlock { rows: 8, cols: 16, depth: 7 }),
        ];

        for kernel in kernels {
            for threads in [1, 2, 4, 5] {
                let mut c = vec![f64::NAN; m * n];
                gemm_rows(kernel, &MatrixView::new(&a, m, k), &MatrixView::new(&b, k, n), &mut c, threads);
                assert_close(&expected, &c, &format!("{threads} threads"));
            }
        }
    }

    #[test]
    fn test_empty_columns() {
        let a = [1.0; 6];
        let b: [f64; 0] = [];
        let mut c: [f64; 0] = [];
        gemm_rows(
            RowKernel::Small(F64_KERNELS.gemm_small),
            &MatrixView::new(&a, 3, 2),
            &MatrixView::new(&b, 2, 0),
            &mut c,
            2,
        );
    }
}
