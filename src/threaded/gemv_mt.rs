//! Row-split matrix × vector.

use tracing::debug;

use super::{join, rows_per_thread};
use crate::dispatch::GemvKernel;
use crate::element::Element;
use crate::view::{MatrixView, VectorView};

/// Runs `kernel` over disjoint row chunks of a row-major `A` on up to
/// `threads` scoped threads.
///
/// `c` must hold exactly `A.rows()` elements. Each chunk reads its own rows
/// of `A`, the whole of `b` and writes its own slice of `c`. Only the last
/// chunk ends at the pad of `A`, so only it runs with `padded`.
pub fn gemv_rows<T: Element>(
    kernel: GemvKernel<T>,
    a: &MatrixView<'_, T>,
    b: &VectorView<'_, T>,
    c: &mut [T],
    padded: bool,
    threads: usize,
) {
    let (m, n) = (a.rows(), a.cols());
    assert_eq!(c.len(), m, "c: expected {m} elements");
    assert_eq!(b.len(), n, "b: expected {n} elements");

    let chunk = rows_per_thread(m, threads);
    debug!(m, n, threads, rows_per_thread = chunk, "splitting gemv rows");

    let a_storage = a.storage();
    let b_storage = b.storage();
    let chunks = m.div_ceil(chunk);

    std::thread::scope(|scope| {
        let handles: Vec<_> = c
            .chunks_mut(chunk)
            .enumerate()
            .map(|(tid, c_rows)| {
                let a_rows = &a_storage[tid * chunk * n..];
                let padded = padded && tid + 1 == chunks;
                scope.spawn(move || {
                    // SAFETY: `a_rows` starts at this chunk's first row and
                    // runs to the end of A's storage, which covers
                    // `c_rows.len() * n` elements, plus the pad when this is
                    // the last chunk; `b_storage` covers `n` (or its pad) and
                    // `c_rows` is this thread's own slice.
                    unsafe {
                        kernel(
                            a_rows.as_ptr(),
                            c_rows.len(),
                            n,
                            b_storage.as_ptr(),
                            c_rows.as_mut_ptr(),
                            padded,
                        )
                    }
                })
            })
            .collect();

        for handle in handles {
            join(handle);
        }
    });
}
