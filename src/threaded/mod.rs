//! Multi-threaded drivers.
//!
//! These split the output rows of a row-major problem into disjoint chunks
//! and run one independent kernel call per chunk on scoped threads. Thread
//! count adapts to problem size - small problems use fewer threads to avoid
//! overhead.
//!
//! - `gemv_mt`: row chunks of `A` and `c`, the whole of `b` shared
//! - `gemm_mt`: row chunks of `A` and `C`, the whole of `B` shared

pub mod gemm_mt;
pub mod gemv_mt;

const SINGLE_THREAD_FLOPS: f64 = 100_000_000.0;
const TWO_THREAD_FLOPS: f64 = 300_000_000.0;

/// Minimum output rows one thread is given.
pub const MIN_ROWS_PER_THREAD: usize = 64;

/// Threads to use for an `m × k` by `k × n` product.
///
/// - < 100M FLOPs: 1 thread
/// - < 300M FLOPs: 2 threads
/// - Otherwise: up to `max_threads`
///
/// Never more than one thread per 64 output rows, never zero.
pub fn choose_thread_count(m: usize, n: usize, k: usize, max_threads: usize) -> usize {
    let flops = 2.0 * m as f64 * n as f64 * k as f64;

    let optimal_threads = if flops < SINGLE_THREAD_FLOPS {
        1
    } else if flops < TWO_THREAD_FLOPS {
        2
    } else {
        max_threads
    };

    let threads_by_rows = (m / MIN_ROWS_PER_THREAD).max(1);

    optimal_threads.min(threads_by_rows).min(max_threads).max(1)
}

/// Rows per chunk when `m` rows are split over `threads`.
pub(crate) fn rows_per_thread(m: usize, threads: usize) -> usize {
    m.div_ceil(threads.max(1)).max(1)
}

/// Joins a scoped thread, re-raising its panic on the caller.
pub(crate) fn join<T>(handle: std::thread::ScopedJoinHandle<'_, T>) -> T {
    match handle.join() {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_problems_stay_single_threaded() {
        assert_eq!(choose_thread_count(100, 100, 100, 8), 1);
        assert_eq!(choose_thread_count(4096, 4096, 1, 8), 1);
    }

    #[test]
    fn test_flop_bands() {
        // 2 * 400^3 = 128M
        assert_eq!(choose_thread_count(400, 400, 400, 8), 2);
        // 2 * 1024^3 ≈ 2.1G
        assert_eq!(choose_thread_count(1024, 1024, 1024, 8), 8);
        assert_eq!(choose_thread_count(1024, 1024, 1024, 3), 3);
    }

    #[test]
    fn test_row_cap_and_floor() {
        // Plenty of work but only 128 rows: at most 2 threads
        assert_eq!(choose_thread_count(128, 100_000, 100_000, 16), 2);
        assert_eq!(choose_thread_count(1024, 1024, 1024, 0), 1);
    }

    #[test]
    fn test_rows_per_thread() {
        assert_eq!(rows_per_thread(10, 3), 4);
        assert_eq!(rows_per_thread(9, 3), 3);
        assert_eq!(rows_per_thread(0, 4), 1);
    }
}
