//! Dense matrix × vector, vector × matrix and matrix × matrix products.
//!
//! Each call inspects the operands' layouts and size, then runs one of
//! three paths: a layout-agnostic scalar loop when any matrix is not
//! row-major, a register-blocked "small" kernel below a size threshold, or
//! a cache-blocked "large" kernel above it. The kernels are written once
//! against [`simd::Simd`] and compiled per backend (portable, AVX2/FMA, and
//! AVX-512 behind the `avx512` feature); the fastest one the CPU supports
//! is picked at runtime.
//!
//! ## Usage
//!
//! ```
//! use densemul::{HostOnly, MatrixView, VectorView, VectorViewMut, multiply_matrix_vector};
//!
//! let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
//! let b = [7.0, 8.0, 9.0];
//! let mut c = [0.0; 2];
//!
//! let dispatch = multiply_matrix_vector(
//!     &MatrixView::new(&a, 2, 3),
//!     &VectorView::new(&b),
//!     &mut VectorViewMut::new(&mut c),
//! )
//! .unwrap();
//! dispatch.notify(&HostOnly);
//!
//! assert_eq!(c, [50.0, 122.0]);
//! ```
//!
//! For large problems, use the multi-threaded versions:
//!
//! ```
//! use densemul::{HostOnly, MatrixView, MatrixViewMut, multiply_matrix_matrix_parallel};
//!
//! let a = vec![1.0f64; 256 * 256];
//! let b = vec![1.0f64; 256 * 256];
//! let mut c = vec![0.0f64; 256 * 256];
//!
//! multiply_matrix_matrix_parallel(
//!     &MatrixView::new(&a, 256, 256),
//!     &MatrixView::new(&b, 256, 256),
//!     &mut MatrixViewMut::new(&mut c, 256, 256),
//!     4,
//! )
//! .unwrap()
//! .notify(&HostOnly);
//!
//! assert!(c.iter().all(|&x| x == 256.0));
//! ```
//!
//! ## Comparing results
//!
//! The vectorized kernels sum in several lanes and reduce at the end, and
//! the blocked kernels split the shared index into blocks. Results are
//! reproducible for one backend and problem size, but differ from a
//! left-to-right scalar sum in the last bits. Compare against a scalar
//! reference with a tolerance, never with `==`.

pub mod blocked;
pub mod config;
pub mod dispatch;
pub mod element;
pub mod error;
pub mod kernels;
pub mod matrix;
pub mod residency;
pub mod simd;
pub mod threaded;
pub mod view;

#[cfg(feature = "trace-spans")]
use tracing::instrument;
use tracing::trace;

pub use config::{GemmBlock, GemmConfig};
pub use dispatch::{KernelPath, KernelTable, Operation, select_path};
pub use element::Element;
pub use error::{DenseError, Result};
pub use residency::{DeviceResidency, Dispatch, HostOnly, sync_operands};
pub use simd::SimdLevel;
pub use view::{Layout, MatrixView, MatrixViewMut, PADDING_LANES, VectorView, VectorViewMut, padded_len};

fn check_extent(op: Operation, operand: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(DenseError::ShapeMismatch {
            op,
            operand,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Kernel table for a vectorized path, `None` for the naive one.
fn plan<T: Element>(path: KernelPath, config: &GemmConfig) -> Option<KernelTable<T>> {
    path.is_vectorized().then(|| T::kernel_table(config.simd_level()))
}

fn gemv_path<T: Element>(
    a: &MatrixView<'_, T>,
    b: &VectorView<'_, T>,
    c: &VectorViewMut<'_, T>,
    config: &GemmConfig,
) -> Result<KernelPath> {
    check_extent(Operation::Gemv, "b", a.cols(), b.len())?;
    check_extent(Operation::Gemv, "c", a.rows(), c.len())?;
    config.validate()?;
    Ok(select_path(
        a.layout() == Layout::RowMajor,
        a.len(),
        config.gemv_small_threshold,
    ))
}

fn gemm_path<T: Element>(
    a: &MatrixView<'_, T>,
    b: &MatrixView<'_, T>,
    c: &MatrixViewMut<'_, T>,
    config: &GemmConfig,
) -> Result<KernelPath> {
    check_extent(Operation::Gemm, "b rows", a.cols(), b.rows())?;
    check_extent(Operation::Gemm, "c rows", a.rows(), c.rows())?;
    check_extent(Operation::Gemm, "c cols", b.cols(), c.cols())?;
    config.validate()?;
    let all_row_major = [a.layout(), b.layout(), c.layout()]
        .iter()
        .all(|&layout| layout == Layout::RowMajor);
    Ok(select_path(
        all_row_major,
        a.len().max(b.len()),
        config.gemm_small_threshold,
    ))
}

/// `c = A · b` with the default configuration.
///
/// `A` is `M × N`, `b` has `N` elements and `c` has `M`. `c` is overwritten.
pub fn multiply_matrix_vector<T: Element>(
    a: &MatrixView<'_, T>,
    b: &VectorView<'_, T>,
    c: &mut VectorViewMut<'_, T>,
) -> Result<Dispatch> {
    multiply_matrix_vector_with_config(a, b, c, &GemmConfig::default())
}

/// [`multiply_matrix_vector`] with explicit thresholds and vector mode.
///
/// When both `A` and `b` are padded the kernel runs whole vectors over the
/// tail of the final row instead of a scalar remainder loop. Other rows
/// keep the remainder loop, since their tail is followed by the next row.
///
/// # Panics
///
/// Panics if `config` forces a vector mode this machine cannot run.
#[cfg_attr(feature = "trace-spans", instrument(skip_all, fields(m = a.rows(), n = a.cols())))]
pub fn multiply_matrix_vector_with_config<T: Element>(
    a: &MatrixView<'_, T>,
    b: &VectorView<'_, T>,
    c: &mut VectorViewMut<'_, T>,
    config: &GemmConfig,
) -> Result<Dispatch> {
    let path = gemv_path(a, b, c, config)?;
    let (m, n) = (a.rows(), a.cols());

    let Some(table) = plan::<T>(path, config) else {
        trace!(op = %Operation::Gemv, m, n, ?path, "dispatch");
        matrix::naive::gemv(a, b, c);
        return Ok(Dispatch::new(Operation::Gemv, path, None));
    };

    let kernel = match path {
        KernelPath::Small => table.gemv_small,
        _ => table.gemv_large,
    };
    let padded = a.is_padded() && b.is_padded();
    trace!(op = %Operation::Gemv, m, n, ?path, level = ?table.level, padded, "dispatch");

    // SAFETY: extents were checked above; the views guarantee `m * n`
    // readable elements of A (plus the pad when padded), `n` of b and `m`
    // of c, and c is a unique borrow distinct from both sources.
    unsafe { kernel(a.as_ptr(), m, n, b.as_ptr(), c.as_mut_ptr(), padded) };

    Ok(Dispatch::new(Operation::Gemv, path, Some(table.level)))
}

/// `c = a · B` with the default configuration.
///
/// `a` has `M` elements, `B` is `M × N` and `c` has `N`. `c` is overwritten.
pub fn multiply_vector_matrix<T: Element>(
    a: &VectorView<'_, T>,
    b: &MatrixView<'_, T>,
    c: &mut VectorViewMut<'_, T>,
) -> Result<Dispatch> {
    multiply_vector_matrix_with_config(a, b, c, &GemmConfig::default())
}

/// [`multiply_vector_matrix`] with explicit thresholds and vector mode.
///
/// The large kernel accumulates into `c` across blocks of rows of `B`, so
/// `c` is zeroed before it runs. The small kernel stores each column once
/// and needs no zeroing.
///
/// # Panics
///
/// Panics if `config` forces a vector mode this machine cannot run.
#[cfg_attr(feature = "trace-spans", instrument(skip_all, fields(m = b.rows(), n = b.cols())))]
pub fn multiply_vector_matrix_with_config<T: Element>(
    a: &VectorView<'_, T>,
    b: &MatrixView<'_, T>,
    c: &mut VectorViewMut<'_, T>,
    config: &GemmConfig,
) -> Result<Dispatch> {
    check_extent(Operation::Gevm, "a", b.rows(), a.len())?;
    check_extent(Operation::Gevm, "c", b.cols(), c.len())?;
    config.validate()?;
    let (m, n) = (b.rows(), b.cols());
    let path = select_path(b.layout() == Layout::RowMajor, b.len(), config.gevm_small_threshold);

    let Some(table) = plan::<T>(path, config) else {
        trace!(op = %Operation::Gevm, m, n, ?path, "dispatch");
        matrix::naive::gevm(a, b, c);
        return Ok(Dispatch::new(Operation::Gevm, path, None));
    };

    trace!(op = %Operation::Gevm, m, n, ?path, level = ?table.level, "dispatch");

    // SAFETY: extents were checked above; a holds `m`, B `m * n` and c `n`
    // elements, and c is a unique borrow distinct from both sources.
    match path {
        KernelPath::Small => unsafe { (table.gevm_small)(a.as_ptr(), m, n, b.as_ptr(), c.as_mut_ptr()) },
        _ => {
            c.fill(T::ZERO);
            let n_block = config.gevm_block_elems::<T>(table.lanes);
            unsafe { (table.gevm_large)(a.as_ptr(), m, n, b.as_ptr(), c.as_mut_ptr(), n_block) }
        }
    }

    Ok(Dispatch::new(Operation::Gevm, path, Some(table.level)))
}

/// `C = A · B` with the default configuration.
///
/// `A` is `M × K`, `B` is `K × N` and `C` is `M × N`. `C` is overwritten.
pub fn multiply_matrix_matrix<T: Element>(
    a: &MatrixView<'_, T>,
    b: &MatrixView<'_, T>,
    c: &mut MatrixViewMut<'_, T>,
) -> Result<Dispatch> {
    multiply_matrix_matrix_with_config(a, b, c, &GemmConfig::default())
}

/// [`multiply_matrix_matrix`] with explicit thresholds, block sizes and
/// vector mode.
///
/// The vectorized paths need all three matrices row-major; any other
/// combination runs the i-k-j scalar loop.
///
/// # Panics
///
/// Panics if `config` forces a vector mode this machine cannot run.
#[cfg_attr(
    feature = "trace-spans",
    instrument(skip_all, fields(m = a.rows(), k = a.cols(), n = b.cols()))
)]
pub fn multiply_matrix_matrix_with_config<T: Element>(
    a: &MatrixView<'_, T>,
    b: &MatrixView<'_, T>,
    c: &mut MatrixViewMut<'_, T>,
    config: &GemmConfig,
) -> Result<Dispatch> {
    let path = gemm_path(a, b, c, config)?;
    let (m, n, k) = (a.rows(), b.cols(), a.cols());

    let Some(table) = plan::<T>(path, config) else {
        trace!(op = %Operation::Gemm, m, n, k, ?path, "dispatch");
        matrix::naive::gemm(a, b, c);
        return Ok(Dispatch::new(Operation::Gemm, path, None));
    };

    trace!(op = %Operation::Gemm, m, n, k, ?path, level = ?table.level, "dispatch");

    // SAFETY: extents were checked above; all three matrices are row-major
    // with `m * k`, `k * n` and `m * n` elements, and C is a unique borrow
    // distinct from both sources.
    match path {
        KernelPath::Small => unsafe { (table.gemm_small)(a.as_ptr(), b.as_ptr(), c.as_mut_ptr(), m, n, k) },
        _ => unsafe {
            (table.gemm_large)(a.as_ptr(), b.as_ptr(), c.as_mut_ptr(), m, n, k, config.gemm_block)
        },
    }

    Ok(Dispatch::new(Operation::Gemm, path, Some(table.level)))
}

/// Same as [`multiply_matrix_vector`] but splits the rows of `c` across
/// up to `num_threads` threads.
///
/// Thread count adapts to problem size - small problems run on the calling
/// thread because the overhead isn't worth it.
pub fn multiply_matrix_vector_parallel<T: Element>(
    a: &MatrixView<'_, T>,
    b: &VectorView<'_, T>,
    c: &mut VectorViewMut<'_, T>,
    num_threads: usize,
) -> Result<Dispatch> {
    multiply_matrix_vector_parallel_with_config(a, b, c, num_threads, &GemmConfig::default())
}

/// [`multiply_matrix_vector_parallel`] with explicit thresholds and vector mode.
pub fn multiply_matrix_vector_parallel_with_config<T: Element>(
    a: &MatrixView<'_, T>,
    b: &VectorView<'_, T>,
    c: &mut VectorViewMut<'_, T>,
    num_threads: usize,
    config: &GemmConfig,
) -> Result<Dispatch> {
    let path = gemv_path(a, b, c, config)?;
    let threads = threaded::choose_thread_count(a.rows(), a.cols(), 1, num_threads);
    if threads <= 1 || !path.is_vectorized() {
        return multiply_matrix_vector_with_config(a, b, c, config);
    }

    let Some(table) = plan::<T>(path, config) else {
        return multiply_matrix_vector_with_config(a, b, c, config);
    };
    let kernel = match path {
        KernelPath::Small => table.gemv_small,
        _ => table.gemv_large,
    };
    let padded = a.is_padded() && b.is_padded();
    trace!(op = %Operation::Gemv, m = a.rows(), n = a.cols(), ?path, level = ?table.level, threads, "dispatch");

    threaded::gemv_mt::gemv_rows(kernel, a, b, c.as_mut_slice(), padded, threads);

    Ok(Dispatch::new(Operation::Gemv, path, Some(table.level)))
}

/// Same as [`multiply_matrix_matrix`] but splits the rows of `C` across
/// up to `num_threads` threads.
///
/// Thread count adapts to matrix size - small matrices use fewer threads
/// because the overhead isn't worth it.
pub fn multiply_matrix_matrix_parallel<T: Element>(
    a: &MatrixView<'_, T>,
    b: &MatrixView<'_, T>,
    c: &mut MatrixViewMut<'_, T>,
    num_threads: usize,
) -> Result<Dispatch> {
    multiply_matrix_matrix_parallel_with_config(a, b, c, num_threads, &GemmConfig::default())
}

/// [`multiply_matrix_matrix_parallel`] with explicit thresholds and vector mode.
pub fn multiply_matrix_matrix_parallel_with_config<T: Element>(
    a: &MatrixView<'_, T>,
    b: &MatrixView<'_, T>,
    c: &mut MatrixViewMut<'_, T>,
    num_threads: usize,
    config: &GemmConfig,
) -> Result<Dispatch> {
    let path = gemm_path(a, b, c, config)?;
    let threads = threaded::choose_thread_count(a.rows(), b.cols(), a.cols(), num_threads);
    if threads <= 1 || !path.is_vectorized() {
        return multiply_matrix_matrix_with_config(a, b, c, config);
    }

    let Some(table) = plan::<T>(path, config) else {
        return multiply_matrix_matrix_with_config(a, b, c, config);
    };
    trace!(
        op = %Operation::Gemm,
        m = a.rows(),
        n = b.cols(),
        k = a.cols(),
        ?path,
        level = ?table.level,
        threads,
        "dispatch"
    );

    let kernel = match path {
        KernelPath::Small => threaded::gemm_mt::RowKernel::Small(table.gemm_small),
        _ => threaded::gemm_mt::RowKernel::Large(table.gemm_large, config.gemm_block),
    };
    threaded::gemm_mt::gemm_rows(kernel, a, b, c.as_mut_slice(), threads);

    Ok(Dispatch::new(Operation::Gemm, path, Some(table.level)))
}
