//! Register-blocked micro-kernels.
//!
//! Each kernel works on raw row-major buffers plus explicit dimensions and
//! is generic over a [`Simd`](crate::simd::Simd) backend. Loop bands are
//! written out one by one (8/4/2/1 rows or vectors) so no band pays for a
//! generic unroll loop.
//!
//! - `gemv`: `gemv_small`, `gemv_large` (matrix × vector)
//! - `gevm`: `gevm_small`, plus the tile kernel the blocked GEVM drives
//! - `gemm`: `gemm_small`, plus the tile kernel the blocked GEMM drives
//!
//! Results differ from a left-to-right scalar sum in the last bits: lanes
//! are summed separately and reduced at the end. Compare approximately.

pub mod gemm;
pub mod gemv;
pub mod gevm;

/// `acc = row[k..k + LANES] * b + acc` for every listed pair.
macro_rules! fma_rows {
    ($v:ty, $b:expr, $k:expr; $($acc:ident += $row:ident),+ $(,)?) => {
        $( $acc = <$v>::fmadd(<$v>::loadu($row.add($k)), $b, $acc); )+
    };
}

pub(crate) use fma_rows;

#[cfg(test)]
pub(crate) mod testing {
    use crate::element::Element;

    /// Elements the shape grids run on; the reference stays in f64.
    pub trait Real: Element + Into<f64> {
        fn of(x: f64) -> Self;
    }

    impl Real for f32 {
        fn of(x: f64) -> f32 {
            x as f32
        }
    }

    impl Real for f64 {
        fn of(x: f64) -> f64 {
            x
        }
    }

    pub fn cast<T: Real>(data: &[f64]) -> Vec<T> {
        data.iter().map(|&x| T::of(x)).collect()
    }

    pub fn widen<T: Real>(data: &[T]) -> Vec<f64> {
        data.iter().map(|&x| x.into()).collect()
    }

    /// Deterministic small-integer data, exact in f32 and f64.
    pub fn pattern(len: usize, modulo: usize) -> Vec<f64> {
        (0..len).map(|i| ((i * 7 + 3) % modulo) as f64 - 4.0).collect()
    }

    pub fn gemv_ref(a: &[f64], m: usize, n: usize, b: &[f64]) -> Vec<f64> {
        let mut c = vec![0.0; m];
        for i in 0..m {
            for k in 0..n {
                c[i] += a[i * n + k] * b[k];
            }
        }
        c
    }

    pub fn gevm_ref(a: &[f64], m: usize, n: usize, b: &[f64]) -> Vec<f64> {
        let mut c = vec![0.0; n];
        for k in 0..m {
            for j in 0..n {
                c[j] += a[k] * b[k * n + j];
            }
        }
        c
    }

    pub fn gemm_ref(a: &[f64], b: &[f64], m: usize, n: usize, k: usize) -> Vec<f64> {
        let mut c = vec![0.0; m * n];
        for i in 0..m {
            for p in 0..k {
                for j in 0..n {
                    c[i * n + j] += a[i * k + p] * b[p * n + j];
                }
            }
        }
        c
    }

    pub fn assert_close(expected: &[f64], actual: &[f64], name: &str) {
        assert_eq!(expected.len(), actual.len(), "{}: length mismatch", name);
        for i in 0..expected.len() {
            assert!(
                (expected[i] - actual[i]).abs() < 1e-8,
                "{}: mismatch at index {}: expected {}, got {}",
                name,
                i,
                expected[i],
                actual[i]
            );
        }
    }
}
