use crate::element::Element;
use crate::view::{MatrixView, MatrixViewMut, VectorView, VectorViewMut};

/// `c[i] = Σ_k A[i, k] · b[k]`, summed over `k` in order.
///
/// Shapes must already agree (`A` is `c.len() × b.len()`).
pub fn gemv<T: Element>(a: &MatrixView<'_, T>, b: &VectorView<'_, T>, c: &mut VectorViewMut<'_, T>) {
    c.fill(T::ZERO);
    let c = c.as_mut_slice();
    for i in 0..a.rows() {
        for k in 0..a.cols() {
            c[i] += a.get(i, k) * b[k];
        }
    }
}

/// `c[j] = Σ_k a[k] · B[k, j]`, row by row of `B`.
pub fn gevm<T: Element>(a: &VectorView<'_, T>, b: &MatrixView<'_, T>, c: &mut VectorViewMut<'_, T>) {
    c.fill(T::ZERO);
    let c = c.as_mut_slice();
    for k in 0..b.rows() {
        let ak = a[k];
        for j in 0..b.cols() {
            c[j] += ak * b.get(k, j);
        }
    }
}

/// i-k-j triple loop into a zeroed destination.
///
/// The nesting order fixes the summation order, so every layout
/// combination gives the same bits.
pub fn gemm<T: Element>(a: &MatrixView<'_, T>, b: &MatrixView<'_, T>, c: &mut MatrixViewMut<'_, T>) {
    c.fill(T::ZERO);
    for i in 0..a.rows() {
        for p in 0..a.cols() {
            let aip = a.get(i, p);
            for j in 0..b.cols() {
                let value = c.get(i, j) + aip * b.get(p, j);
                c.set(i, j, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::transpose::transpose;
    use crate::view::Layout;

    #[test]
    fn test_gemv_column_major() {
        // [[1, 2, 3], [4, 5, 6]] stored by columns
        let a = [1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
        let b = [7.0, 8.0, 9.0];
        let mut c = [f64::NAN; 2];

        gemv(
            &MatrixView::with_layout(&a, 2, 3, Layout::ColumnMajor),
            &VectorView::new(&b),
            &mut VectorViewMut::new(&mut c),
        );

        assert_eq!(c, [50.0, 122.0]);
    }

    #[test]
    fn test_gevm_is_gemv_of_transpose() {
        let b = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // 2x3
        let a = [2.0, -1.0];
        let mut c = [0.0; 3];
        gevm(&VectorView::new(&a), &MatrixView::new(&b, 2, 3), &mut VectorViewMut::new(&mut c));

        let mut bt = [0.0; 6];
        transpose(&b, &mut bt, 2, 3);
        let mut expected = [0.0; 3];
        gemv(
            &MatrixView::new(&bt, 3, 2),
            &VectorView::new(&a),
            &mut VectorViewMut::new(&mut expected),
        );

        assert_eq!(c, [-2.0, -1.0, 0.0]);
        assert_eq!(c, expected);
    }

    #[test]
    fn test_gemm_mixed_layouts_agree() {
        let (m, n, k) = (3, 4, 5);
        let a: Vec<f64> = (0..m * k).map(|x| x as f64 * 0.5 - 2.0).collect();
        let b: Vec<f64> = (0..k * n).map(|x| (x % 7) as f64).collect();
        let mut a_col = vec![0.0; m * k];
        transpose(&a, &mut a_col, m, k);

        let mut row = vec![0.0; m * n];
        gemm(
            &MatrixView::new(&a, m, k),
            &MatrixView::new(&b, k, n),
            &mut MatrixViewMut::new(&mut row, m, n),
        );

        let mut mixed = vec![0.0; m * n];
        gemm(
            &MatrixView::with_layout(&a_col, m, k, Layout::ColumnMajor),
            &MatrixView::new(&b, k, n),
            &mut MatrixViewMut::with_layout(&mut mixed, m, n, Layout::ColumnMajor),
        );
        let mut mixed_row = vec![0.0; m * n];
        transpose(&mixed, &mut mixed_row, n, m);

        assert_eq!(row, mixed_row);
    }
}
