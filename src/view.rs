//! Non-owning dense views over caller buffers.
//!
//! A view is built right before a call and dropped right after. It borrows
//! the buffer, so the buffer outlives the call and a mutable destination
//! can never alias a source operand.
//!
//! # Padding
//!
//! A padded view guarantees readable elements past its logical trailing
//! dimension, up to the next multiple of [`PADDING_LANES`]. A padded matrix
//! is padded after its last row (or column) only. GEMV may then run whole
//! vectors over the tail of the final row instead of a scalar remainder
//! loop. Pads must be zero so the extra products vanish; a non-finite pad
//! would turn them into NaN.

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::{DenseError, Result};

/// Padding granularity in elements: the widest register (16 × f32).
pub const PADDING_LANES: usize = 16;

/// Length rounded up to the padding granularity.
pub fn padded_len(len: usize) -> usize {
    len.next_multiple_of(PADDING_LANES)
}

/// Storage order of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Layout {
    /// Consecutive elements are consecutive columns (`i * cols + j`)
    #[default]
    RowMajor,
    /// Consecutive elements are consecutive rows (`j * rows + i`)
    ColumnMajor,
}

impl Layout {
    #[inline]
    fn offset(self, rows: usize, cols: usize, i: usize, j: usize) -> usize {
        match self {
            Layout::RowMajor => i * cols + j,
            Layout::ColumnMajor => j * rows + i,
        }
    }
}

/// Elements a matrix buffer must hold.
fn matrix_extent(rows: usize, cols: usize, layout: Layout, padded: bool) -> usize {
    let len = rows * cols;
    if !padded || len == 0 {
        return len;
    }
    let trailing = match layout {
        Layout::RowMajor => cols,
        Layout::ColumnMajor => rows,
    };
    len - trailing + padded_len(trailing)
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if actual < expected {
        return Err(DenseError::BufferTooSmall { expected, actual });
    }
    Ok(())
}

fn check_zero_pad<T: Element>(data: &[T], from: usize, to: usize) -> Result<()> {
    match data[from..to].iter().position(|&x| x != T::ZERO) {
        Some(offset) => Err(DenseError::DirtyPadding { index: from + offset }),
        None => Ok(()),
    }
}

fn unwrap_view<V>(view: Result<V>) -> V {
    match view {
        Ok(view) => view,
        Err(err) => panic!("{err}"),
    }
}

/// Read-only vector operand.
#[derive(Debug, Clone, Copy)]
pub struct VectorView<'a, T> {
    data: &'a [T],
    len: usize,
    padded: bool,
}

impl<'a, T: Element> VectorView<'a, T> {
    /// Views the whole slice.
    pub fn new(data: &'a [T]) -> Self {
        Self {
            data,
            len: data.len(),
            padded: false,
        }
    }

    /// Views `len` elements of a slice that also holds a zero pad.
    ///
    /// # Panics
    ///
    /// Panics if the slice is too short or the pad is not zero.
    pub fn padded(data: &'a [T], len: usize) -> Self {
        unwrap_view(Self::try_padded(data, len))
    }

    pub fn try_padded(data: &'a [T], len: usize) -> Result<Self> {
        check_len(padded_len(len), data.len())?;
        check_zero_pad(data, len, padded_len(len))?;
        Ok(Self {
            data,
            len,
            padded: true,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_padded(&self) -> bool {
        self.padded
    }

    /// Logical elements only
    pub fn as_slice(&self) -> &'a [T] {
        &self.data[..self.len]
    }

    /// Logical elements plus padding
    pub fn storage(&self) -> &'a [T] {
        self.data
    }

    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }
}

impl<T> std::ops::Index<usize> for VectorView<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[..self.len][index]
    }
}

/// Destination vector.
#[derive(Debug)]
pub struct VectorViewMut<'a, T> {
    data: &'a mut [T],
    len: usize,
    padded: bool,
}

impl<'a, T: Element> VectorViewMut<'a, T> {
    pub fn new(data: &'a mut [T]) -> Self {
        let len = data.len();
        Self {
            data,
            len,
            padded: false,
        }
    }

    /// Views `len` elements of a slice holding at least `padded_len(len)`.
    ///
    /// # Panics
    ///
    /// Panics if the slice is too short.
    pub fn padded(data: &'a mut [T], len: usize) -> Self {
        unwrap_view(Self::try_padded(data, len))
    }

    pub fn try_padded(data: &'a mut [T], len: usize) -> Result<Self> {
        check_len(padded_len(len), data.len())?;
        Ok(Self {
            data,
            len,
            padded: true,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_padded(&self) -> bool {
        self.padded
    }

    /// Sets every logical element; padding is left alone.
    pub fn fill(&mut self, value: T) {
        self.data[..self.len].fill(value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data[..self.len]
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }
}

impl<T> std::ops::Index<usize> for VectorViewMut<'_, T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[..self.len][index]
    }
}

impl<T> std::ops::IndexMut<usize> for VectorViewMut<'_, T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[..self.len][index]
    }
}

/// Read-only matrix operand.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
    layout: Layout,
    padded: bool,
}

impl<'a, T: Element> MatrixView<'a, T> {
    /// Row-major `rows × cols` view.
    ///
    /// # Panics
    ///
    /// Panics if `data` holds fewer than `rows * cols` elements.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Self::with_layout(data, rows, cols, Layout::RowMajor)
    }

    pub fn with_layout(data: &'a [T], rows: usize, cols: usize, layout: Layout) -> Self {
        unwrap_view(Self::try_new(data, rows, cols, layout))
    }

    pub fn try_new(data: &'a [T], rows: usize, cols: usize, layout: Layout) -> Result<Self> {
        check_len(matrix_extent(rows, cols, layout, false), data.len())?;
        Ok(Self {
            data,
            rows,
            cols,
            layout,
            padded: false,
        })
    }

    /// Row-major view whose last row is followed by a zero pad out to
    /// `padded_len(cols)` elements.
    ///
    /// # Panics
    ///
    /// Panics if the slice is too short or the pad is not zero.
    pub fn padded(data: &'a [T], rows: usize, cols: usize) -> Self {
        unwrap_view(Self::try_padded(data, rows, cols, Layout::RowMajor))
    }

    pub fn try_padded(data: &'a [T], rows: usize, cols: usize, layout: Layout) -> Result<Self> {
        let extent = matrix_extent(rows, cols, layout, true);
        check_len(extent, data.len())?;
        check_zero_pad(data, rows * cols, extent)?;
        Ok(Self {
            data,
            rows,
            cols,
            layout,
            padded: true,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Logical element count
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn is_padded(&self) -> bool {
        self.padded
    }

    /// Element `(i, j)` through the layout.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[self.layout.offset(self.rows, self.cols, i, j)]
    }

    /// Backing slice, padding included
    pub fn storage(&self) -> &'a [T] {
        self.data
    }

    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }

    /// The transpose, as a view of the same buffer with the other layout.
    pub fn transposed(&self) -> MatrixView<'a, T> {
        MatrixView {
            data: self.data,
            rows: self.cols,
            cols: self.rows,
            layout: match self.layout {
                Layout::RowMajor => Layout::ColumnMajor,
                Layout::ColumnMajor => Layout::RowMajor,
            },
            padded: false,
        }
    }
}

/// Destination matrix.
#[derive(Debug)]
pub struct MatrixViewMut<'a, T> {
    data: &'a mut [T],
    rows: usize,
    cols: usize,
    layout: Layout,
}

impl<'a, T: Element> MatrixViewMut<'a, T> {
    /// Row-major `rows × cols` destination.
    ///
    /// # Panics
    ///
    /// Panics if `data` holds fewer than `rows * cols` elements.
    pub fn new(data: &'a mut [T], rows: usize, cols: usize) -> Self {
        Self::with_layout(data, rows, cols, Layout::RowMajor)
    }

    pub fn with_layout(data: &'a mut [T], rows: usize, cols: usize, layout: Layout) -> Self {
        unwrap_view(Self::try_new(data, rows, cols, layout))
    }

    pub fn try_new(data: &'a mut [T], rows: usize, cols: usize, layout: Layout) -> Result<Self> {
        check_len(rows * cols, data.len())?;
        Ok(Self {
            data,
            rows,
            cols,
            layout,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[self.layout.offset(self.rows, self.cols, i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        let offset = self.layout.offset(self.rows, self.cols, i, j);
        self.data[offset] = value;
    }

    pub fn fill(&mut self, value: T) {
        let len = self.len();
        self.data[..len].fill(value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.rows * self.cols]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len();
        &mut self.data[..len]
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 16);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(17), 32);
    }

    #[test]
    fn test_layout_indexing() {
        // 2×3: [[1, 2, 3], [4, 5, 6]]
        let row_major = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let col_major = [1.0, 4.0, 2.0, 5.0, 3.0, 6.0];

        let a = MatrixView::new(&row_major, 2, 3);
        let b = MatrixView::with_layout(&col_major, 2, 3, Layout::ColumnMajor);

        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(a.get(i, j), b.get(i, j));
            }
        }
    }

    #[test]
    fn test_transposed_view() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let a = MatrixView::new(&data, 2, 3);
        let at = a.transposed();

        assert_eq!((at.rows(), at.cols()), (3, 2));
        assert_eq!(at.layout(), Layout::ColumnMajor);
        assert_eq!(at.get(2, 1), 6.0);
        assert_eq!(at.get(0, 1), 4.0);
    }

    #[test]
    fn test_too_small_buffer() {
        let data = [0.0f32; 5];
        assert_eq!(
            MatrixView::try_new(&data, 2, 3, Layout::RowMajor).unwrap_err(),
            DenseError::BufferTooSmall {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn test_padded_matrix_extent() {
        // 3 rows of 5, last row padded out to 16
        let mut data = vec![0.0f64; 2 * 5 + 16];
        data[..15].fill(1.0);
        assert!(MatrixView::try_padded(&data, 3, 5, Layout::RowMajor).is_ok());
        assert!(MatrixView::try_padded(&data[..25], 3, 5, Layout::RowMajor).is_err());

        data[20] = f64::INFINITY;
        assert_eq!(
            MatrixView::try_padded(&data, 3, 5, Layout::RowMajor).unwrap_err(),
            DenseError::DirtyPadding { index: 20 }
        );
    }

    #[test]
    fn test_padded_vector_requires_zero_tail() {
        let mut data = vec![0.0f64; 16];
        data[..5].fill(1.0);
        let view = VectorView::try_padded(&data, 5).unwrap();
        assert_eq!(view.len(), 5);
        assert_eq!(view.as_slice(), &[1.0; 5]);
        assert_eq!(view.storage().len(), 16);

        data[11] = 3.0;
        assert_eq!(
            VectorView::try_padded(&data, 5).unwrap_err(),
            DenseError::DirtyPadding { index: 11 }
        );
    }

    #[test]
    #[should_panic(expected = "Buffer too small")]
    fn test_new_panics_on_short_buffer() {
        let data = [0.0f64; 3];
        let _ = MatrixView::new(&data, 2, 2);
    }

    #[test]
    fn test_mut_view_fill_keeps_padding() {
        let mut data = vec![7.0f32; 16];
        let mut view = VectorViewMut::padded(&mut data, 3);
        view.fill(0.0);
        view[1] = 2.0;
        assert_eq!(view.as_slice(), &[0.0, 2.0, 0.0]);
        assert_eq!(data[3], 7.0);
    }
}
