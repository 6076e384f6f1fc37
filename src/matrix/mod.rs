//! Layout-agnostic scalar loops.
//!
//! The selector falls back to these when any matrix operand is not
//! row-major. They index through [`MatrixView::get`](crate::MatrixView::get)
//! and sum in natural index order, so the result does not depend on the
//! layout. The `transpose` helper converts between the two layouts.

pub mod naive;
pub mod transpose;
