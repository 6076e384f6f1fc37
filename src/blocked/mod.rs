//! Cache-blocking controllers for the large GEVM and GEMM paths.
//!
//! These functions split the iteration space into blocks that fit in
//! L1/L2 cache and walk them in a fixed nesting order, calling the tile
//! kernels from [`crate::kernels`] for the inner computation. Partial sums
//! persist across shared-index blocks in the destination itself.
//!
//! - `gevm`: column blocks sized to a byte budget, then 4 or 8 row blocks
//! - `gemm`: column blocks, then row blocks, then shared-index blocks

pub mod gemm;
pub mod gevm;
