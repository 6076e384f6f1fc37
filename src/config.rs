//! Tuning knobs for the algorithm selector.
//!
//! Thresholds and block sizes are plain data so an embedding library can
//! load them (every field has a serde default) and hand them to the
//! `*_with_config` entry points without rebuilding the kernels.

use serde::{Deserialize, Serialize};

use crate::error::{DenseError, Result};
use crate::simd::SimdLevel;

/// Block sizes of the large GEMM controller, in elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemmBlock {
    /// Output rows per block
    pub rows: usize,
    /// Output columns per block
    pub cols: usize,
    /// Shared-index elements per block
    pub depth: usize,
}

impl Default for GemmBlock {
    fn default() -> Self {
        Self {
            rows: 64,
            cols: 128,
            depth: 128,
        }
    }
}

/// Selector configuration.
///
/// ```
/// use densemul::GemmConfig;
///
/// let config = GemmConfig::default().with_gemm_small_threshold(64 * 64);
/// assert_eq!(config.gemv_small_threshold, 72_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemmConfig {
    /// GEMV uses the small kernel while `M*N` is below this
    pub gemv_small_threshold: usize,
    /// GEVM uses the small kernel while `M*N` is below this
    pub gevm_small_threshold: usize,
    /// GEMM uses the small kernel while the larger operand is below this
    pub gemm_small_threshold: usize,
    /// Byte budget of one column block in the large GEVM kernel
    pub gevm_block_bytes: usize,
    /// Block sizes of the large GEMM kernel
    pub gemm_block: GemmBlock,
    /// Force a vector mode instead of detecting the best one
    pub simd: Option<SimdLevel>,
}

impl Default for GemmConfig {
    fn default() -> Self {
        Self {
            gemv_small_threshold: 72_000,
            gevm_small_threshold: 72_000,
            gemm_small_threshold: 100 * 100,
            gevm_block_bytes: 32 * 1024,
            gemm_block: GemmBlock::default(),
            simd: None,
        }
    }
}

impl GemmConfig {
    pub fn with_gemv_small_threshold(mut self, threshold: usize) -> Self {
        self.gemv_small_threshold = threshold;
        self
    }

    pub fn with_gevm_small_threshold(mut self, threshold: usize) -> Self {
        self.gevm_small_threshold = threshold;
        self
    }

    pub fn with_gemm_small_threshold(mut self, threshold: usize) -> Self {
        self.gemm_small_threshold = threshold;
        self
    }

    pub fn with_gevm_block_bytes(mut self, bytes: usize) -> Self {
        self.gevm_block_bytes = bytes;
        self
    }

    pub fn with_gemm_block(mut self, block: GemmBlock) -> Self {
        self.gemm_block = block;
        self
    }

    pub fn with_simd(mut self, level: SimdLevel) -> Self {
        self.simd = Some(level);
        self
    }

    /// Rejects block sizes that would make the blocked loops stall.
    pub fn validate(&self) -> Result<()> {
        let GemmBlock { rows, cols, depth } = self.gemm_block;
        if rows == 0 || cols == 0 || depth == 0 {
            return Err(DenseError::InvalidConfig(format!(
                "gemm block sizes must be non-zero, got {rows}x{cols}x{depth}"
            )));
        }
        if self.gevm_block_bytes == 0 {
            return Err(DenseError::InvalidConfig(
                "gevm block byte budget must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Vector mode for this call.
    ///
    /// # Panics
    ///
    /// Panics if a forced vector mode is not usable on this machine. This is
    /// a static configuration fault, not a recoverable condition.
    pub fn simd_level(&self) -> SimdLevel {
        match self.simd {
            Some(level) => {
                assert!(
                    level.is_available(),
                    "vector mode {level:?} must be enabled and supported to run the kernels"
                );
                level
            }
            None => SimdLevel::detect(),
        }
    }

    /// Column block of the large GEVM kernel, in elements of `T`.
    ///
    /// Rounded down to a whole number of vectors, never below one vector.
    pub fn gevm_block_elems<T>(&self, lanes: usize) -> usize {
        let elems = (self.gevm_block_bytes / std::mem::size_of::<T>()).max(lanes);
        elems - elems % lanes
    }
}
