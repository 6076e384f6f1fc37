//! Freshness hand-off with an embedding library that mirrors buffers on an
//! accelerator.
//!
//! The core only reads and writes host memory. A caller that keeps device
//! copies syncs the operands to the host before a call and, after the call,
//! marks the destination's device copy stale through [`Dispatch::notify`].

use tracing::trace;

use crate::dispatch::{KernelPath, Operation};
use crate::simd::SimdLevel;

/// Host/device freshness hooks for one buffer.
pub trait DeviceResidency {
    /// Copy the device version back if it is newer than the host one.
    fn ensure_host_up_to_date(&self);

    /// The host copy was written; the device copy is now stale.
    fn invalidate_device_copy(&self);
}

/// Buffers that only live in host memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostOnly;

impl DeviceResidency for HostOnly {
    fn ensure_host_up_to_date(&self) {}

    fn invalidate_device_copy(&self) {}
}

/// Brings every operand's host copy up to date.
pub fn sync_operands(operands: &[&dyn DeviceResidency]) {
    for operand in operands {
        operand.ensure_host_up_to_date();
    }
}

/// What one call did.
///
/// Returned by the entry points; pass the destination's residency handle to
/// [`notify`](Dispatch::notify) so a device copy is not used after the host
/// copy changed.
#[must_use = "the destination's device copy is stale until `notify` is called"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    op: Operation,
    path: KernelPath,
    level: Option<SimdLevel>,
}

impl Dispatch {
    pub(crate) fn new(op: Operation, path: KernelPath, level: Option<SimdLevel>) -> Self {
        Self { op, path, level }
    }

    pub fn operation(&self) -> Operation {
        self.op
    }

    pub fn path(&self) -> KernelPath {
        self.path
    }

    /// Vector backend used, `None` on the naive path.
    pub fn simd_level(&self) -> Option<SimdLevel> {
        self.level
    }

    /// Marks the destination's device copy stale.
    ///
    /// Every path overwrites the destination, so this always invalidates.
    pub fn notify<R: DeviceResidency + ?Sized>(self, destination: &R) {
        trace!(op = %self.op, path = ?self.path, "invalidating device copy of destination");
        destination.invalidate_device_copy();
    }
}
