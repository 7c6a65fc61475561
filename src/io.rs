//! Output-toggle capability.
//!
//! When a segment becomes the executing head, the cycle executor calls
//! the injected [`OutputToggler`] exactly once with that segment's
//! output schedule. What the toggle does to physical I/O is entirely the
//! backend's business; the planner only guarantees timing and
//! exactly-once delivery.

use crate::segment::OutputSchedule;

/// Backend invoked once per segment activation.
pub trait OutputToggler {
    /// Apply the segment's enable bitmask and scheduled transitions.
    fn toggle(&mut self, outputs: &OutputSchedule);
}

/// Backend that discards all toggles.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutputs;

impl OutputToggler for NullOutputs {
    fn toggle(&mut self, _outputs: &OutputSchedule) {}
}

impl OutputToggler for () {
    fn toggle(&mut self, _outputs: &OutputSchedule) {}
}
