//! Spindle state for synchronized motion.
//!
//! The planner never talks to encoder hardware. The integrator samples
//! the spindle once per control period and hands the snapshot to
//! [`Planner::update_spindle`](crate::planner::Planner::update_spindle);
//! the cycle executor then derives the allowed feed velocity (velocity
//! mode) or the target path progress (position mode) from it.

/// Live spindle sample provided by the integrator each cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpindleFeedback {
    /// Signed rotational speed in revolutions per second.
    pub speed_rps: f64,
    /// Accumulated spindle position in revolutions.
    pub position_revs: f64,
    /// Spindle has reached its commanded speed.
    pub at_speed: bool,
    /// Index pulse observed since the last sample.
    pub index_pulse: bool,
}

/// Persistent spindle bookkeeping owned by the planner.
///
/// `offset` is the revolution count latched at the index pulse that
/// fixed absolute phase; `revs` mirrors the last feedback sample. The
/// wait flags are stall states, not errors, and are externally
/// observable through the planner's accessor.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpindleStatus {
    /// Revolution count at the phase-locking index pulse.
    pub offset: f64,
    /// Spindle revolutions at the last feedback sample.
    pub revs: f64,
    /// Holding at zero velocity until an index pulse fixes phase.
    pub waiting_for_index: bool,
    /// Holding at zero velocity until the spindle is at speed.
    pub waiting_for_atspeed: bool,
}

impl SpindleStatus {
    /// True while either wait condition is stalling motion.
    #[inline]
    pub fn is_waiting(&self) -> bool {
        self.waiting_for_index || self.waiting_for_atspeed
    }

    /// Revolutions of synchronized progress since the phase lock.
    #[inline]
    pub fn revs_since_lock(&self) -> f64 {
        self.revs - self.offset
    }
}

/// Feed velocity derived from live spindle speed in velocity mode.
///
/// The sign of the spindle speed is ignored; the planner only ever
/// advances along the programmed path.
#[inline]
pub(crate) fn velocity_for(uu_per_rev: f64, feedback: &SpindleFeedback) -> f64 {
    libm::fabs(feedback.speed_rps) * uu_per_rev
}

/// Target path progress since phase lock in position mode.
#[inline]
pub(crate) fn progress_for(uu_per_rev: f64, status: &SpindleStatus) -> f64 {
    (status.revs_since_lock() * uu_per_rev).max(0.0)
}
