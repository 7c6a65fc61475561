//! Motion segments: the unit of work held in the planner queue.
//!
//! A segment is one discrete motion request (line, arc, or rigid tap)
//! reduced to the facets the executor needs: endpoints, path length,
//! effective velocity/acceleration caps, termination policy,
//! synchronization mode, and the output schedule fired at activation.
//! Everything except the executor-owned progress bookkeeping is immutable
//! after enqueue.

use heapless::Vec;

use crate::geometry::{Cartesian, Pose};

/// Maximum number of scheduled digital output commands per segment.
pub const MAX_DIGITAL_COMMANDS: usize = 8;

/// Maximum number of scheduled analog output commands per segment.
pub const MAX_ANALOG_COMMANDS: usize = 4;

/// Kind of motion a segment performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionKind {
    /// Traverse at rapid rate; no cutting.
    Rapid,
    /// Cutting move at programmed feed rate.
    Feed,
    /// Rigid tap cycle; position-synchronized to the spindle.
    Tap,
}

/// How a segment's end joins the next segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TermCond {
    /// Decelerate to a full stop at the segment end.
    Stop,
    /// Blend through the junction, deviating from the programmed path by
    /// at most `tolerance` user units.
    Blend {
        /// Maximum allowed path deviation at the corner.
        tolerance: f64,
    },
}

/// Relationship between path progress and spindle rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncMode {
    /// Time-driven motion; the spindle is ignored.
    None,
    /// Feed velocity follows live spindle speed times `uu_per_rev`.
    Velocity {
        /// User units of path per spindle revolution.
        uu_per_rev: f64,
    },
    /// Path progress is locked 1:1 to spindle revolutions times
    /// `uu_per_rev`; requires an index-pulse phase lock first.
    Position {
        /// User units of path per spindle revolution.
        uu_per_rev: f64,
    },
}

impl SyncMode {
    /// True for either synchronized mode.
    #[inline]
    pub fn is_synchronized(&self) -> bool {
        !matches!(self, SyncMode::None)
    }
}

/// One scheduled digital output transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigitalCommand {
    /// Output index.
    pub index: u8,
    /// Level to assert when the segment activates.
    pub start: bool,
    /// Level to assert when the segment completes.
    pub end: bool,
}

/// One scheduled analog output transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogCommand {
    /// Output index.
    pub index: u8,
    /// Value to write when the segment activates.
    pub start: f64,
    /// Value to write when the segment completes.
    pub end: f64,
}

/// Per-segment output schedule: the enable bitmask plus any digital and
/// analog transitions staged before the segment was enqueued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSchedule {
    /// Enable bitmask associated with the segment.
    pub enables: u8,
    /// Scheduled digital transitions.
    pub digital: Vec<DigitalCommand, MAX_DIGITAL_COMMANDS>,
    /// Scheduled analog transitions.
    pub analog: Vec<AnalogCommand, MAX_ANALOG_COMMANDS>,
}

impl OutputSchedule {
    /// True when there is no bitmask and no scheduled transition.
    pub fn is_empty(&self) -> bool {
        self.enables == 0 && self.digital.is_empty() && self.analog.is_empty()
    }
}

/// One queued motion segment.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Unique ascending id; never reused, even across queue clears.
    pub id: u32,
    /// Kind of motion.
    pub kind: MotionKind,
    /// Pose where the segment begins.
    pub start: Pose,
    /// Pose where the segment ends.
    pub end: Pose,
    /// Path length in user units (degrees for pure rotation).
    pub length: f64,
    /// Requested velocity, already clipped to the machine bounds.
    pub req_vel: f64,
    /// Hard velocity cap for this segment (machine constraint).
    pub max_vel: f64,
    /// Acceleration cap for this segment.
    pub max_acc: f64,
    /// Junction policy with the following segment.
    pub term: TermCond,
    /// Spindle synchronization mode.
    pub sync: SyncMode,
    /// Segment may not start until the spindle reports at-speed.
    pub at_speed: bool,
    /// Rotary axis to be indexed during this move, if any.
    pub index_rotary: Option<u8>,
    /// Unit chord direction of the translation, if the move translates.
    pub unit_dir: Option<Cartesian>,
    /// Move is pure rotation; length and caps are in rotary units.
    pub pure_rotation: bool,
    /// Outputs toggled when this segment activates.
    pub outputs: OutputSchedule,

    // Executor-owned blend bookkeeping.
    /// Path distance consumed so far.
    pub(crate) progress: f64,
    /// Velocity the segment may carry into its end junction.
    pub(crate) final_vel: f64,
    /// Segment has activated (toggles fired, exec id published).
    pub(crate) active: bool,
}

impl Segment {
    /// Path distance not yet consumed.
    #[inline]
    pub fn remaining(&self) -> f64 {
        (self.length - self.progress).max(0.0)
    }

    /// Fraction of the path consumed, in `[0, 1]`.
    #[inline]
    pub fn progress_fraction(&self) -> f64 {
        if self.length <= 0.0 {
            1.0
        } else {
            (self.progress / self.length).clamp(0.0, 1.0)
        }
    }

    /// Pose at the current progress point.
    ///
    /// Exact for lines and taps; circular segments are read out linearly
    /// in progress, since segment geometry is an external concern.
    pub fn point_at_progress(&self) -> Pose {
        Pose::interpolate(self.start, self.end, self.progress_fraction())
    }

    /// True once the full length has been consumed.
    #[inline]
    pub fn is_consumed(&self) -> bool {
        self.progress >= self.length
    }
}
