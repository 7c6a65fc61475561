//! Planner tuning constants and epsilons.
//!
//! These are the compiled-in defaults; everything except the lookahead
//! depth (which sizes per-cycle loops) can be overridden through
//! [`PlannerConfig`](super::PlannerConfig).

/// Default segment queue capacity when the caller sizes storage by it.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Maximum number of queued segments considered together when blending.
pub const LOOKAHEAD_DEPTH: usize = 30;

/// Junction velocities below this fraction of the adjacent segments'
/// target velocity are demoted to a full stop at the join.
pub const SMOOTHING_THRESHOLD: f64 = 0.3;

/// Upper bound on the operator feed override scale.
pub const MAX_FEED_SCALE: f64 = 1.00;

/// A segment must span at least this many control cycles at its
/// commanded velocity so it is never skipped between samples.
pub const MIN_SEGMENT_CYCLES: f64 = 2.0;

/// Translation magnitudes below this classify a move as pure rotation.
pub const PURE_ROTATION_EPSILON: f64 = 1e-6;

/// Velocities below this are treated as zero.
pub const VEL_EPSILON: f64 = 1e-6;

/// Accelerations below this are treated as zero.
pub const ACCEL_EPSILON: f64 = 1e-6;

/// Angles below this are treated as zero (tangent junctions).
pub const ANGLE_EPSILON: f64 = 1e-6;

/// Vector magnitudes below this are treated as zero length.
pub const MAG_EPSILON: f64 = 1e-10;

/// Large sentinel standing in for "unbounded".
pub const BIG_NUM: f64 = 1e10;
