//! Trajectory planner state, segment builders, and control operations.
//!
//! The [`Planner`] owns the bounded segment queue (over caller-supplied
//! storage) and all machine-wide kinematic state. Motion requests enter
//! through the builders ([`add_line`](Planner::add_line),
//! [`add_circle`](Planner::add_circle),
//! [`add_rigid_tap`](Planner::add_rigid_tap)); execution advances one
//! control period at a time through
//! [`run_cycle`](Planner::run_cycle) in [`cycle`].

mod cycle;

use libm::{atan2, sqrt};

use crate::config::constants::{
    ANGLE_EPSILON, BIG_NUM, MAG_EPSILON, MAX_FEED_SCALE, MIN_SEGMENT_CYCLES, PURE_ROTATION_EPSILON,
    SMOOTHING_THRESHOLD, VEL_EPSILON,
};
use crate::config::PlannerConfig;
use crate::error::{ConfigError, Error, MotionError, QueueError, Result, Status};
use crate::geometry::{Cartesian, Pose};
use crate::queue::SegmentQueue;
use crate::segment::{
    AnalogCommand, DigitalCommand, MotionKind, OutputSchedule, Segment, SyncMode, TermCond,
};
use crate::spindle::{SpindleFeedback, SpindleStatus};

pub(crate) const TWO_PI: f64 = 2.0 * core::f64::consts::PI;

/// Execution state of the planner as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionState {
    /// Queue empty, velocity zero.
    Idle,
    /// At least one segment is executing or blending.
    Running,
    /// Decelerating toward a hold after a pause request.
    Pausing,
    /// Held at zero velocity; blend state preserved.
    Paused,
    /// Decelerating toward zero before discarding the queue.
    Aborting,
}

/// Outcome of a successful builder call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddResult {
    /// Segment enqueued under this id.
    Queued(u32),
    /// Start and end coincide; nothing was enqueued and the caller
    /// should drop the originating command.
    Degenerate,
}

impl From<AddResult> for Status {
    fn from(r: AddResult) -> Self {
        match r {
            AddResult::Queued(_) => Status::Ok,
            AddResult::Degenerate => Status::RemoveLast,
        }
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleStatus {
    /// The cycle ran: motion advanced, stalled on a wait state, or
    /// ramped toward a pause/abort hold.
    Active,
    /// Nothing queued and nothing to do.
    Idle,
}

impl From<CycleStatus> for Status {
    fn from(s: CycleStatus) -> Self {
        match s {
            CycleStatus::Active => Status::Ok,
            CycleStatus::Idle => Status::NoAction,
        }
    }
}

/// Spindle-sync arming staged for subsequent motions.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SyncArm {
    uu_per_rev: f64,
    wait_for_index: bool,
}

/// The trajectory planner.
///
/// Single-writer by construction: `run_cycle` takes `&mut self`, so the
/// borrow checker guarantees no accessor observes a half-advanced cycle.
/// Sharing across tasks is the integrator's choice of cell or mutex; the
/// planner itself never blocks and never allocates.
#[derive(Debug)]
pub struct Planner<'a> {
    queue: SegmentQueue<'a>,

    // Configured bounds; survive init/clear.
    cycle_time: f64,
    v_max: f64,
    ini_max_vel: f64,
    a_max: f64,
    v_limit: f64,
    w_max: f64,
    w_dot_max: f64,
    max_feed_scale: f64,
    min_segment_cycles: f64,
    smoothing_threshold: f64,

    // Runtime state.
    v_scale: f64,
    next_id: u32,
    exec_id: Option<u32>,
    term: TermCond,
    current_pos: Pose,
    goal_pos: Pose,
    done: bool,
    motion: MotionState,
    motion_type: Option<MotionKind>,
    active_depth: usize,
    current_vel: f64,
    sync_arm: Option<SyncArm>,
    pending_outputs: OutputSchedule,
    spindle: SpindleStatus,
    feedback: SpindleFeedback,
    index_locked: bool,
}

impl<'a> Planner<'a> {
    /// Create a planner over caller-supplied queue storage.
    ///
    /// The storage slice fixes the queue capacity for the planner's
    /// lifetime. Kinematic bounds default to unbounded and the cycle
    /// time is unset; motion cannot be queued until
    /// [`set_cycle_time`](Self::set_cycle_time) is called.
    pub fn new(storage: &'a mut [Option<Segment>]) -> Result<Self> {
        let queue = SegmentQueue::new(storage)?;
        Ok(Self {
            queue,
            cycle_time: 0.0,
            v_max: BIG_NUM,
            ini_max_vel: BIG_NUM,
            a_max: BIG_NUM,
            v_limit: BIG_NUM,
            w_max: BIG_NUM,
            w_dot_max: BIG_NUM,
            max_feed_scale: MAX_FEED_SCALE,
            min_segment_cycles: MIN_SEGMENT_CYCLES,
            smoothing_threshold: SMOOTHING_THRESHOLD,
            v_scale: 1.0,
            next_id: 0,
            exec_id: None,
            term: TermCond::Stop,
            current_pos: Pose::default(),
            goal_pos: Pose::default(),
            done: true,
            motion: MotionState::Idle,
            motion_type: None,
            active_depth: 0,
            current_vel: 0.0,
            sync_arm: None,
            pending_outputs: OutputSchedule::default(),
            spindle: SpindleStatus::default(),
            feedback: SpindleFeedback::default(),
            index_locked: false,
        })
    }

    /// Create a planner with bounds and timing taken from a validated
    /// configuration.
    pub fn with_config(storage: &'a mut [Option<Segment>], config: &PlannerConfig) -> Result<Self> {
        crate::config::validate_config(config)?;
        let mut planner = Self::new(storage)?;
        planner.cycle_time = config.cycle_time;
        planner.v_max = config.limits.v_max;
        planner.ini_max_vel = config.limits.ini_max_vel;
        planner.a_max = config.limits.a_max;
        planner.v_limit = config.limits.v_limit;
        planner.w_max = config.limits.w_max;
        planner.w_dot_max = config.limits.w_dot_max;
        planner.max_feed_scale = config.max_feed_scale;
        planner.min_segment_cycles = config.min_segment_cycles;
        planner.smoothing_threshold = config.smoothing_threshold;
        Ok(planner)
    }

    /// Empty the queue and return to the stopped, non-synchronized
    /// state.
    ///
    /// Configured bounds and the id counter are preserved; the goal pose
    /// collapses onto the current pose.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.goal_pos = self.current_pos;
        self.done = true;
        self.motion = MotionState::Idle;
        self.motion_type = None;
        self.active_depth = 0;
        self.current_vel = 0.0;
        self.exec_id = None;
        self.sync_arm = None;
        self.pending_outputs = OutputSchedule::default();
        self.spindle.waiting_for_index = false;
        self.spindle.waiting_for_atspeed = false;
        self.index_locked = false;
    }

    /// Reset to the initial state: empty queue, zero velocity, origin
    /// pose, unit feed override, exact-stop termination, no spindle
    /// sync. Configured bounds and the id counter are preserved.
    pub fn init(&mut self) {
        self.clear();
        self.current_pos = Pose::default();
        self.goal_pos = Pose::default();
        self.v_scale = 1.0;
        self.term = TermCond::Stop;
        self.spindle = SpindleStatus::default();
        self.feedback = SpindleFeedback::default();
    }

    // ── Configuration setters ──────────────────────────────────────

    /// Set the control period in seconds.
    pub fn set_cycle_time(&mut self, secs: f64) -> Result<()> {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidCycleTime(secs)));
        }
        self.cycle_time = secs;
        Ok(())
    }

    /// Set the velocity bound for subsequent moves and the machine
    /// velocity ceiling.
    pub fn set_vmax(&mut self, vmax: f64, ini_maxvel: f64) -> Result<()> {
        if !vmax.is_finite() || vmax <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidMaxVelocity(vmax)));
        }
        if !ini_maxvel.is_finite() || ini_maxvel <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidMaxVelocity(ini_maxvel)));
        }
        self.v_max = vmax;
        self.ini_max_vel = ini_maxvel;
        Ok(())
    }

    /// Set the absolute velocity ceiling no override can exceed.
    pub fn set_vlimit(&mut self, limit: f64) -> Result<()> {
        if !limit.is_finite() || limit <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidVelocityLimit(limit)));
        }
        self.v_limit = limit;
        Ok(())
    }

    /// Set the acceleration bound for subsequent moves.
    pub fn set_amax(&mut self, amax: f64) -> Result<()> {
        if !amax.is_finite() || amax <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidMaxAcceleration(amax)));
        }
        self.a_max = amax;
        Ok(())
    }

    /// Set the rotary velocity and acceleration bounds used by
    /// pure-rotation moves.
    pub fn set_rotary_limits(&mut self, w_max: f64, w_dot_max: f64) -> Result<()> {
        if !w_max.is_finite() || w_max <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidRotaryLimit(w_max)));
        }
        if !w_dot_max.is_finite() || w_dot_max <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidRotaryLimit(w_dot_max)));
        }
        self.w_max = w_max;
        self.w_dot_max = w_dot_max;
        Ok(())
    }

    /// Set the id that the next enqueued segment will receive.
    pub fn set_id(&mut self, id: u32) {
        self.next_id = id;
    }

    /// Set the operator feed override, clamped to
    /// `[0, max_feed_scale]`. Synchronized motion ignores the override.
    pub fn set_feed_override(&mut self, scale: f64) {
        if scale.is_finite() {
            self.v_scale = scale.clamp(0.0, self.max_feed_scale);
        }
    }

    /// Configure the blend policy applied at the junction between the
    /// *next* enqueued segment and its predecessor.
    pub fn set_term_cond(&mut self, term: TermCond) -> Result<()> {
        if let TermCond::Blend { tolerance } = term {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(Error::Config(ConfigError::InvalidTolerance(tolerance)));
            }
        }
        self.term = term;
        Ok(())
    }

    /// Teleport the planner to `pos`.
    ///
    /// Only honored while the queue is empty and velocity is zero;
    /// anything else would be an instantaneous position jump.
    pub fn set_pos(&mut self, pos: Pose) -> Result<()> {
        if !self.queue.is_empty() || self.current_vel.abs() >= VEL_EPSILON {
            return Err(Error::Motion(MotionError::Busy));
        }
        self.current_pos = pos;
        self.goal_pos = pos;
        Ok(())
    }

    /// Arm or disarm spindle-synchronized motion for subsequent moves.
    ///
    /// `uu_per_rev == 0` disarms. `wait_for_index` selects position
    /// mode (progress locked to spindle revolutions, phase fixed at the
    /// index pulse); otherwise velocity mode (feed follows live spindle
    /// speed).
    pub fn set_spindle_sync(&mut self, uu_per_rev: f64, wait_for_index: bool) {
        if uu_per_rev.abs() < MAG_EPSILON || !uu_per_rev.is_finite() {
            self.sync_arm = None;
        } else {
            self.sync_arm = Some(SyncArm {
                uu_per_rev: uu_per_rev.abs(),
                wait_for_index,
            });
        }
    }

    /// Feed the latest spindle encoder sample to the planner. Call once
    /// per control period, before [`run_cycle`](Self::run_cycle).
    pub fn update_spindle(&mut self, feedback: SpindleFeedback) {
        self.feedback = feedback;
        self.spindle.revs = feedback.position_revs;
    }

    /// Schedule a digital output transition on the next enqueued
    /// segment.
    pub fn set_dout(&mut self, index: u8, start: bool, end: bool) -> Result<()> {
        self.pending_outputs
            .digital
            .push(DigitalCommand { index, start, end })
            .map_err(|_| Error::Queue(QueueError::OutputScheduleFull))
    }

    /// Schedule an analog output transition on the next enqueued
    /// segment.
    pub fn set_aout(&mut self, index: u8, start: f64, end: f64) -> Result<()> {
        self.pending_outputs
            .analog
            .push(AnalogCommand { index, start, end })
            .map_err(|_| Error::Queue(QueueError::OutputScheduleFull))
    }

    // ── Segment builders ───────────────────────────────────────────

    /// Enqueue a straight-line move ending at `end`.
    ///
    /// `vel`/`acc` are the programmed rates; `ini_maxvel` is the
    /// machine-constraint ceiling for this particular move. The
    /// effective caps are the minimum of the request and the planner's
    /// configured bounds. A move whose start and end coincide is a
    /// distinguished non-error ([`AddResult::Degenerate`]).
    #[allow(clippy::too_many_arguments)]
    pub fn add_line(
        &mut self,
        end: Pose,
        kind: MotionKind,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        enables: u8,
        at_speed: bool,
        index_rotary: Option<u8>,
    ) -> Result<AddResult> {
        self.ensure_configured()?;
        validate_rates(vel, acc)?;

        let start = self.goal_pos;
        let displacement = end - start;
        let trans = displacement.translation().magnitude();
        let rot = displacement.rotation_magnitude();

        if trans < MAG_EPSILON && rot < ANGLE_EPSILON {
            return Ok(AddResult::Degenerate);
        }

        let pure_rotation = trans < PURE_ROTATION_EPSILON;
        let length = if pure_rotation { rot } else { trans };
        let unit_dir = if pure_rotation {
            None
        } else {
            displacement.translation().unit()
        };

        let sync = self.armed_sync();
        self.push_segment(SegmentRequest {
            kind,
            start,
            end,
            length,
            unit_dir,
            pure_rotation,
            vel,
            ini_maxvel,
            acc,
            sync,
            term: self.term,
            at_speed,
            index_rotary,
            enables,
        })
    }

    /// Enqueue a circular or helical move.
    ///
    /// `center` and `normal` define the circle plane; `turn` counts
    /// additional full revolutions beyond the base arc (its sign picks
    /// the rotation direction). Geometry beyond arc length is an
    /// external concern; the builder only needs the length and the
    /// endpoints to schedule the move.
    #[allow(clippy::too_many_arguments)]
    pub fn add_circle(
        &mut self,
        end: Pose,
        center: Cartesian,
        normal: Cartesian,
        turn: i32,
        kind: MotionKind,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        enables: u8,
        at_speed: bool,
    ) -> Result<AddResult> {
        self.ensure_configured()?;
        validate_rates(vel, acc)?;

        let start = self.goal_pos;
        let length = circle_length(start, end, center, normal, turn);
        if length < MAG_EPSILON {
            return Ok(AddResult::Degenerate);
        }

        // Chord direction approximates the junction tangent; a closed
        // circle has no chord and blends as a full stop.
        let unit_dir = (end - start).translation().unit();

        let sync = self.armed_sync();
        self.push_segment(SegmentRequest {
            kind,
            start,
            end,
            length,
            unit_dir,
            pure_rotation: false,
            vel,
            ini_maxvel,
            acc,
            sync,
            term: self.term,
            at_speed,
            index_rotary: None,
            enables,
        })
    }

    /// Enqueue a rigid-tap cycle ending at `end`.
    ///
    /// Requires spindle synchronization to be armed; the tap always
    /// runs position-synchronized at the armed `uu_per_rev` (the thread
    /// pitch), waits for the spindle to be at speed, and terminates with
    /// an exact stop.
    pub fn add_rigid_tap(
        &mut self,
        end: Pose,
        vel: f64,
        ini_maxvel: f64,
        acc: f64,
        enables: u8,
    ) -> Result<AddResult> {
        self.ensure_configured()?;
        validate_rates(vel, acc)?;

        let uu_per_rev = match self.sync_arm {
            Some(arm) => arm.uu_per_rev,
            None => return Err(Error::Motion(MotionError::SyncNotArmed)),
        };

        let start = self.goal_pos;
        let trans = (end - start).translation().magnitude();
        if trans < MAG_EPSILON {
            return Ok(AddResult::Degenerate);
        }

        self.push_segment(SegmentRequest {
            kind: MotionKind::Tap,
            start,
            end,
            length: trans,
            unit_dir: (end - start).translation().unit(),
            pure_rotation: false,
            vel,
            ini_maxvel,
            acc,
            sync: SyncMode::Position { uu_per_rev },
            term: TermCond::Stop,
            at_speed: true,
            index_rotary: None,
            enables,
        })
    }

    // ── Control operations ─────────────────────────────────────────

    /// Request a pause. Idempotent; consumed by the next cycle, which
    /// decelerates to a hold without discarding anything. A planner with
    /// nothing queued and nothing moving stays `Idle`.
    pub fn pause(&mut self) {
        self.motion = match self.motion {
            MotionState::Aborting => MotionState::Aborting,
            MotionState::Paused => MotionState::Paused,
            _ if self.queue.is_empty() && self.current_vel.abs() < VEL_EPSILON => {
                MotionState::Idle
            }
            _ => MotionState::Pausing,
        };
    }

    /// Release a pause. The next cycle resumes acceleration from the
    /// preserved blend state.
    pub fn resume(&mut self) {
        if matches!(self.motion, MotionState::Pausing | MotionState::Paused) {
            self.motion = if self.queue.is_empty() {
                MotionState::Idle
            } else {
                MotionState::Running
            };
        }
    }

    /// Request an abort: bounded deceleration to zero, then the queue
    /// is discarded. Always succeeds; idempotent.
    pub fn abort(&mut self) {
        self.motion = MotionState::Aborting;
    }

    // ── Read accessors ─────────────────────────────────────────────

    /// Current machine pose.
    #[inline]
    pub fn position(&self) -> Pose {
        self.current_pos
    }

    /// End pose of the last enqueued segment.
    #[inline]
    pub fn goal_position(&self) -> Pose {
        self.goal_pos
    }

    /// True when the queue is empty and velocity is zero.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of queued segments.
    #[inline]
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Number of segments in the current blending window.
    #[inline]
    pub fn active_depth(&self) -> usize {
        self.active_depth
    }

    /// Queue capacity fixed at creation.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Kind of the motion currently executing.
    #[inline]
    pub fn motion_type(&self) -> Option<MotionKind> {
        self.motion_type
    }

    /// Id of the segment currently executing.
    #[inline]
    pub fn exec_id(&self) -> Option<u32> {
        self.exec_id
    }

    /// Current execution state.
    #[inline]
    pub fn motion_state(&self) -> MotionState {
        self.motion
    }

    /// Current scalar path velocity.
    #[inline]
    pub fn current_velocity(&self) -> f64 {
        self.current_vel
    }

    /// Current feed override scale.
    #[inline]
    pub fn feed_override(&self) -> f64 {
        self.v_scale
    }

    /// Spindle bookkeeping, including the externally observable wait
    /// flags.
    #[inline]
    pub fn spindle_status(&self) -> SpindleStatus {
        self.spindle
    }

    // ── Internals ──────────────────────────────────────────────────

    fn ensure_configured(&self) -> Result<()> {
        if self.cycle_time <= 0.0 {
            return Err(Error::Motion(MotionError::NotConfigured));
        }
        Ok(())
    }

    fn armed_sync(&self) -> SyncMode {
        match self.sync_arm {
            None => SyncMode::None,
            Some(arm) if arm.wait_for_index => SyncMode::Position {
                uu_per_rev: arm.uu_per_rev,
            },
            Some(arm) => SyncMode::Velocity {
                uu_per_rev: arm.uu_per_rev,
            },
        }
    }

    fn push_segment(&mut self, req: SegmentRequest) -> Result<AddResult> {
        if self.queue.is_full() {
            return Err(Error::Queue(QueueError::Full));
        }

        let (machine_vel, machine_acc) = if req.pure_rotation {
            (self.w_max, self.w_dot_max)
        } else {
            (self.ini_max_vel, self.a_max)
        };
        let programmed_cap = if req.pure_rotation {
            self.w_max
        } else {
            self.v_max
        };

        let max_vel = req.ini_maxvel.min(machine_vel).min(self.v_limit);
        let req_vel = req.vel.min(programmed_cap).min(max_vel);
        let max_acc = req.acc.min(machine_acc);

        let mut outputs = core::mem::take(&mut self.pending_outputs);
        outputs.enables = req.enables;

        let id = self.next_id;
        let segment = Segment {
            id,
            kind: req.kind,
            start: req.start,
            end: req.end,
            length: req.length,
            req_vel,
            max_vel,
            max_acc,
            term: req.term,
            sync: req.sync,
            at_speed: req.at_speed,
            index_rotary: req.index_rotary,
            unit_dir: req.unit_dir,
            pure_rotation: req.pure_rotation,
            outputs,
            progress: 0.0,
            final_vel: 0.0,
            active: false,
        };

        self.queue.push(segment).map_err(Error::Queue)?;
        self.next_id = self.next_id.wrapping_add(1);
        self.goal_pos = req.end;
        self.done = false;
        Ok(AddResult::Queued(id))
    }
}

struct SegmentRequest {
    kind: MotionKind,
    start: Pose,
    end: Pose,
    length: f64,
    unit_dir: Option<Cartesian>,
    pure_rotation: bool,
    vel: f64,
    ini_maxvel: f64,
    acc: f64,
    sync: SyncMode,
    term: TermCond,
    at_speed: bool,
    index_rotary: Option<u8>,
    enables: u8,
}

fn validate_rates(vel: f64, acc: f64) -> Result<()> {
    if !vel.is_finite() || vel <= 0.0 {
        return Err(Error::Motion(MotionError::InvalidVelocity(vel)));
    }
    if !acc.is_finite() || acc <= 0.0 {
        return Err(Error::Motion(MotionError::InvalidAcceleration(acc)));
    }
    Ok(())
}

/// Arc length of a circular/helical move.
///
/// The base arc runs from `start` to `end` about `center` in the plane
/// normal to `normal`; `turn` adds full revolutions, with its sign
/// selecting the rotation direction. Coincident projected endpoints with
/// `turn != 0` describe full circles.
fn circle_length(start: Pose, end: Pose, center: Cartesian, normal: Cartesian, turn: i32) -> f64 {
    let n = normal
        .unit()
        .unwrap_or(Cartesian::new(0.0, 0.0, 1.0));
    let s = start.translation() - center;
    let e = end.translation() - center;
    let s_p = s - n.scale(s.dot(n));
    let e_p = e - n.scale(e.dot(n));

    let radius = s_p.magnitude();
    if radius < MAG_EPSILON {
        return 0.0;
    }

    let mut angle = if (s_p - e_p).magnitude() < MAG_EPSILON {
        0.0
    } else {
        let dir = if turn >= 0 { 1.0 } else { -1.0 };
        let raw = atan2(s_p.cross(e_p).dot(n) * dir, s_p.dot(e_p));
        if raw < 0.0 {
            raw + TWO_PI
        } else {
            raw
        }
    };
    angle += TWO_PI * turn.unsigned_abs() as f64;

    let axial = (e - s).dot(n);
    sqrt(radius * angle * radius * angle + axial * axial)
}
