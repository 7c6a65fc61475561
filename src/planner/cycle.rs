//! The per-period cycle executor.
//!
//! `run_cycle` is invoked once per control period by an external
//! real-time scheduler. It must be non-blocking and allocation-free:
//! every loop here is bounded by the queue capacity or the lookahead
//! depth, and nothing on this path touches the heap.
//!
//! Priority order inside a cycle: abort ramp, pause ramp, then normal
//! advance (lookahead planning, velocity resolution, integration,
//! retirement of consumed segments).

use libm::sqrt;

use crate::config::constants::{ANGLE_EPSILON, BIG_NUM, LOOKAHEAD_DEPTH, VEL_EPSILON};
use crate::error::{ConfigError, Error, Result};
use crate::geometry::{Cartesian, Pose};
use crate::io::OutputToggler;
use crate::segment::{Segment, SyncMode, TermCond};
use crate::spindle;

use super::{CycleStatus, MotionState, Planner};

/// Read-only facts about the following segment, carried while walking
/// the lookahead window backward.
struct LookaheadInfo {
    target: f64,
    length: f64,
    acc: f64,
    dir: Option<Cartesian>,
    term: TermCond,
    requires_stop: bool,
    final_vel: f64,
}

impl<'a> Planner<'a> {
    /// Advance execution by one control period.
    ///
    /// Returns [`CycleStatus::Idle`] when there is nothing to do, and
    /// fails only on an unconfigured planner or a non-positive period.
    /// Wait states (spindle index / at-speed) are not failures: the
    /// cycle holds position and reports success.
    pub fn run_cycle(&mut self, period: f64, io: &mut dyn OutputToggler) -> Result<CycleStatus> {
        self.ensure_configured()?;
        if !period.is_finite() || period <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidCycleTime(period)));
        }

        match self.motion {
            MotionState::Aborting => return Ok(self.abort_cycle(period, io)),
            MotionState::Pausing | MotionState::Paused => {
                return Ok(self.pause_cycle(period, io))
            }
            _ => {}
        }

        if self.queue.is_empty() {
            self.motion = MotionState::Idle;
            self.active_depth = 0;
            self.done = self.current_vel.abs() < VEL_EPSILON;
            return Ok(CycleStatus::Idle);
        }

        self.motion = MotionState::Running;
        self.done = false;
        self.activate_head(io, true);

        if self.poll_wait_states() {
            // Stalled on the spindle; hold position this cycle.
            return Ok(CycleStatus::Active);
        }

        self.plan_lookahead();
        let v_new = self.resolve_velocity(period);
        self.integrate(v_new, period, io);
        self.update_done();
        Ok(CycleStatus::Active)
    }

    /// Bounded deceleration to zero, then discard the program. The
    /// final ramp cycle also clears, so abort completes within
    /// `ceil(v / (a * period))` cycles.
    fn abort_cycle(&mut self, period: f64, io: &mut dyn OutputToggler) -> CycleStatus {
        if self.current_vel >= VEL_EPSILON {
            let decel = self.active_acceleration();
            let v_new = (self.current_vel - decel * period).max(0.0);
            let dist = 0.5 * (self.current_vel + v_new) * period;
            // Toggles are suppressed: every remaining segment is being
            // discarded, so none of them logically activates.
            let stopped = self.advance_along_path(dist, io, false);
            self.current_vel = if stopped { 0.0 } else { v_new };
            if self.current_vel >= VEL_EPSILON {
                return CycleStatus::Active;
            }
        }

        self.queue.clear();
        self.goal_pos = self.current_pos;
        self.current_vel = 0.0;
        self.motion = MotionState::Idle;
        self.done = true;
        self.active_depth = 0;
        self.motion_type = None;
        self.exec_id = None;
        self.spindle.waiting_for_index = false;
        self.spindle.waiting_for_atspeed = false;
        self.index_locked = false;
        CycleStatus::Active
    }

    /// Bounded deceleration to a hold, preserving queue and blend state.
    fn pause_cycle(&mut self, period: f64, io: &mut dyn OutputToggler) -> CycleStatus {
        if self.current_vel < VEL_EPSILON {
            self.current_vel = 0.0;
            self.motion = MotionState::Paused;
            return CycleStatus::Active;
        }

        let decel = self.active_acceleration();
        let v_new = (self.current_vel - decel * period).max(0.0);
        let dist = 0.5 * (self.current_vel + v_new) * period;
        let stopped = self.advance_along_path(dist, io, true);
        self.current_vel = if stopped { 0.0 } else { v_new };
        CycleStatus::Active
    }

    /// Deceleration rate available right now: the head segment's cap,
    /// or the machine bound when nothing is queued.
    fn active_acceleration(&self) -> f64 {
        self.queue
            .front()
            .map(|seg| seg.max_acc)
            .unwrap_or(self.a_max)
    }

    /// Publish the head segment: set exec id and motion type, latch any
    /// spindle wait conditions, and fire its output toggle exactly once.
    fn activate_head(&mut self, io: &mut dyn OutputToggler, fire: bool) {
        let index_locked = self.index_locked;
        let at_speed_now = self.feedback.at_speed;

        let Some(head) = self.queue.front_mut() else {
            return;
        };
        if head.active {
            return;
        }
        head.active = true;

        let id = head.id;
        let kind = head.kind;
        let needs_atspeed = head.at_speed && !at_speed_now;
        let needs_index = matches!(head.sync, SyncMode::Position { .. }) && !index_locked;
        let outputs = head.outputs.clone();

        self.exec_id = Some(id);
        self.motion_type = Some(kind);
        if needs_atspeed {
            self.spindle.waiting_for_atspeed = true;
        }
        if needs_index {
            self.spindle.waiting_for_index = true;
        }
        if fire {
            io.toggle(&outputs);
        }
    }

    /// Poll the spindle wait conditions once. Returns true while motion
    /// must stall. The index pulse latches the phase reference.
    fn poll_wait_states(&mut self) -> bool {
        if self.spindle.waiting_for_atspeed {
            if self.feedback.at_speed {
                self.spindle.waiting_for_atspeed = false;
            } else {
                return true;
            }
        }
        if self.spindle.waiting_for_index {
            if self.feedback.index_pulse {
                self.spindle.offset = self.feedback.position_revs;
                self.spindle.waiting_for_index = false;
                self.index_locked = true;
            } else {
                return true;
            }
        }
        false
    }

    /// Backward pass over the lookahead window, assigning each segment
    /// the velocity it may carry into its end junction.
    ///
    /// The last segment in the window always ends at zero. Interior
    /// junctions take the minimum of the corner cap (from the blend
    /// tolerance), both segments' target velocities, and what the next
    /// segment can decelerate away from; junctions whose result falls
    /// below `smoothing_threshold` of the adjacent targets are demoted
    /// to a full stop.
    fn plan_lookahead(&mut self) {
        let window = self.queue.len().min(LOOKAHEAD_DEPTH);
        self.active_depth = window;

        let mut next: Option<LookaheadInfo> = None;
        for i in (0..window).rev() {
            let facts = self.queue.get(i).map(|seg| {
                (
                    seg.length,
                    seg.unit_dir,
                    seg.max_acc,
                    seg.term,
                    self.target_velocity(seg),
                    seg.at_speed || matches!(seg.sync, SyncMode::Position { .. }),
                )
            });
            let Some((length, dir, acc, term, target, requires_stop)) = facts else {
                continue;
            };

            let v_end = match &next {
                None => 0.0,
                Some(n) if n.requires_stop => 0.0,
                Some(n) => {
                    // The junction policy belongs to the later segment:
                    // its termination condition was staged when it was
                    // enqueued and governs the join with its
                    // predecessor.
                    let corner = match n.term {
                        TermCond::Stop => 0.0,
                        TermCond::Blend { tolerance } => {
                            corner_velocity(dir, n.dir, acc.min(n.acc), tolerance)
                        }
                    };
                    let mut v = corner.min(target).min(n.target);
                    // Must still be able to reach the next junction's
                    // velocity by the end of the next segment.
                    v = v.min(sqrt(n.final_vel * n.final_vel + 2.0 * n.acc * n.length));
                    if v < self.smoothing_threshold * target.min(n.target) {
                        v = 0.0;
                    }
                    v
                }
            };

            if let Some(seg) = self.queue.get_mut(i) {
                seg.final_vel = v_end;
            }
            next = Some(LookaheadInfo {
                target,
                length,
                acc,
                dir,
                term,
                requires_stop,
                final_vel: v_end,
            });
        }
    }

    /// Steady-state velocity this segment is allowed to run at right
    /// now, before acceleration limiting.
    fn target_velocity(&self, seg: &Segment) -> f64 {
        let base = match seg.sync {
            SyncMode::None => (seg.req_vel * self.v_scale).min(seg.max_vel),
            SyncMode::Velocity { uu_per_rev } => {
                spindle::velocity_for(uu_per_rev, &self.feedback).min(seg.max_vel)
            }
            // Position mode tracks the spindle; the cap is the machine
            // constraint, not the programmed feed.
            SyncMode::Position { .. } => seg.max_vel,
        };
        let mut v = base.min(self.v_limit);

        // A segment must span MIN_SEGMENT_CYCLES samples so it cannot
        // be stepped over between cycles.
        let min_span = self.min_segment_cycles * self.cycle_time;
        if min_span > 0.0 {
            v = v.min(seg.length / min_span);
        }
        v.max(0.0)
    }

    /// New scalar velocity for this cycle, honoring target, junction
    /// deceleration feasibility, and the acceleration bound.
    fn resolve_velocity(&self, period: f64) -> f64 {
        let Some(head) = self.queue.front() else {
            return 0.0;
        };

        if let SyncMode::Position { uu_per_rev } = head.sync {
            // Track spindle revolutions since the phase lock.
            let target_progress =
                spindle::progress_for(uu_per_rev, &self.spindle).min(head.length);
            let v_track = (target_progress - head.progress).max(0.0) / period;
            let v_capped = v_track.min(head.max_vel).min(self.v_limit);
            let up = self.current_vel + head.max_acc * period;
            let down = (self.current_vel - head.max_acc * period).max(0.0);
            return v_capped.clamp(down, up);
        }

        let target = self.target_velocity(head);

        // Highest velocity from which the junction velocity is still
        // reachable across the remaining distance.
        let remaining = (head.remaining() - self.current_vel * period).max(0.0);
        let v_reach = sqrt(head.final_vel * head.final_vel + 2.0 * head.max_acc * remaining);

        let goal = target.min(v_reach);
        if goal >= self.current_vel {
            (self.current_vel + head.max_acc * period).min(goal)
        } else {
            (self.current_vel - head.max_acc * period).max(goal)
        }
    }

    /// Integrate position over the period and retire consumed segments.
    fn integrate(&mut self, v_new: f64, period: f64, io: &mut dyn OutputToggler) {
        let dist = 0.5 * (self.current_vel + v_new) * period;
        let stopped = self.advance_along_path(dist, io, true);
        self.current_vel = if stopped { 0.0 } else { v_new };
    }

    /// Consume `dist` of path, popping segments as they complete and
    /// activating their successors within the same cycle so blended
    /// junctions carry velocity without a dwell sample.
    ///
    /// Returns true when advance hit a zero-velocity barrier (an
    /// exact-stop junction or the end of the program); any residual
    /// distance is discarded there, which bounds junction overshoot to
    /// a single sample.
    fn advance_along_path(&mut self, mut dist: f64, io: &mut dyn OutputToggler, fire: bool) -> bool {
        let mut stopped = false;
        let mut last_end: Option<Pose> = None;

        while dist > 0.0 {
            let Some(head) = self.queue.front_mut() else {
                stopped = true;
                break;
            };
            let remaining = head.remaining();
            if dist < remaining {
                head.progress += dist;
                dist = 0.0;
            } else {
                dist -= remaining;
                head.progress = head.length;
                let barrier = head.final_vel < VEL_EPSILON;
                if let Some(finished) = self.queue.pop_front() {
                    // A retired engagement releases the phase lock; the
                    // next position-synchronized segment must wait for
                    // a fresh index pulse and re-latch its offset.
                    if matches!(finished.sync, SyncMode::Position { .. }) {
                        self.index_locked = false;
                    }
                    last_end = Some(finished.end);
                }
                if barrier {
                    stopped = true;
                    dist = 0.0;
                }
                if !self.queue.is_empty() {
                    self.activate_head(io, fire);
                }
            }
        }

        if let Some(head) = self.queue.front() {
            self.current_pos = head.point_at_progress();
        } else if let Some(end) = last_end {
            self.current_pos = end;
        }
        stopped
    }

    /// Refresh depth-derived state and the done flag.
    fn update_done(&mut self) {
        if self.queue.is_empty() && self.current_vel.abs() < VEL_EPSILON {
            self.current_vel = 0.0;
            self.done = true;
            self.motion = MotionState::Idle;
            self.motion_type = None;
            self.active_depth = 0;
        }
    }
}

/// Velocity cap at a corner joining two translation directions, from
/// the junction-deviation model: the blend arc may deviate from the
/// programmed corner by at most `tolerance`.
pub(crate) fn corner_velocity(
    a: Option<Cartesian>,
    b: Option<Cartesian>,
    acc: f64,
    tolerance: f64,
) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        // Direction undefined (pure rotation or closed circle): the
        // junction is an exact stop.
        return 0.0;
    };
    if tolerance <= 0.0 {
        return 0.0;
    }

    let cos_theta = a.dot(b).clamp(-1.0, 1.0);
    if cos_theta > 1.0 - ANGLE_EPSILON {
        // Tangent junction: no corner limit.
        return BIG_NUM;
    }
    if cos_theta < -1.0 + ANGLE_EPSILON {
        // Full reversal.
        return 0.0;
    }

    let sin_half = sqrt((1.0 - cos_theta) * 0.5);
    sqrt(acc * tolerance * sin_half / (1.0 - sin_half))
}
