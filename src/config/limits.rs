//! Machine-wide kinematic bounds.

use serde::Deserialize;

use crate::error::{ConfigError, Error, Result};

use super::constants::BIG_NUM;

/// Velocity and acceleration bounds applied to every queued motion.
///
/// `v_max` bounds commanded feed velocity before the operator override is
/// applied; `v_limit` is the absolute ceiling no override can exceed.
/// `w_max`/`w_dot_max` bound moves classified as pure rotation.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct KinematicLimits {
    /// Velocity bound for subsequent moves (user units/sec).
    #[serde(rename = "max_velocity")]
    pub v_max: f64,

    /// Machine-constraint velocity ceiling for subsequent moves.
    #[serde(rename = "machine_max_velocity", default = "big_num")]
    pub ini_max_vel: f64,

    /// Acceleration bound (user units/sec^2).
    #[serde(rename = "max_acceleration")]
    pub a_max: f64,

    /// Absolute upper bound on all velocities, override included.
    #[serde(rename = "velocity_limit", default = "big_num")]
    pub v_limit: f64,

    /// Rotary velocity bound (degrees/sec).
    #[serde(rename = "rotary_max_velocity", default = "big_num")]
    pub w_max: f64,

    /// Rotary acceleration bound (degrees/sec^2).
    #[serde(rename = "rotary_max_acceleration", default = "big_num")]
    pub w_dot_max: f64,
}

fn big_num() -> f64 {
    BIG_NUM
}

impl Default for KinematicLimits {
    fn default() -> Self {
        Self {
            v_max: BIG_NUM,
            ini_max_vel: BIG_NUM,
            a_max: BIG_NUM,
            v_limit: BIG_NUM,
            w_max: BIG_NUM,
            w_dot_max: BIG_NUM,
        }
    }
}

impl KinematicLimits {
    /// Validate that every bound is positive and finite-or-sentinel.
    pub fn validate(&self) -> Result<()> {
        if !positive(self.v_max) {
            return Err(Error::Config(ConfigError::InvalidMaxVelocity(self.v_max)));
        }
        if !positive(self.ini_max_vel) {
            return Err(Error::Config(ConfigError::InvalidMaxVelocity(
                self.ini_max_vel,
            )));
        }
        if !positive(self.a_max) {
            return Err(Error::Config(ConfigError::InvalidMaxAcceleration(
                self.a_max,
            )));
        }
        if !positive(self.v_limit) {
            return Err(Error::Config(ConfigError::InvalidVelocityLimit(
                self.v_limit,
            )));
        }
        if !positive(self.w_max) {
            return Err(Error::Config(ConfigError::InvalidRotaryLimit(self.w_max)));
        }
        if !positive(self.w_dot_max) {
            return Err(Error::Config(ConfigError::InvalidRotaryLimit(
                self.w_dot_max,
            )));
        }
        Ok(())
    }
}

fn positive(v: f64) -> bool {
    v.is_finite() && v > 0.0
}
