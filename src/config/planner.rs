//! Aggregate planner configuration.

use serde::Deserialize;

use crate::error::{ConfigError, Error, Result};

use super::constants::{MAX_FEED_SCALE, MIN_SEGMENT_CYCLES, SMOOTHING_THRESHOLD};
use super::limits::KinematicLimits;

/// Full planner configuration, loadable from TOML with the `std` feature.
///
/// ```toml
/// cycle_time = 0.001
/// max_feed_scale = 1.0
///
/// [limits]
/// max_velocity = 120.0
/// max_acceleration = 800.0
/// velocity_limit = 150.0
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// Control period in seconds.
    pub cycle_time: f64,

    /// Kinematic bounds for all queued motion.
    #[serde(default)]
    pub limits: KinematicLimits,

    /// Ceiling on the operator feed override scale.
    #[serde(default = "default_feed_scale")]
    pub max_feed_scale: f64,

    /// Minimum number of control cycles a segment must span.
    #[serde(default = "default_min_segment_cycles")]
    pub min_segment_cycles: f64,

    /// Junction demotion threshold for the blend pass.
    #[serde(default = "default_smoothing_threshold")]
    pub smoothing_threshold: f64,
}

fn default_feed_scale() -> f64 {
    MAX_FEED_SCALE
}

fn default_min_segment_cycles() -> f64 {
    MIN_SEGMENT_CYCLES
}

fn default_smoothing_threshold() -> f64 {
    SMOOTHING_THRESHOLD
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cycle_time: 0.001,
            limits: KinematicLimits::default(),
            max_feed_scale: MAX_FEED_SCALE,
            min_segment_cycles: MIN_SEGMENT_CYCLES,
            smoothing_threshold: SMOOTHING_THRESHOLD,
        }
    }
}

/// Validate a planner configuration.
///
/// Checks:
/// - Cycle time is positive and finite
/// - Kinematic limits are positive
/// - Feed scale ceiling is positive
/// - Smoothing threshold lies in (0, 1)
/// - Minimum segment duration is at least one cycle
pub fn validate_config(config: &PlannerConfig) -> Result<()> {
    if !config.cycle_time.is_finite() || config.cycle_time <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidCycleTime(
            config.cycle_time,
        )));
    }

    config.limits.validate()?;

    if !config.max_feed_scale.is_finite() || config.max_feed_scale <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidFeedScale(
            config.max_feed_scale,
        )));
    }

    if !config.smoothing_threshold.is_finite()
        || config.smoothing_threshold <= 0.0
        || config.smoothing_threshold >= 1.0
    {
        return Err(Error::Config(ConfigError::InvalidSmoothingThreshold(
            config.smoothing_threshold,
        )));
    }

    if !config.min_segment_cycles.is_finite() || config.min_segment_cycles < 1.0 {
        return Err(Error::Config(ConfigError::InvalidMinSegmentCycles(
            config.min_segment_cycles,
        )));
    }

    Ok(())
}
