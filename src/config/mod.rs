//! Configuration module for motion-planner.
//!
//! Provides the planner tuning constants, the machine kinematic bounds,
//! and the TOML-loadable aggregate configuration (with the `std` feature).

pub mod constants;
mod limits;
#[cfg(feature = "std")]
mod loader;
mod planner;

pub use limits::KinematicLimits;
pub use planner::{validate_config, PlannerConfig};

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};
