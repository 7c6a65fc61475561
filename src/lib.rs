//! # motion-planner
//!
//! Real-time trajectory planner for CNC and robotic motion stacks.
//!
//! Converts a stream of discrete motion requests (lines, arcs, rigid
//! taps) into a continuously blended, kinematically bounded velocity and
//! position profile, sampled once per fixed control period for
//! downstream servo loops.
//!
//! ## Features
//!
//! - **Bounded queue, zero allocation**: the segment queue is a ring
//!   over caller-supplied storage; the cycle path never blocks and
//!   never touches the heap
//! - **Multi-segment lookahead**: corner blending under a configurable
//!   path tolerance, with deterministic junction demotion
//! - **Spindle-synchronized motion**: velocity and position modes with
//!   index-pulse and at-speed wait states for threading and tapping
//! - **Pause/resume/abort**: bounded deceleration ramps, never a
//!   position jump
//! - **no_std compatible**: core planner works without the standard
//!   library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use motion_planner::{MotionKind, NullOutputs, Planner, Pose};
//!
//! let mut storage: [Option<motion_planner::Segment>; 32] =
//!     core::array::from_fn(|_| None);
//! let mut tp = Planner::new(&mut storage)?;
//! tp.set_cycle_time(0.001)?;
//! tp.set_vmax(100.0, 120.0)?;
//! tp.set_amax(800.0)?;
//!
//! tp.add_line(Pose::linear(10.0, 0.0, 0.0), MotionKind::Feed,
//!             5.0, 10.0, 50.0, 0, false, None)?;
//!
//! let mut io = NullOutputs;
//! while !tp.is_done() {
//!     tp.run_cycle(0.001, &mut io)?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Core modules
pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod planner;
pub mod queue;
pub mod segment;
pub mod spindle;

// Re-exports for ergonomic API
pub use config::{validate_config, KinematicLimits, PlannerConfig};
pub use error::{Error, Result, Status};
pub use geometry::{Cartesian, Pose};
pub use io::{NullOutputs, OutputToggler};
pub use planner::{AddResult, CycleStatus, MotionState, Planner};
pub use queue::SegmentQueue;
pub use segment::{MotionKind, OutputSchedule, Segment, SyncMode, TermCond};
pub use spindle::{SpindleFeedback, SpindleStatus};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};
