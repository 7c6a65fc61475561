//! Error types for motion-planner.
//!
//! Provides unified error handling across configuration, queue management,
//! and motion execution, plus the numeric status codes spoken by legacy
//! supervisory layers.

use core::fmt;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all planner operations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Segment queue error
    Queue(QueueError),
    /// Motion request or execution error
    Motion(MotionError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// Cycle time must be positive and finite
    InvalidCycleTime(f64),
    /// Max velocity must be positive and finite
    InvalidMaxVelocity(f64),
    /// Max acceleration must be positive and finite
    InvalidMaxAcceleration(f64),
    /// Absolute velocity limit must be positive and finite
    InvalidVelocityLimit(f64),
    /// Rotary velocity/acceleration bounds must be positive and finite
    InvalidRotaryLimit(f64),
    /// Feed override ceiling must be positive
    InvalidFeedScale(f64),
    /// Blend tolerance must be non-negative and finite
    InvalidTolerance(f64),
    /// Smoothing threshold must lie in (0, 1)
    InvalidSmoothingThreshold(f64),
    /// Minimum segment duration must be at least one cycle
    InvalidMinSegmentCycles(f64),
    /// Failed to parse TOML configuration
    #[cfg(feature = "std")]
    ParseError,
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError,
}

/// Segment queue errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Queue is at capacity; the segment was not enqueued
    Full,
    /// Backing storage slice is empty
    NoStorage,
    /// Per-segment output schedule is at capacity
    OutputScheduleFull,
}

/// Motion request and execution errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionError {
    /// Requested velocity is zero, negative, or non-finite
    InvalidVelocity(f64),
    /// Requested acceleration is zero, negative, or non-finite
    InvalidAcceleration(f64),
    /// Planner has no cycle time configured yet
    NotConfigured,
    /// Operation requires an empty queue and zero velocity
    Busy,
    /// Rigid tap requested without arming spindle synchronization
    SyncNotArmed,
}

/// Numeric status codes for callers that speak the legacy motion protocol.
///
/// Every public operation's outcome maps onto one of these values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(i32)]
pub enum Status {
    /// Operation failed; state is unchanged.
    Fail = -1,
    /// Operation succeeded.
    Ok = 0,
    /// Nothing to do (empty queue, nothing executing).
    NoAction = 1,
    /// Caller should discard the most recently issued command.
    RemoveLast = 2,
}

impl Status {
    /// Get the raw protocol code.
    #[inline]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl From<&Error> for Status {
    fn from(_: &Error) -> Self {
        Status::Fail
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Queue(e) => write!(f, "Queue error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCycleTime(v) => {
                write!(f, "Invalid cycle time: {}. Must be > 0", v)
            }
            ConfigError::InvalidMaxVelocity(v) => {
                write!(f, "Invalid max velocity: {}. Must be > 0", v)
            }
            ConfigError::InvalidMaxAcceleration(v) => {
                write!(f, "Invalid max acceleration: {}. Must be > 0", v)
            }
            ConfigError::InvalidVelocityLimit(v) => {
                write!(f, "Invalid velocity limit: {}. Must be > 0", v)
            }
            ConfigError::InvalidRotaryLimit(v) => {
                write!(f, "Invalid rotary limit: {}. Must be > 0", v)
            }
            ConfigError::InvalidFeedScale(v) => {
                write!(f, "Invalid max feed scale: {}. Must be > 0", v)
            }
            ConfigError::InvalidTolerance(v) => {
                write!(f, "Invalid blend tolerance: {}. Must be >= 0", v)
            }
            ConfigError::InvalidSmoothingThreshold(v) => {
                write!(f, "Invalid smoothing threshold: {}. Must be in (0, 1)", v)
            }
            ConfigError::InvalidMinSegmentCycles(v) => {
                write!(f, "Invalid min segment cycles: {}. Must be >= 1", v)
            }
            #[cfg(feature = "std")]
            ConfigError::ParseError => write!(f, "Failed to parse TOML configuration"),
            #[cfg(feature = "std")]
            ConfigError::IoError => write!(f, "Failed to read configuration file"),
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full => write!(f, "Segment queue is full"),
            QueueError::NoStorage => write!(f, "Queue storage must hold at least one segment"),
            QueueError::OutputScheduleFull => {
                write!(f, "Output schedule for the next segment is full")
            }
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::InvalidVelocity(v) => {
                write!(f, "Requested velocity {} is not a positive finite value", v)
            }
            MotionError::InvalidAcceleration(v) => {
                write!(
                    f,
                    "Requested acceleration {} is not a positive finite value",
                    v
                )
            }
            MotionError::NotConfigured => write!(f, "Planner cycle time not configured"),
            MotionError::Busy => {
                write!(f, "Operation requires an empty queue and zero velocity")
            }
            MotionError::SyncNotArmed => {
                write!(f, "Rigid tap requires spindle synchronization to be armed")
            }
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Error::Queue(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for QueueError {}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}
