//! Configuration loading from files (std only).

use std::fs;
use std::path::Path;

use crate::error::{ConfigError, Error, Result};

use super::PlannerConfig;

/// Load planner configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PlannerConfig> {
    let content =
        fs::read_to_string(path.as_ref()).map_err(|_| Error::Config(ConfigError::IoError))?;

    parse_config(&content)
}

/// Parse planner configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<PlannerConfig> {
    let config: PlannerConfig =
        toml::from_str(content).map_err(|_| Error::Config(ConfigError::ParseError))?;

    super::planner::validate_config(&config)?;

    Ok(config)
}
