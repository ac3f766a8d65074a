//! Configuration validation functions
//!
//! This module provides validation for configuration fields: binaries,
//! directories, port ranges and timeouts.

use crate::error::{OverlayError, Result};
use std::path::{Component, Path};

/// Validate that a setting is not blank
pub fn validate_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OverlayError::Config(format!("{} cannot be empty", field)));
    }
    Ok(())
}

/// Validate the state directory is relative and stays under the prefix
pub fn validate_relative_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() {
        return Err(OverlayError::Config(
            "network_dir cannot be empty".to_string(),
        ));
    }

    for component in dir.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(OverlayError::Config(format!(
                    "network_dir {:?} must be a relative path without '..'",
                    dir
                )));
            }
        }
    }

    Ok(())
}

/// Validate the management port probing range
pub fn validate_port_range(start: u16, end: u16) -> Result<()> {
    if start == 0 {
        return Err(OverlayError::Config(
            "peer.port_range_start cannot be 0".to_string(),
        ));
    }

    if start >= end {
        return Err(OverlayError::Config(format!(
            "Empty port range {}..{} (start must be below end)",
            start, end
        )));
    }

    Ok(())
}

/// Validate teardown timeout
pub fn validate_timeout(timeout_ms: u64) -> Result<()> {
    if timeout_ms == 0 {
        return Err(OverlayError::Config(
            "peer.teardown_timeout_ms must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
