//! Security checks and input validation
//!
//! This module provides:
//! - Input validation for names, addresses, VNIs and VLANs
//! - Privilege detection for switch and signal operations
//! - A preflight report of what the host is missing

use crate::config::Config;
use std::path::Path;
use tracing::debug;

mod privileges;
mod validation;

pub use privileges::PrivilegeLevel;
pub use validation::{
    validate_cidr, validate_community_name, validate_interface_name, validate_ip_address,
    validate_port_name, validate_tenant_id, validate_token, validate_vlan, validate_vni,
    MAX_INTERFACE_NAME_LEN, MAX_VLAN, MAX_VNI, MIN_VLAN,
};

/// Report problems that will make privileged operations fail
///
/// An empty list means the process runs as root and every configured
/// binary resolves.
pub fn preflight(config: &Config) -> Vec<String> {
    let mut missing = Vec::new();

    let level = PrivilegeLevel::detect();
    if !level.is_elevated() {
        missing.push(format!(
            "running as {}: switch and signal operations need root or CAP_NET_ADMIN/CAP_KILL",
            level
        ));
    }

    for binary in [
        &config.switch.vsctl,
        &config.switch.ofctl,
        &config.peer.p2p_binary,
        &config.peer.edge_binary,
    ] {
        if !binary_resolves(binary) {
            missing.push(format!("Required command not found: {}", binary));
        }
    }

    missing
}

/// Check whether a command name or path can be executed
fn binary_resolves(binary: &str) -> bool {
    if binary.contains('/') {
        return Path::new(binary).is_file();
    }

    let Some(path) = std::env::var_os("PATH") else {
        debug!("PATH is not set");
        return false;
    };

    std::env::split_paths(&path).any(|dir| dir.join(binary).is_file())
}
