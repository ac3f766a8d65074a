//! Overlay tunnel ports
//!
//! VXLAN and GRE tunnels are ports on the switch's tunnel bridge. The
//! [`TunnelRegistry`] is a read-only view derived from the switch; the
//! [`TunnelManager`] creates and removes ports after validating against it.

mod dump;
mod lifecycle;
mod registry;

pub use dump::{parse_interface_table, parse_show_dump};
pub use lifecycle::{RemoveOutcome, TunnelManager};
pub use registry::TunnelRegistry;

use crate::error::OverlayError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Tunnel encapsulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelType {
    /// VXLAN (UDP encapsulation, carries a VNI)
    Vxlan,
    /// GRE
    Gre,
}

impl FromStr for TunnelType {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vxlan" => Ok(TunnelType::Vxlan),
            "gre" => Ok(TunnelType::Gre),
            other => Err(OverlayError::InvalidTunnelType(other.to_string())),
        }
    }
}

impl fmt::Display for TunnelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelType::Vxlan => write!(f, "vxlan"),
            TunnelType::Gre => write!(f, "gre"),
        }
    }
}

/// An existing tunnel port and the remote it targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelEndpoint {
    /// Switch port name
    pub port_name: String,
    /// Remote tunnel endpoint address
    pub remote_ip: String,
}

impl TunnelEndpoint {
    /// Create a new endpoint
    pub fn new(port_name: impl Into<String>, remote_ip: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            remote_ip: remote_ip.into(),
        }
    }
}

/// Rendered as `portName-remoteIP`
impl fmt::Display for TunnelEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.port_name, self.remote_ip)
    }
}
