//! Peer-to-peer overlay links
//!
//! Each link is one external process (the P2P daemon, or an N2N edge for
//! supernode-managed links) bound to an interface, a local address and a
//! community. Links are recorded in the shared link registry as
//! `interface local-ip community` lines; a record is live only while its
//! process runs. Teardown signals the process with SIGHUP, waits for it to
//! exit and then drops the registry lines.

mod manager;
mod ports;
mod process;
mod registry;

pub use manager::{LinkStatus, ManagedLink, PeerLinkManager, SpawnedLink, TeardownOutcome};
pub use ports::{allocate_port, check_explicit_port, PortProber, UdpPortProber};
pub use process::{EdgeParams, ProcessControl, SystemProcess};
pub use registry::{line_matches, LinkRegistry};

#[cfg(test)]
pub use ports::MockPortProber;
#[cfg(test)]
pub use process::MockProcessControl;

use crate::error::{OverlayError, Result};
use crate::security;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One link registry entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    /// TAP interface the link process owns
    pub interface: String,
    /// Address of this host inside the overlay
    pub local_ip: String,
    /// Community (tenant) the link belongs to
    pub community: String,
}

impl LinkRecord {
    /// Build a record, validating every field
    pub fn new(interface: &str, local_ip: &str, community: &str) -> Result<Self> {
        security::validate_interface_name(interface)?;
        security::validate_ip_address(local_ip)?;
        security::validate_community_name(community)?;
        Ok(Self {
            interface: interface.to_string(),
            local_ip: local_ip.to_string(),
            community: community.to_string(),
        })
    }
}

impl fmt::Display for LinkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.interface, self.local_ip, self.community)
    }
}

impl FromStr for LinkRecord {
    type Err = OverlayError;

    fn from_str(line: &str) -> Result<Self> {
        match line.split_whitespace().collect::<Vec<_>>().as_slice() {
            [interface, local_ip, community] => Ok(Self {
                interface: interface.to_string(),
                local_ip: local_ip.to_string(),
                community: community.to_string(),
            }),
            _ => Err(OverlayError::Validation(format!(
                "Expected 'interface local-ip community', got {:?}",
                line
            ))),
        }
    }
}

/// How a managed link receives its community key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Key is read from a file
    File,
    /// Key is passed on the command line
    Inline,
}

impl FromStr for KeyType {
    type Err = OverlayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(KeyType::File),
            "inline" => Ok(KeyType::Inline),
            other => Err(OverlayError::Validation(format!(
                "Invalid key type '{}': must be file or inline",
                other
            ))),
        }
    }
}

/// Parameters of a supernode-managed link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedLinkRequest {
    /// Supernode address
    pub supernode_ip: String,
    /// Supernode UDP port
    pub supernode_port: u16,
    /// TAP interface
    pub interface: String,
    /// Community (tenant) name
    pub community: String,
    /// Address of this host inside the overlay
    pub local_ip: String,
    /// How `key` is interpreted
    pub key_type: KeyType,
    /// Key file path or inline key
    pub key: String,
    /// Management port; probed when absent
    pub management_port: Option<u16>,
}
