//! VNI reservations and per-port VNI/VLAN mappings
//!
//! A reservation records a `(vni, vlan, tenant)` triple as permitted on this
//! host. A mapping binds a reserved triple to one tunnel port. Both are
//! stored as `vni vlan tenant` lines; reservations in one shared file and
//! mappings in one file per port.

mod engine;
mod mapping;
mod reservation;

pub use engine::VniEngine;
pub use mapping::MappingStore;
pub use reservation::ReservationStore;

use crate::error::{OverlayError, Result};
use crate::security;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A `(vni, vlan, tenant)` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VniTriple {
    /// VXLAN network identifier
    pub vni: u32,
    /// Local VLAN tag
    pub vlan: u16,
    /// Tenant (environment) id
    pub tenant_id: String,
}

impl VniTriple {
    /// Build a triple, validating every field
    pub fn new(vni: u32, vlan: u16, tenant_id: impl Into<String>) -> Result<Self> {
        let tenant_id = tenant_id.into();
        security::validate_vni(vni)?;
        security::validate_vlan(vlan)?;
        security::validate_tenant_id(&tenant_id)?;
        Ok(Self {
            vni,
            vlan,
            tenant_id,
        })
    }

    /// Whether vni and vlan match, ignoring the tenant
    pub fn matches_key(&self, vni: u32, vlan: u16) -> bool {
        self.vni == vni && self.vlan == vlan
    }
}

impl fmt::Display for VniTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.vni, self.vlan, self.tenant_id)
    }
}

impl FromStr for VniTriple {
    type Err = OverlayError;

    fn from_str(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [vni, vlan, tenant] = fields.as_slice() else {
            return Err(OverlayError::Validation(format!(
                "Expected 'vni vlan tenant', got {:?}",
                line
            )));
        };

        let vni = vni
            .parse()
            .map_err(|_| OverlayError::Validation(format!("Invalid VNI: {}", vni)))?;
        let vlan = vlan
            .parse()
            .map_err(|_| OverlayError::Validation(format!("Invalid VLAN: {}", vlan)))?;
        Self::new(vni, vlan, *tenant)
    }
}

/// A triple bound to a tunnel port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VniMapping {
    /// Tunnel port the triple is bound to
    pub port_name: String,
    /// The bound triple
    #[serde(flatten)]
    pub triple: VniTriple,
}

impl fmt::Display for VniMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.port_name, self.triple)
    }
}

/// Which parts of a requested triple appear in the reservation store
///
/// Each field is computed independently: `vni` is true when any reservation
/// carries that VNI, whatever its VLAN or tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReservationMatch {
    /// VNI appears in some reservation
    pub vni: bool,
    /// VLAN appears in some reservation
    pub vlan: bool,
    /// Tenant appears in some reservation
    pub tenant: bool,
    /// One reservation matches all three
    pub full: bool,
}

/// What clearing a port's mappings removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortClearance {
    /// Triples the port's file held
    pub cleared: Vec<VniTriple>,
    /// VLANs of those triples no longer mapped on any port
    pub orphaned_vlans: Vec<u16>,
}
