//! Reservation and mapping workflow
//!
//! The engine composes the reservation and mapping stores into the
//! operations callers see. Mapping writes are gated on a full reservation
//! match unless `mapping.require_full_reservation` is turned off.

use crate::config::MappingConfig;
use crate::error::{OverlayError, Result};
use crate::registry::DataLayout;
use crate::security;
use crate::vni::{
    MappingStore, PortClearance, ReservationMatch, ReservationStore, VniMapping, VniTriple,
};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// VNI reservation and mapping engine
pub struct VniEngine {
    reservations: ReservationStore,
    mappings: MappingStore,
    policy: MappingConfig,
}

impl VniEngine {
    /// Create an engine over the stores in `layout`
    pub fn new(layout: &DataLayout, policy: MappingConfig) -> Self {
        Self {
            reservations: ReservationStore::new(layout),
            mappings: MappingStore::new(layout),
            policy,
        }
    }

    /// Reserve a triple
    pub fn reserve(&self, vni: u32, vlan: u16, tenant_id: &str) -> Result<VniTriple> {
        let triple = VniTriple::new(vni, vlan, tenant_id)?;
        self.reservations.reserve(&triple)?;
        Ok(triple)
    }

    /// Reserved triples
    pub fn list_reservations(&self) -> Result<Vec<VniTriple>> {
        self.reservations.list()
    }

    /// Bind a reserved triple to a tunnel port
    pub fn create_mapping(
        &self,
        port_name: &str,
        vni: u32,
        vlan: u16,
        tenant_id: &str,
    ) -> Result<ReservationMatch> {
        security::validate_port_name(port_name)?;
        let triple = VniTriple::new(vni, vlan, tenant_id)?;

        if !self.reservations.exists() {
            return Err(OverlayError::NoReservationsYet);
        }

        self.mappings.ensure(port_name)?;

        let found = self.reservations.check(&triple)?;
        info!("vni {} found: {}", vni, found.vni);
        info!("vlan {} found: {}", vlan, found.vlan);
        info!("tenant {} found: {}", tenant_id, found.tenant);
        info!("reservation found: {}", found.full);

        if !found.full {
            if self.policy.require_full_reservation {
                return Err(OverlayError::ReservationMismatch {
                    vni: found.vni,
                    vlan: found.vlan,
                    tenant: found.tenant,
                });
            }
            warn!(
                "Mapping {} to {} without a matching reservation",
                triple, port_name
            );
        }

        self.mappings.append(port_name, &triple)?;
        Ok(found)
    }

    /// Every mapping across every port
    pub fn list_mappings(&self) -> Result<Vec<VniMapping>> {
        self.mappings.list_all()
    }

    /// Remove the entries of a port matching vni and vlan
    pub fn delete_mapping_entry(&self, port_name: &str, vni: u32, vlan: u16) -> Result<usize> {
        security::validate_port_name(port_name)?;
        self.mappings.delete_entry(port_name, vni, vlan)
    }

    /// Clear every mapping of a port
    ///
    /// Reports the removed triples and the VLANs that were mapped on the
    /// port and are no longer mapped on any other port.
    pub fn delete_all_vni(&self, port_name: &str) -> Result<PortClearance> {
        security::validate_port_name(port_name)?;
        let cleared = self.mappings.clear(port_name)?;

        let still_mapped: BTreeSet<u16> = self
            .mappings
            .list_all()?
            .into_iter()
            .map(|m| m.triple.vlan)
            .collect();

        let orphaned: BTreeSet<u16> = cleared
            .iter()
            .map(|t| t.vlan)
            .filter(|vlan| !still_mapped.contains(vlan))
            .collect();

        Ok(PortClearance {
            cleared,
            orphaned_vlans: orphaned.into_iter().collect(),
        })
    }
}
