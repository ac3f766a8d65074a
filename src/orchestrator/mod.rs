//! Orchestration facade
//!
//! The [`Orchestrator`] is the one entry point callers use. It owns the
//! configuration and the collaborators, composes the tunnel, VNI and peer
//! link components per operation and holds the registry writer lock for
//! the duration of every operation that changes state.

use crate::config::Config;
use crate::error::Result;
use crate::p2p::{
    LinkStatus, ManagedLink, ManagedLinkRequest, PeerLinkManager, PortProber, ProcessControl,
    SpawnedLink, SystemProcess, TeardownOutcome, UdpPortProber,
};
use crate::registry::{DataLayout, WriterLock};
use crate::security;
use crate::switch::{self, SwitchControl};
use crate::tunnel::{RemoveOutcome, TunnelEndpoint, TunnelManager};
use crate::vni::{ReservationMatch, VniEngine, VniMapping, VniTriple};
use serde::Serialize;
use tracing::{debug, info};

/// Result of the compound VNI teardown of a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VniTeardown {
    /// Port whose mappings were cleared
    pub port_name: String,
    /// Mappings that were removed
    pub cleared: Vec<VniTriple>,
    /// VLANs whose gateway was deleted
    pub gateways_removed: Vec<u16>,
}

/// Entry surface composing every component
pub struct Orchestrator {
    config: Config,
    layout: DataLayout,
    switch: Box<dyn SwitchControl>,
    process: Box<dyn ProcessControl>,
    prober: Box<dyn PortProber>,
}

impl Orchestrator {
    /// Create an orchestrator driving the host's switch and processes
    pub fn new(config: Config) -> Self {
        let switch = switch::get_switch(&config.switch);
        let process = Box::new(SystemProcess::new(config.peer.clone()));
        Self::with_collaborators(config, switch, process, Box::new(UdpPortProber))
    }

    /// Create an orchestrator over explicit collaborators
    pub fn with_collaborators(
        config: Config,
        switch: Box<dyn SwitchControl>,
        process: Box<dyn ProcessControl>,
        prober: Box<dyn PortProber>,
    ) -> Self {
        let layout = config.layout();
        debug!("Registry directory: {:?}", layout.network_dir());
        Self {
            config,
            layout,
            switch,
            process,
            prober,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolved registry layout
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    fn lock(&self) -> Result<WriterLock> {
        WriterLock::acquire(self.layout.lock_path())
    }

    fn tunnels(&self) -> TunnelManager<'_> {
        TunnelManager::new(self.switch.as_ref(), &self.layout)
    }

    fn vni(&self) -> VniEngine {
        VniEngine::new(&self.layout, self.config.mapping.clone())
    }

    fn links(&self) -> PeerLinkManager<'_> {
        PeerLinkManager::new(
            &self.config.peer,
            &self.layout,
            self.process.as_ref(),
            self.prober.as_ref(),
        )
    }

    // Tunnels

    /// Create a VXLAN/GRE tunnel port
    pub fn create_tunnel(
        &self,
        port_name: &str,
        remote_ip: &str,
        tunnel_type: &str,
    ) -> Result<TunnelEndpoint> {
        let _lock = self.lock()?;
        self.tunnels().create_tunnel(port_name, remote_ip, tunnel_type)
    }

    /// Current tunnels
    pub fn list_tunnels(&self) -> Result<Vec<TunnelEndpoint>> {
        self.tunnels().list_tunnels()
    }

    /// Remove a tunnel port and its mappings
    pub fn remove_tunnel(&self, port_name: &str) -> Result<RemoveOutcome> {
        let _lock = self.lock()?;
        self.tunnels().remove_tunnel(port_name)
    }

    // VNI reservations and mappings

    /// Reserve a `(vni, vlan, tenant)` triple
    pub fn reserve_vni(&self, vni: u32, vlan: u16, tenant_id: &str) -> Result<VniTriple> {
        let _lock = self.lock()?;
        self.vni().reserve(vni, vlan, tenant_id)
    }

    /// Reserved triples
    pub fn list_reservations(&self) -> Result<Vec<VniTriple>> {
        self.vni().list_reservations()
    }

    /// Bind a reserved triple to a tunnel port
    pub fn create_mapping(
        &self,
        port_name: &str,
        vni: u32,
        vlan: u16,
        tenant_id: &str,
    ) -> Result<ReservationMatch> {
        let _lock = self.lock()?;
        self.vni().create_mapping(port_name, vni, vlan, tenant_id)
    }

    /// Every mapping across every port
    pub fn list_mappings(&self) -> Result<Vec<VniMapping>> {
        self.vni().list_mappings()
    }

    /// Remove a port's mappings matching vni and vlan
    pub fn delete_mapping_entry(&self, port_name: &str, vni: u32, vlan: u16) -> Result<usize> {
        let _lock = self.lock()?;
        self.vni().delete_mapping_entry(port_name, vni, vlan)
    }

    /// Clear every mapping of a port and drop the gateways left unused
    pub fn delete_all_vni(&self, port_name: &str) -> Result<VniTeardown> {
        let _lock = self.lock()?;
        let clearance = self.vni().delete_all_vni(port_name)?;

        for vlan in &clearance.orphaned_vlans {
            self.switch.delete_gateway(*vlan)?;
        }

        info!(
            "Cleared {} VNI mapping(s) of {}, removed {} gateway(s)",
            clearance.cleared.len(),
            port_name,
            clearance.orphaned_vlans.len()
        );
        Ok(VniTeardown {
            port_name: port_name.to_string(),
            cleared: clearance.cleared,
            gateways_removed: clearance.orphaned_vlans,
        })
    }

    // Peer links

    /// Register and start a peer link
    pub fn create_link(
        &self,
        interface: &str,
        community: &str,
        local_ip: &str,
    ) -> Result<SpawnedLink> {
        let _lock = self.lock()?;
        self.links().create_link(interface, community, local_ip)
    }

    /// Register and start a supernode-managed link
    pub fn create_managed_link(&self, request: &ManagedLinkRequest) -> Result<ManagedLink> {
        let _lock = self.lock()?;
        self.links().create_managed_link(request)
    }

    /// Stop a peer link and drop its registry lines
    pub fn remove_link(&self, interface: &str, community: &str) -> Result<TeardownOutcome> {
        let _lock = self.lock()?;
        self.links().remove_link(interface, community)
    }

    /// Stop the link process of an interface, whatever its community
    pub fn remove_generic_link(&self, interface: &str) -> Result<TeardownOutcome> {
        let _lock = self.lock()?;
        self.links().remove_generic_link(interface)
    }

    /// Stop and restart a registered peer link
    pub fn reload_link(&self, interface: &str, community: &str) -> Result<SpawnedLink> {
        let _lock = self.lock()?;
        self.links().reload_link(interface, community)
    }

    /// Registered links with their processes
    pub fn list_links(&self) -> Result<Vec<LinkStatus>> {
        self.links().list_links()
    }

    /// TAP/TUN interfaces on the host
    pub fn list_tap_devices(&self) -> Result<Vec<String>> {
        self.links().list_tap_devices()
    }

    // Switch pass-through

    /// Flow table of a bridge
    pub fn show_flow(&self, bridge: &str) -> Result<String> {
        self.switch.dump_bridge_flows(bridge)
    }

    /// Port statistics of a bridge
    pub fn show_port(&self, bridge: &str) -> Result<String> {
        self.switch.dump_port(bridge)
    }

    /// Install a flow
    pub fn add_flow(&self, bridge: &str, flow: &str) -> Result<()> {
        self.switch.add_flow(bridge, flow)?;
        info!("Flow configuration added to {}", bridge);
        Ok(())
    }

    /// Delete matching flows, or every flow when no spec is given
    pub fn delete_flow(&self, bridge: &str, flow: Option<&str>) -> Result<()> {
        match flow {
            Some(flow) => self.switch.delete_flow(bridge, flow)?,
            None => self.switch.delete_all_flows(bridge)?,
        }
        info!("Flows deleted from {}", bridge);
        Ok(())
    }

    /// Create the gateway bridge of a VLAN
    pub fn create_gateway(&self, vlan: u16, address: &str) -> Result<()> {
        security::validate_vlan(vlan)?;
        security::validate_cidr(address)?;
        self.switch.create_gateway(vlan, address)
    }

    /// Remove the gateway bridge of a VLAN
    pub fn delete_gateway(&self, vlan: u16) -> Result<()> {
        security::validate_vlan(vlan)?;
        self.switch.delete_gateway(vlan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverlayError;
    use crate::p2p::{MockPortProber, MockProcessControl};
    use crate::switch::MockSwitchControl;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    fn orchestrator(dir: &TempDir, switch: MockSwitchControl) -> Orchestrator {
        let mut config = Config::new();
        config.data_prefix = dir.path().to_path_buf();
        Orchestrator::with_collaborators(
            config,
            Box::new(switch),
            Box::new(MockProcessControl::new()),
            Box::new(MockPortProber::new()),
        )
    }

    #[test]
    fn test_delete_all_vni_drops_orphaned_gateways() {
        let dir = TempDir::new().unwrap();
        let mut switch = MockSwitchControl::new();
        switch
            .expect_delete_gateway()
            .with(eq(20))
            .times(1)
            .returning(|_| Ok(()));
        let orch = orchestrator(&dir, switch);

        orch.reserve_vni(100, 20, "tenantA").unwrap();
        orch.reserve_vni(200, 30, "tenantB").unwrap();
        orch.create_mapping("tun0", 100, 20, "tenantA").unwrap();
        orch.create_mapping("tun0", 200, 30, "tenantB").unwrap();
        orch.create_mapping("tun1", 200, 30, "tenantB").unwrap();

        let teardown = orch.delete_all_vni("tun0").unwrap();
        assert_eq!(teardown.cleared.len(), 2);
        assert_eq!(teardown.gateways_removed, vec![20]);
        assert_eq!(orch.list_mappings().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_flow_without_spec_deletes_all() {
        let dir = TempDir::new().unwrap();
        let mut switch = MockSwitchControl::new();
        switch
            .expect_delete_all_flows()
            .with(eq("br-int"))
            .times(1)
            .returning(|_| Ok(()));
        switch.expect_delete_flow().never();

        orchestrator(&dir, switch).delete_flow("br-int", None).unwrap();
    }

    #[test]
    fn test_create_gateway_validates_input() {
        let dir = TempDir::new().unwrap();
        let mut switch = MockSwitchControl::new();
        switch.expect_create_gateway().never();
        let orch = orchestrator(&dir, switch);

        assert!(orch.create_gateway(0, "10.0.0.1/24").is_err());
        assert!(orch.create_gateway(20, "10.0.0.1").is_err());
    }

    #[test]
    fn test_mutations_fail_while_locked() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir, MockSwitchControl::new());

        let _held = WriterLock::acquire(orch.layout().lock_path()).unwrap();
        assert!(matches!(
            orch.reserve_vni(100, 20, "tenantA"),
            Err(OverlayError::RegistryLocked(_))
        ));
        // Reads do not need the lock
        assert!(orch.list_mappings().unwrap().is_empty());
    }
}
