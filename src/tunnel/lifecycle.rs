//! Tunnel creation and removal

use crate::error::{OverlayError, Result};
use crate::registry::DataLayout;
use crate::security;
use crate::switch::SwitchControl;
use crate::tunnel::{TunnelEndpoint, TunnelRegistry, TunnelType};
use crate::vni::MappingStore;
use serde::Serialize;
use tracing::{info, warn};

/// Result of a removal request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveOutcome {
    /// Port existed and was removed
    Removed,
    /// Port was already absent; nothing was done
    NotPresent,
}

/// Creates and destroys VXLAN/GRE tunnel ports
pub struct TunnelManager<'a> {
    switch: &'a dyn SwitchControl,
    layout: &'a DataLayout,
}

impl<'a> TunnelManager<'a> {
    /// Create a manager over a switch and the on-disk layout
    pub fn new(switch: &'a dyn SwitchControl, layout: &'a DataLayout) -> Self {
        Self { switch, layout }
    }

    fn registry(&self) -> TunnelRegistry<'a> {
        TunnelRegistry::new(self.switch)
    }

    /// Create a tunnel port
    ///
    /// Every check runs before the switch is asked to change anything, so a
    /// rejected request has no side effects.
    pub fn create_tunnel(
        &self,
        port_name: &str,
        remote_ip: &str,
        tunnel_type: &str,
    ) -> Result<TunnelEndpoint> {
        let tunnel_type: TunnelType = tunnel_type.parse()?;
        security::validate_port_name(port_name)?;
        security::validate_ip_address(remote_ip)?;

        let registry = self.registry();
        if registry.port_exists(port_name)? {
            return Err(OverlayError::PortNameInUse(port_name.to_string()));
        }
        if let Some(existing) = registry.find_by_remote_ip(remote_ip)? {
            return Err(OverlayError::DuplicateRemoteIp {
                remote_ip: remote_ip.to_string(),
                port_name: existing.port_name,
            });
        }

        info!(
            "Creating {} tunnel {} to {}",
            tunnel_type, port_name, remote_ip
        );
        self.switch
            .create_tunnel_port(port_name, remote_ip, tunnel_type)
            .map_err(|e| OverlayError::TunnelCreationFailed {
                port_name: port_name.to_string(),
                message: e.to_string(),
            })?;

        Ok(TunnelEndpoint::new(port_name, remote_ip))
    }

    /// Current tunnels
    pub fn list_tunnels(&self) -> Result<Vec<TunnelEndpoint>> {
        self.registry().list_tunnels()
    }

    /// Remove a tunnel port and its VNI mapping file
    pub fn remove_tunnel(&self, port_name: &str) -> Result<RemoveOutcome> {
        if !self.registry().port_exists(port_name)? {
            info!("Tunnel {} does not exist, nothing to remove", port_name);
            return Ok(RemoveOutcome::NotPresent);
        }

        self.switch.remove_port(port_name)?;
        info!("Removed tunnel {}", port_name);

        match MappingStore::new(self.layout).remove_file(port_name) {
            Ok(true) => info!("Removed VNI mappings of {}", port_name),
            Ok(false) => warn!("No VNI mapping file for {}", port_name),
            Err(e) => warn!("Failed to remove VNI mappings of {}: {}", port_name, e),
        }

        Ok(RemoveOutcome::Removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::LineFile;
    use crate::switch::MockSwitchControl;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    const ONE_TUNNEL: &str = r#"{"data":[["tun0","vxlan",["map",[["remote_ip","10.0.0.2"]]]]],"headings":["name","type","options"]}"#;

    fn layout(dir: &TempDir) -> DataLayout {
        DataLayout::new(dir.path(), "var/subutai-network")
    }

    #[test]
    fn test_invalid_type_makes_no_switch_call() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        // No expectations: any call on the mock panics
        let switch = MockSwitchControl::new();
        let manager = TunnelManager::new(&switch, &layout);

        let result = manager.create_tunnel("tun1", "10.0.0.5", "geneve");
        assert!(matches!(result, Err(OverlayError::InvalidTunnelType(_))));
    }

    #[test]
    fn test_invalid_port_name_makes_no_switch_call() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let switch = MockSwitchControl::new();
        let manager = TunnelManager::new(&switch, &layout);

        let result = manager.create_tunnel("this-name-is-far-too-long", "10.0.0.5", "vxlan");
        assert!(matches!(result, Err(OverlayError::InvalidPortName { .. })));
    }

    #[test]
    fn test_duplicate_remote_ip() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_ports()
            .returning(|| Ok(vec!["tun0".to_string()]));
        switch
            .expect_list_interfaces_json()
            .returning(|| Ok(ONE_TUNNEL.to_string()));
        switch.expect_create_tunnel_port().never();

        let manager = TunnelManager::new(&switch, &layout);
        match manager.create_tunnel("tun1", "10.0.0.2", "gre") {
            Err(OverlayError::DuplicateRemoteIp { port_name, .. }) => {
                assert_eq!(port_name, "tun0")
            }
            other => panic!("Expected DuplicateRemoteIp, got {:?}", other),
        }
    }

    #[test]
    fn test_port_name_in_use() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_ports()
            .returning(|| Ok(vec!["tun0".to_string()]));
        switch.expect_create_tunnel_port().never();

        let manager = TunnelManager::new(&switch, &layout);
        assert!(matches!(
            manager.create_tunnel("tun0", "10.0.0.9", "vxlan"),
            Err(OverlayError::PortNameInUse(_))
        ));
    }

    #[test]
    fn test_create_tunnel() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_ports()
            .returning(|| Ok(vec!["tun0".to_string()]));
        switch
            .expect_list_interfaces_json()
            .returning(|| Ok(ONE_TUNNEL.to_string()));
        switch
            .expect_create_tunnel_port()
            .with(eq("tun1"), eq("10.0.0.3"), eq(TunnelType::Gre))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let manager = TunnelManager::new(&switch, &layout);
        let ep = manager.create_tunnel("tun1", "10.0.0.3", "gre").unwrap();
        assert_eq!(ep.to_string(), "tun1-10.0.0.3");
    }

    #[test]
    fn test_control_plane_failure_is_creation_failure() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let mut switch = MockSwitchControl::new();
        switch.expect_list_ports().returning(|| Ok(Vec::new()));
        switch
            .expect_list_interfaces_json()
            .returning(|| Ok(r#"{"data":[],"headings":["name","type","options"]}"#.to_string()));
        switch
            .expect_create_tunnel_port()
            .returning(|_, _, _| Err(OverlayError::control_plane("ovs-vsctl add-port", "boom")));

        let manager = TunnelManager::new(&switch, &layout);
        match manager.create_tunnel("tun1", "10.0.0.3", "vxlan") {
            Err(OverlayError::TunnelCreationFailed { port_name, message }) => {
                assert_eq!(port_name, "tun1");
                assert!(message.contains("boom"));
            }
            other => panic!("Expected TunnelCreationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_remove_absent_tunnel_is_noop() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let mut switch = MockSwitchControl::new();
        switch.expect_list_ports().returning(|| Ok(Vec::new()));
        switch.expect_remove_port().never();

        let manager = TunnelManager::new(&switch, &layout);
        assert_eq!(
            manager.remove_tunnel("tun0").unwrap(),
            RemoveOutcome::NotPresent
        );
    }

    #[test]
    fn test_remove_tunnel_deletes_mapping_file() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let mapping = LineFile::new(layout.mapping_path("tun0"));
        mapping.append("100 20 tenantA").unwrap();

        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_ports()
            .returning(|| Ok(vec!["tun0".to_string()]));
        switch
            .expect_remove_port()
            .with(eq("tun0"))
            .times(1)
            .returning(|_| Ok(()));

        let manager = TunnelManager::new(&switch, &layout);
        assert_eq!(manager.remove_tunnel("tun0").unwrap(), RemoveOutcome::Removed);
        assert!(!mapping.exists());
    }

    #[test]
    fn test_remove_tunnel_without_mapping_file() {
        let dir = TempDir::new().unwrap();
        let layout = layout(&dir);
        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_ports()
            .returning(|| Ok(vec!["gre1".to_string()]));
        switch.expect_remove_port().times(1).returning(|_| Ok(()));

        let manager = TunnelManager::new(&switch, &layout);
        assert_eq!(manager.remove_tunnel("gre1").unwrap(), RemoveOutcome::Removed);
    }
}
