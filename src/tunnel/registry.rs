//! Read-only view of existing tunnels
//!
//! Nothing is cached: every query goes to the switch so the view is always
//! what the control plane currently reports.

use crate::error::{OverlayError, Result};
use crate::switch::SwitchControl;
use crate::tunnel::{dump, TunnelEndpoint};
use tracing::{debug, warn};

/// Tunnel listing and lookups backed by the switch control plane
pub struct TunnelRegistry<'a> {
    switch: &'a dyn SwitchControl,
}

impl<'a> TunnelRegistry<'a> {
    /// Create a registry view over a switch
    pub fn new(switch: &'a dyn SwitchControl) -> Self {
        Self { switch }
    }

    /// Current `(portName, remoteIP)` pairs
    ///
    /// The structured Interface table is preferred. When the switch cannot
    /// answer that query the `show` dump is parsed instead.
    pub fn list_tunnels(&self) -> Result<Vec<TunnelEndpoint>> {
        match self.switch.list_interfaces_json() {
            Ok(json) => dump::parse_interface_table(&json),
            Err(OverlayError::ControlPlane { command, message }) => {
                warn!(
                    "Structured interface query failed ({}: {}), parsing switch dump",
                    command, message
                );
                let text = self.switch.show()?;
                dump::parse_show_dump(&text)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a port with this name exists on the tunnel bridge
    pub fn port_exists(&self, port_name: &str) -> Result<bool> {
        let exists = self
            .switch
            .list_ports()?
            .iter()
            .any(|p| p == port_name);
        debug!("Port {} exists: {}", port_name, exists);
        Ok(exists)
    }

    /// Tunnel currently targeting `remote_ip`, if any
    pub fn find_by_remote_ip(&self, remote_ip: &str) -> Result<Option<TunnelEndpoint>> {
        Ok(self
            .list_tunnels()?
            .into_iter()
            .find(|t| t.remote_ip == remote_ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::switch::MockSwitchControl;

    const TABLE: &str = r#"{"data":[["tun0","vxlan",["map",[["remote_ip","10.0.0.2"]]]]],"headings":["name","type","options"]}"#;

    #[test]
    fn test_list_tunnels_prefers_structured_query() {
        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_interfaces_json()
            .times(1)
            .returning(|| Ok(TABLE.to_string()));
        switch.expect_show().never();

        let registry = TunnelRegistry::new(&switch);
        assert_eq!(
            registry.list_tunnels().unwrap(),
            vec![TunnelEndpoint::new("tun0", "10.0.0.2")]
        );
    }

    #[test]
    fn test_list_tunnels_falls_back_to_dump() {
        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_interfaces_json()
            .returning(|| Err(OverlayError::control_plane("ovs-vsctl list", "unsupported")));
        switch.expect_show().times(1).returning(|| {
            Ok("    Port gre1\n        Interface gre1\n            type: gre\n            options: {remote_ip=\"10.0.0.3\"}\n".to_string())
        });

        let registry = TunnelRegistry::new(&switch);
        assert_eq!(
            registry.list_tunnels().unwrap(),
            vec![TunnelEndpoint::new("gre1", "10.0.0.3")]
        );
    }

    #[test]
    fn test_find_by_remote_ip() {
        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_interfaces_json()
            .returning(|| Ok(TABLE.to_string()));

        let registry = TunnelRegistry::new(&switch);
        assert_eq!(
            registry.find_by_remote_ip("10.0.0.2").unwrap().map(|t| t.port_name),
            Some("tun0".to_string())
        );
        assert!(registry.find_by_remote_ip("10.0.0.9").unwrap().is_none());
    }

    #[test]
    fn test_port_exists() {
        let mut switch = MockSwitchControl::new();
        switch
            .expect_list_ports()
            .returning(|| Ok(vec!["tun0".to_string(), "gre1".to_string()]));

        let registry = TunnelRegistry::new(&switch);
        assert!(registry.port_exists("gre1").unwrap());
        assert!(!registry.port_exists("tun9").unwrap());
    }
}
