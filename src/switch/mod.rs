//! Virtual switch control plane
//!
//! This module abstracts the switch the overlay ports live on. The agent
//! only ever talks to the switch through [`SwitchControl`]; the production
//! implementation drives Open vSwitch's command line tools.

pub mod commands;
mod ovs;

pub use commands::{gateway_name, SwitchCommand};
pub use ovs::OvsSwitch;

use crate::config::SwitchConfig;
use crate::error::Result;
use crate::tunnel::TunnelType;

/// Switch control-plane operations used by the orchestration core
#[cfg_attr(test, mockall::automock)]
pub trait SwitchControl {
    /// Full human-readable switch dump (`ovs-vsctl show`)
    fn show(&self) -> Result<String>;

    /// Interface table as JSON (`name`, `type`, `options` columns)
    fn list_interfaces_json(&self) -> Result<String>;

    /// Port names on the tunnel bridge
    fn list_ports(&self) -> Result<Vec<String>>;

    /// Create a VXLAN/GRE port on the tunnel bridge
    fn create_tunnel_port(&self, name: &str, remote_ip: &str, tunnel_type: TunnelType)
        -> Result<()>;

    /// Remove a port from the tunnel bridge
    fn remove_port(&self, name: &str) -> Result<()>;

    /// Flow table of a bridge
    fn dump_bridge_flows(&self, bridge: &str) -> Result<String>;

    /// Port statistics of a bridge
    fn dump_port(&self, bridge: &str) -> Result<String>;

    /// Install a flow on a bridge
    fn add_flow(&self, bridge: &str, flow: &str) -> Result<()>;

    /// Delete flows matching a spec
    fn delete_flow(&self, bridge: &str, flow: &str) -> Result<()>;

    /// Delete every flow on a bridge
    fn delete_all_flows(&self, bridge: &str) -> Result<()>;

    /// Create and address the gateway bridge of a VLAN
    fn create_gateway(&self, vlan: u16, address: &str) -> Result<()>;

    /// Remove the gateway bridge of a VLAN
    fn delete_gateway(&self, vlan: u16) -> Result<()>;
}

/// Build the production switch implementation
pub fn get_switch(config: &SwitchConfig) -> Box<dyn SwitchControl> {
    Box::new(OvsSwitch::new(config.clone()))
}
