//! Open vSwitch implementation
//!
//! Runs `ovs-vsctl`, `ovs-ofctl` and `ip` synchronously. Every failure is
//! surfaced with the command line and the tool's stderr; nothing is retried.

use crate::config::SwitchConfig;
use crate::error::{OverlayError, Result};
use crate::switch::commands::{self, SwitchCommand};
use crate::switch::SwitchControl;
use crate::tunnel::TunnelType;
use std::process::Command;
use tracing::{debug, info};

/// Open vSwitch control plane
pub struct OvsSwitch {
    config: SwitchConfig,
}

impl OvsSwitch {
    /// Create a new Open vSwitch control plane
    pub fn new(config: SwitchConfig) -> Self {
        Self { config }
    }

    /// Execute a command, returning stdout on success
    fn run_command(&self, cmd: &SwitchCommand) -> Result<String> {
        debug!("Executing command: {}", cmd);

        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .output()
            .map_err(|e| {
                OverlayError::control_plane(cmd.to_string(), format!("failed to execute: {}", e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OverlayError::control_plane(
                cmd.to_string(),
                format!(
                    "exit code {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl SwitchControl for OvsSwitch {
    fn show(&self) -> Result<String> {
        self.run_command(&commands::build_show_cmd(&self.config))
    }

    fn list_interfaces_json(&self) -> Result<String> {
        self.run_command(&commands::build_list_interfaces_cmd(&self.config))
    }

    fn list_ports(&self) -> Result<Vec<String>> {
        let out = self.run_command(&commands::build_list_ports_cmd(&self.config))?;
        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn create_tunnel_port(
        &self,
        name: &str,
        remote_ip: &str,
        tunnel_type: TunnelType,
    ) -> Result<()> {
        info!(
            "Adding {} port {} -> {} on {}",
            tunnel_type, name, remote_ip, self.config.tunnel_bridge
        );
        let cmd =
            commands::build_add_tunnel_port_cmd(&self.config, name, remote_ip, tunnel_type);
        self.run_command(&cmd)?;
        Ok(())
    }

    fn remove_port(&self, name: &str) -> Result<()> {
        info!("Removing port {} from {}", name, self.config.tunnel_bridge);
        self.run_command(&commands::build_del_port_cmd(&self.config, name))?;
        Ok(())
    }

    fn dump_bridge_flows(&self, bridge: &str) -> Result<String> {
        self.run_command(&commands::build_dump_flows_cmd(&self.config, bridge))
    }

    fn dump_port(&self, bridge: &str) -> Result<String> {
        self.run_command(&commands::build_dump_ports_cmd(&self.config, bridge))
    }

    fn add_flow(&self, bridge: &str, flow: &str) -> Result<()> {
        self.run_command(&commands::build_add_flow_cmd(&self.config, bridge, flow))?;
        Ok(())
    }

    fn delete_flow(&self, bridge: &str, flow: &str) -> Result<()> {
        self.run_command(&commands::build_del_flows_cmd(
            &self.config,
            bridge,
            Some(flow),
        ))?;
        Ok(())
    }

    fn delete_all_flows(&self, bridge: &str) -> Result<()> {
        self.run_command(&commands::build_del_flows_cmd(&self.config, bridge, None))?;
        Ok(())
    }

    fn create_gateway(&self, vlan: u16, address: &str) -> Result<()> {
        info!("Creating gateway {} with {}", commands::gateway_name(vlan), address);
        for cmd in commands::build_add_gateway_cmds(&self.config, vlan, address) {
            self.run_command(&cmd)?;
        }
        Ok(())
    }

    fn delete_gateway(&self, vlan: u16) -> Result<()> {
        info!("Deleting gateway {}", commands::gateway_name(vlan));
        self.run_command(&commands::build_del_gateway_cmd(&self.config, vlan))?;
        Ok(())
    }
}
