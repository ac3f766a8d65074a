//! Command builders for Open vSwitch operations
//!
//! Builders only assemble argument vectors; nothing goes through a shell, so
//! names and flow specs are passed to the tools verbatim.

use crate::config::SwitchConfig;
use crate::tunnel::TunnelType;
use std::fmt;

/// Prefix of VLAN gateway bridge names
pub const GATEWAY_PREFIX: &str = "gw-";

/// A fully resolved external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchCommand {
    /// Program to execute
    pub program: String,
    /// Arguments, one per element
    pub args: Vec<String>,
}

impl SwitchCommand {
    fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for SwitchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Name of the gateway bridge for a VLAN
pub fn gateway_name(vlan: u16) -> String {
    format!("{}{}", GATEWAY_PREFIX, vlan)
}

/// Build the full switch dump command
pub fn build_show_cmd(cfg: &SwitchConfig) -> SwitchCommand {
    SwitchCommand::new(&cfg.vsctl, &["show"])
}

/// Build the structured Interface table query
pub fn build_list_interfaces_cmd(cfg: &SwitchConfig) -> SwitchCommand {
    SwitchCommand::new(
        &cfg.vsctl,
        &[
            "--format=json",
            "--columns=name,type,options",
            "list",
            "Interface",
        ],
    )
}

/// Build the tunnel bridge port listing command
pub fn build_list_ports_cmd(cfg: &SwitchConfig) -> SwitchCommand {
    SwitchCommand::new(&cfg.vsctl, &["list-ports", &cfg.tunnel_bridge])
}

/// Build tunnel port creation command
///
/// `--may-exist` keeps a repeated request from failing on the port itself.
pub fn build_add_tunnel_port_cmd(
    cfg: &SwitchConfig,
    name: &str,
    remote_ip: &str,
    tunnel_type: TunnelType,
) -> SwitchCommand {
    let type_opt = format!("type={}", tunnel_type);
    let remote_opt = format!("options:remote_ip={}", remote_ip);
    SwitchCommand::new(
        &cfg.vsctl,
        &[
            "--may-exist",
            "add-port",
            &cfg.tunnel_bridge,
            name,
            "--",
            "set",
            "interface",
            name,
            &type_opt,
            "options:stp_enable=true",
            "options:key=flow",
            &remote_opt,
        ],
    )
}

/// Build port removal command
pub fn build_del_port_cmd(cfg: &SwitchConfig, name: &str) -> SwitchCommand {
    SwitchCommand::new(
        &cfg.vsctl,
        &["--if-exists", "del-port", &cfg.tunnel_bridge, name],
    )
}

/// Build flow table dump command
pub fn build_dump_flows_cmd(cfg: &SwitchConfig, bridge: &str) -> SwitchCommand {
    SwitchCommand::new(&cfg.ofctl, &["dump-flows", bridge])
}

/// Build port statistics dump command
pub fn build_dump_ports_cmd(cfg: &SwitchConfig, bridge: &str) -> SwitchCommand {
    SwitchCommand::new(&cfg.ofctl, &["dump-ports", bridge])
}

/// Build flow insertion command
pub fn build_add_flow_cmd(cfg: &SwitchConfig, bridge: &str, flow: &str) -> SwitchCommand {
    SwitchCommand::new(&cfg.ofctl, &["add-flow", bridge, flow])
}

/// Build flow deletion command; no spec deletes every flow
pub fn build_del_flows_cmd(
    cfg: &SwitchConfig,
    bridge: &str,
    flow: Option<&str>,
) -> SwitchCommand {
    match flow {
        Some(flow) => SwitchCommand::new(&cfg.ofctl, &["del-flows", bridge, flow]),
        None => SwitchCommand::new(&cfg.ofctl, &["del-flows", bridge]),
    }
}

/// Build the commands that create and address a VLAN gateway
pub fn build_add_gateway_cmds(cfg: &SwitchConfig, vlan: u16, address: &str) -> Vec<SwitchCommand> {
    let gw = gateway_name(vlan);
    let vlan = vlan.to_string();
    vec![
        SwitchCommand::new(
            &cfg.vsctl,
            &[
                "--may-exist",
                "add-br",
                &gw,
                &cfg.gateway_parent_bridge,
                &vlan,
            ],
        ),
        SwitchCommand::new(&cfg.ip, &["addr", "replace", address, "dev", &gw]),
        SwitchCommand::new(&cfg.ip, &["link", "set", "dev", &gw, "up"]),
    ]
}

/// Build gateway removal command
pub fn build_del_gateway_cmd(cfg: &SwitchConfig, vlan: u16) -> SwitchCommand {
    SwitchCommand::new(&cfg.vsctl, &["--if-exists", "del-br", &gateway_name(vlan)])
}
