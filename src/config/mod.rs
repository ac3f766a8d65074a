//! Configuration management
//!
//! This module handles parsing and validation of the agent's static TOML
//! configuration. Every path the stores touch is derived from
//! `data_prefix`, which is handed to each component explicitly.

mod validation;

use crate::error::{OverlayError, Result};
use crate::registry::DataLayout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/overlay-agent/config.toml";

/// Environment variable overriding `data_prefix`
pub const DATA_PREFIX_ENV: &str = "OVERLAY_AGENT_DATA_PREFIX";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root under which the network state directory lives
    #[serde(default = "default_data_prefix")]
    pub data_prefix: PathBuf,

    /// State directory, relative to `data_prefix`
    #[serde(default = "default_network_dir")]
    pub network_dir: PathBuf,

    /// Virtual switch settings
    #[serde(default)]
    pub switch: SwitchConfig,

    /// Peer link settings
    #[serde(default)]
    pub peer: PeerConfig,

    /// VNI mapping policy
    #[serde(default)]
    pub mapping: MappingConfig,
}

/// Virtual switch control-plane configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    /// `ovs-vsctl` binary
    #[serde(default = "default_vsctl")]
    pub vsctl: String,

    /// `ovs-ofctl` binary
    #[serde(default = "default_ofctl")]
    pub ofctl: String,

    /// `ip` binary used for gateway addressing
    #[serde(default = "default_ip")]
    pub ip: String,

    /// Bridge that carries VXLAN/GRE tunnel ports
    #[serde(default = "default_tunnel_bridge")]
    pub tunnel_bridge: String,

    /// Parent bridge for VLAN gateway bridges
    #[serde(default = "default_gateway_parent_bridge")]
    pub gateway_parent_bridge: String,
}

/// Peer link (P2P/N2N) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Binary started for plain peer links
    #[serde(default = "default_p2p_binary")]
    pub p2p_binary: String,

    /// Binary started for supernode-managed links
    #[serde(default = "default_edge_binary")]
    pub edge_binary: String,

    /// First management port probed
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,

    /// Exclusive upper bound of the probed range
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,

    /// How long teardown waits for a signalled process to exit
    #[serde(default = "default_teardown_timeout_ms")]
    pub teardown_timeout_ms: u64,

    /// procfs mount used for process lookups
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    /// sysfs network class directory used to list TAP devices
    #[serde(default = "default_sysfs_net")]
    pub sysfs_net: PathBuf,
}

/// VNI mapping policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Refuse to write a mapping unless the whole triple is reserved
    #[serde(default = "default_true")]
    pub require_full_reservation: bool,
}

impl Config {
    /// Create a configuration with built-in defaults
    pub fn new() -> Self {
        Self {
            data_prefix: default_data_prefix(),
            network_dir: default_network_dir(),
            switch: SwitchConfig::default(),
            peer: PeerConfig::default(),
            mapping: MappingConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            OverlayError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml)
            .map_err(|e| OverlayError::Config(format!("Failed to parse TOML config: {}", e)))
    }

    /// Load configuration for the binary
    ///
    /// A missing file at the default location falls back to defaults; a
    /// missing file that was asked for explicitly is an error. Environment
    /// overrides are applied and the result validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(DEFAULT_CONFIG_PATH)?
            }
            None => {
                debug!("No config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                Self::new()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(prefix) = std::env::var(DATA_PREFIX_ENV) {
            if !prefix.is_empty() {
                info!("Data prefix overridden by {}: {}", DATA_PREFIX_ENV, prefix);
                self.data_prefix = PathBuf::from(prefix);
            }
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_relative_dir(&self.network_dir)?;
        self.switch.validate()?;
        self.peer.validate()?;
        Ok(())
    }

    /// Resolve the on-disk layout of all stores
    pub fn layout(&self) -> DataLayout {
        DataLayout::new(&self.data_prefix, &self.network_dir)
    }
}

impl SwitchConfig {
    /// Validate switch configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_non_empty("switch.vsctl", &self.vsctl)?;
        validation::validate_non_empty("switch.ofctl", &self.ofctl)?;
        validation::validate_non_empty("switch.ip", &self.ip)?;
        validation::validate_non_empty("switch.tunnel_bridge", &self.tunnel_bridge)?;
        validation::validate_non_empty(
            "switch.gateway_parent_bridge",
            &self.gateway_parent_bridge,
        )?;
        Ok(())
    }
}

impl PeerConfig {
    /// Validate peer configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_non_empty("peer.p2p_binary", &self.p2p_binary)?;
        validation::validate_non_empty("peer.edge_binary", &self.edge_binary)?;
        validation::validate_port_range(self.port_range_start, self.port_range_end)?;
        validation::validate_timeout(self.teardown_timeout_ms)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            vsctl: default_vsctl(),
            ofctl: default_ofctl(),
            ip: default_ip(),
            tunnel_bridge: default_tunnel_bridge(),
            gateway_parent_bridge: default_gateway_parent_bridge(),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            p2p_binary: default_p2p_binary(),
            edge_binary: default_edge_binary(),
            port_range_start: default_port_range_start(),
            port_range_end: default_port_range_end(),
            teardown_timeout_ms: default_teardown_timeout_ms(),
            proc_root: default_proc_root(),
            sysfs_net: default_sysfs_net(),
        }
    }
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            require_full_reservation: true,
        }
    }
}

// Default value functions for serde
fn default_data_prefix() -> PathBuf {
    PathBuf::from("/")
}

fn default_network_dir() -> PathBuf {
    PathBuf::from("var/subutai-network")
}

fn default_vsctl() -> String {
    "ovs-vsctl".to_string()
}

fn default_ofctl() -> String {
    "ovs-ofctl".to_string()
}

fn default_ip() -> String {
    "ip".to_string()
}

fn default_tunnel_bridge() -> String {
    "br-tun".to_string()
}

fn default_gateway_parent_bridge() -> String {
    "br-int".to_string()
}

fn default_p2p_binary() -> String {
    "p2p".to_string()
}

fn default_edge_binary() -> String {
    "edge".to_string()
}

fn default_port_range_start() -> u16 {
    5645
}

fn default_port_range_end() -> u16 {
    65535
}

fn default_teardown_timeout_ms() -> u64 {
    5000
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_sysfs_net() -> PathBuf {
    PathBuf::from("/sys/class/net")
}

fn default_true() -> bool {
    true
}
