//! Peer link lifecycle

use crate::config::PeerConfig;
use crate::error::{OverlayError, Result};
use crate::p2p::{
    allocate_port, check_explicit_port, EdgeParams, LinkRecord, LinkRegistry, ManagedLinkRequest,
    PortProber, ProcessControl,
};
use crate::registry::DataLayout;
use crate::security;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A started link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpawnedLink {
    /// Registered record
    pub record: LinkRecord,
    /// Pid of the link process
    pub pid: i32,
}

/// A started supernode-managed link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedLink {
    /// Registered record
    pub record: LinkRecord,
    /// Pid of the edge process
    pub pid: i32,
    /// Management port handed to the edge
    pub management_port: u16,
}

/// Result of tearing a link down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TeardownOutcome {
    /// Process that was signalled; `None` when none was running
    pub pid: Option<i32>,
    /// Registry lines dropped
    pub removed: usize,
}

/// Registry record with the state of its process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    /// Registered record
    #[serde(flatten)]
    pub record: LinkRecord,
    /// Live process, if any
    pub pid: Option<i32>,
}

/// Creates, lists and tears down peer links
pub struct PeerLinkManager<'a> {
    config: &'a PeerConfig,
    registry: LinkRegistry,
    process: &'a dyn ProcessControl,
    prober: &'a dyn PortProber,
}

impl<'a> PeerLinkManager<'a> {
    /// Create a manager
    pub fn new(
        config: &'a PeerConfig,
        layout: &DataLayout,
        process: &'a dyn ProcessControl,
        prober: &'a dyn PortProber,
    ) -> Self {
        Self {
            config,
            registry: LinkRegistry::new(layout),
            process,
            prober,
        }
    }

    /// Register a link and start its P2P daemon
    ///
    /// The registry line is written before the process starts and removed
    /// again if the process cannot be started.
    pub fn create_link(
        &self,
        interface: &str,
        community: &str,
        local_ip: &str,
    ) -> Result<SpawnedLink> {
        let record = LinkRecord::new(interface, local_ip, community)?;
        info!(
            "Creating link {} in {} with local address {}",
            interface, community, local_ip
        );

        self.registry.ensure()?;
        self.registry.append(&record)?;

        match self.process.spawn_p2p(&record) {
            Ok(pid) => Ok(SpawnedLink { record, pid }),
            Err(e) => {
                self.registry.rollback(&record)?;
                Err(OverlayError::LinkStartFailed {
                    interface: interface.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Register a supernode-managed link and start its edge
    pub fn create_managed_link(&self, request: &ManagedLinkRequest) -> Result<ManagedLink> {
        let record = LinkRecord::new(&request.interface, &request.local_ip, &request.community)?;
        security::validate_ip_address(&request.supernode_ip)?;
        security::validate_token("Key", &request.key)?;
        info!(
            "Creating managed link {} in {} via supernode {}:{}",
            record.interface, record.community, request.supernode_ip, request.supernode_port
        );

        self.registry.ensure_edge_ports()?;

        let management_port = match request.management_port {
            Some(port) => check_explicit_port(self.prober, port)?,
            None => allocate_port(
                self.prober,
                self.config.port_range_start,
                self.config.port_range_end,
            )?,
        };

        let params = EdgeParams {
            record: record.clone(),
            supernode_ip: request.supernode_ip.clone(),
            supernode_port: request.supernode_port,
            key_type: request.key_type,
            key: request.key.clone(),
            management_port,
        };

        self.registry.ensure()?;
        self.registry.append(&record)?;
        self.registry
            .append_edge_port(&record.interface, &record.community, management_port)?;

        match self.process.spawn_edge(&params) {
            Ok(pid) => Ok(ManagedLink {
                record,
                pid,
                management_port,
            }),
            Err(e) => {
                self.registry.rollback(&record)?;
                self.registry.rollback_edge_port(
                    &record.interface,
                    &record.community,
                    management_port,
                )?;
                Err(OverlayError::LinkStartFailed {
                    interface: record.interface,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Stop the link of `interface` in `community` and drop its records
    pub fn remove_link(&self, interface: &str, community: &str) -> Result<TeardownOutcome> {
        security::validate_interface_name(interface)?;
        security::validate_community_name(community)?;
        info!("Removing link {} in {}", interface, community);

        let pid = self.process.find_pid(interface, community)?;
        self.teardown(pid, interface, Some(community))
    }

    /// Stop whatever link process serves `interface` and drop its records
    pub fn remove_generic_link(&self, interface: &str) -> Result<TeardownOutcome> {
        security::validate_interface_name(interface)?;
        info!("Removing link {}", interface);

        let pid = self.process.find_pid_by_interface(interface)?;
        self.teardown(pid, interface, None)
    }

    /// Tear down a registered link and start it again
    pub fn reload_link(&self, interface: &str, community: &str) -> Result<SpawnedLink> {
        security::validate_interface_name(interface)?;
        security::validate_community_name(community)?;
        let record = self.registry.find(interface, community)?.ok_or_else(|| {
            OverlayError::Validation(format!(
                "Link {} in {} is not registered",
                interface, community
            ))
        })?;

        if let Some(port) = self.registry.edge_port(interface, community)? {
            return Err(OverlayError::Validation(format!(
                "Link {} in {} is supernode-managed (management port {}); recreate it instead",
                interface, community, port
            )));
        }

        self.remove_link(interface, community)?;
        let link = self.create_link(&record.interface, &record.community, &record.local_ip)?;
        info!("Reloaded link {} in {}", interface, community);
        Ok(link)
    }

    /// Registered links and their processes
    pub fn list_links(&self) -> Result<Vec<LinkStatus>> {
        self.registry
            .list()?
            .into_iter()
            .map(|record| {
                let pid = self.process.find_pid(&record.interface, &record.community)?;
                if pid.is_none() {
                    warn!("Link {} has no running process", record);
                }
                Ok(LinkStatus { record, pid })
            })
            .collect()
    }

    /// TAP/TUN interfaces present on the host
    pub fn list_tap_devices(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.config.sysfs_net) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.path().join("tun_flags").exists() {
                devices.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        devices.sort();
        Ok(devices)
    }

    fn teardown(
        &self,
        pid: Option<i32>,
        interface: &str,
        community: Option<&str>,
    ) -> Result<TeardownOutcome> {
        match pid {
            Some(pid) => {
                self.process.signal_hangup(pid)?;
                self.wait_for_exit(pid)?;
            }
            None => info!("No running process for {}", interface),
        }

        let removed = self.registry.remove_matching(interface, community)?;
        info!("Dropped {} registry line(s) for {}", removed, interface);
        Ok(TeardownOutcome { pid, removed })
    }

    fn wait_for_exit(&self, pid: i32) -> Result<()> {
        let timeout = Duration::from_millis(self.config.teardown_timeout_ms);
        let started = Instant::now();

        while self.process.is_alive(pid) {
            if started.elapsed() >= timeout {
                return Err(OverlayError::LinkTeardownTimeout {
                    pid,
                    timeout_ms: self.config.teardown_timeout_ms,
                });
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }

        Ok(())
    }
}
