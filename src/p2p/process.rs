//! Link process control
//!
//! Link processes are started detached and found again later by scanning
//! procfs for a process of the link binary whose arguments carry the
//! interface (and community) of the link.

use crate::config::PeerConfig;
use crate::error::{OverlayError, Result};
use crate::p2p::{KeyType, LinkRecord};
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Fully resolved arguments of an N2N edge process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeParams {
    /// Link being started
    pub record: LinkRecord,
    /// Supernode address
    pub supernode_ip: String,
    /// Supernode UDP port
    pub supernode_port: u16,
    /// How `key` is passed
    pub key_type: KeyType,
    /// Key file path or inline key
    pub key: String,
    /// Management port
    pub management_port: u16,
}

impl EdgeParams {
    /// Command line arguments for the edge binary
    pub fn args(&self) -> Vec<String> {
        let key_flag = match self.key_type {
            KeyType::File => "-K",
            KeyType::Inline => "-k",
        };
        vec![
            "-d".to_string(),
            self.record.interface.clone(),
            "-a".to_string(),
            self.record.local_ip.clone(),
            "-c".to_string(),
            self.record.community.clone(),
            "-l".to_string(),
            format!("{}:{}", self.supernode_ip, self.supernode_port),
            key_flag.to_string(),
            self.key.clone(),
            "-t".to_string(),
            self.management_port.to_string(),
        ]
    }
}

/// Command line arguments for the P2P daemon
pub fn p2p_args(record: &LinkRecord) -> Vec<String> {
    vec![
        "-dev".to_string(),
        record.interface.clone(),
        "-ip".to_string(),
        record.local_ip.clone(),
        "-hash".to_string(),
        record.community.clone(),
    ]
}

/// Starting, finding and signalling link processes
#[cfg_attr(test, mockall::automock)]
pub trait ProcessControl {
    /// Start the P2P daemon for a link, returning its pid
    fn spawn_p2p(&self, record: &LinkRecord) -> Result<i32>;

    /// Start an N2N edge, returning its pid
    fn spawn_edge(&self, params: &EdgeParams) -> Result<i32>;

    /// Pid of the process serving `interface` in `community`
    fn find_pid(&self, interface: &str, community: &str) -> Result<Option<i32>>;

    /// Pid of any link process serving `interface`
    fn find_pid_by_interface(&self, interface: &str) -> Result<Option<i32>>;

    /// Deliver SIGHUP
    fn signal_hangup(&self, pid: i32) -> Result<()>;

    /// Whether the process still exists
    fn is_alive(&self, pid: i32) -> bool;
}

/// Link processes on the local host
pub struct SystemProcess {
    config: PeerConfig,
}

impl SystemProcess {
    /// Create process control from peer settings
    pub fn new(config: PeerConfig) -> Self {
        Self { config }
    }

    fn spawn(&self, program: &str, args: &[String]) -> Result<i32> {
        debug!("Spawning {} {}", program, args.join(" "));
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let pid = i32::try_from(child.id())
            .map_err(|_| OverlayError::Validation(format!("pid {} out of range", child.id())))?;
        info!("Started {} with pid {}", program, pid);
        Ok(pid)
    }

    /// Scan procfs for a link process whose arguments satisfy `wanted`
    fn scan<F>(&self, wanted: F) -> Result<Option<i32>>
    where
        F: Fn(&[String]) -> bool,
    {
        let binaries = [
            binary_name(&self.config.p2p_binary),
            binary_name(&self.config.edge_binary),
        ];

        let mut found = None;
        for entry in fs::read_dir(&self.config.proc_root)? {
            let entry = entry?;
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<i32>().ok())
            else {
                continue;
            };

            // Processes may exit while we scan
            let Ok(raw) = fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let argv = parse_cmdline(&raw);
            let Some(program) = argv.first() else {
                continue;
            };

            if binaries.contains(&binary_name(program)) && wanted(&argv[1..]) {
                debug!("Found link process {}: {}", pid, argv.join(" "));
                found = Some(found.map_or(pid, |p: i32| p.min(pid)));
            }
        }

        Ok(found)
    }
}

impl ProcessControl for SystemProcess {
    fn spawn_p2p(&self, record: &LinkRecord) -> Result<i32> {
        self.spawn(&self.config.p2p_binary, &p2p_args(record))
    }

    fn spawn_edge(&self, params: &EdgeParams) -> Result<i32> {
        self.spawn(&self.config.edge_binary, &params.args())
    }

    fn find_pid(&self, interface: &str, community: &str) -> Result<Option<i32>> {
        self.scan(|args| {
            args.iter().any(|a| a == interface) && args.iter().any(|a| a == community)
        })
    }

    fn find_pid_by_interface(&self, interface: &str) -> Result<Option<i32>> {
        self.scan(|args| args.iter().any(|a| a == interface))
    }

    fn signal_hangup(&self, pid: i32) -> Result<()> {
        let result = unsafe { libc::kill(pid, libc::SIGHUP) };
        if result != 0 {
            return Err(OverlayError::SignalDeliveryFailed {
                pid,
                message: std::io::Error::last_os_error().to_string(),
            });
        }
        info!("Sent SIGHUP to {}", pid);
        Ok(())
    }

    fn is_alive(&self, pid: i32) -> bool {
        if unsafe { libc::kill(pid, 0) } == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

/// Split a NUL-separated `/proc/<pid>/cmdline`
fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

fn binary_name(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(program)
}
