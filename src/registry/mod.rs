//! File-backed registries
//!
//! The agent keeps its state in plain whitespace-delimited text files under
//! one network state directory:
//!
//! - `p2p.txt`: peer link registry (`interface local-ip community`)
//! - `vni_reserve`: VNI reservations (`vni vlan tenant`)
//! - `<port>_vni_vlan`: per-tunnel-port VNI mappings (`vni vlan tenant`)
//! - `edgePorts.txt`: management ports of supernode-managed links
//!
//! [`LineFile`] gives append/read/atomic-rewrite access to one such file and
//! [`WriterLock`] enforces a single writer across processes.

mod line_file;
mod lock;

pub use line_file::LineFile;
pub use lock::WriterLock;

use std::path::{Path, PathBuf};

/// Peer link registry file name
pub const LINK_REGISTRY_FILE: &str = "p2p.txt";

/// VNI reservation store file name
pub const RESERVATION_FILE: &str = "vni_reserve";

/// Suffix of per-port VNI mapping files
pub const MAPPING_FILE_SUFFIX: &str = "_vni_vlan";

/// Edge management port registry file name
pub const EDGE_PORTS_FILE: &str = "edgePorts.txt";

/// Lock file guarding all registries
pub const LOCK_FILE: &str = ".lock";

/// Resolved locations of every registry file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    network_dir: PathBuf,
}

impl DataLayout {
    /// Create a layout rooted at `data_prefix/network_dir`
    pub fn new(data_prefix: impl AsRef<Path>, network_dir: impl AsRef<Path>) -> Self {
        Self {
            network_dir: data_prefix.as_ref().join(network_dir),
        }
    }

    /// Network state directory
    pub fn network_dir(&self) -> &Path {
        &self.network_dir
    }

    /// Peer link registry path
    pub fn link_registry_path(&self) -> PathBuf {
        self.network_dir.join(LINK_REGISTRY_FILE)
    }

    /// VNI reservation store path
    pub fn reservations_path(&self) -> PathBuf {
        self.network_dir.join(RESERVATION_FILE)
    }

    /// Mapping file path for a tunnel port
    pub fn mapping_path(&self, port_name: &str) -> PathBuf {
        self.network_dir.join(format!("{}{}", port_name, MAPPING_FILE_SUFFIX))
    }

    /// Edge management port registry path
    pub fn edge_ports_path(&self) -> PathBuf {
        self.network_dir.join(EDGE_PORTS_FILE)
    }

    /// Writer lock path
    pub fn lock_path(&self) -> PathBuf {
        self.network_dir.join(LOCK_FILE)
    }

    /// Tunnel port name encoded in a mapping file name, if it is one
    pub fn port_from_mapping_file(file_name: &str) -> Option<&str> {
        file_name
            .strip_suffix(MAPPING_FILE_SUFFIX)
            .filter(|port| !port.is_empty())
    }
}
