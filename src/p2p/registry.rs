//! Link registry and edge management port registry

use crate::error::Result;
use crate::p2p::LinkRecord;
use crate::registry::{DataLayout, LineFile};
use tracing::{debug, info, warn};

/// Whether a registry line belongs to a link
///
/// A line matches when it starts with `interface` and, if a community is
/// given, ends with it. This is a textual test on the raw line: `p2p1`
/// also matches a line for `p2p10`.
pub fn line_matches(line: &str, interface: &str, community: Option<&str>) -> bool {
    line.starts_with(interface) && community.map_or(true, |c| line.ends_with(c))
}

/// `p2p.txt` and `edgePorts.txt`
#[derive(Debug, Clone)]
pub struct LinkRegistry {
    links: LineFile,
    edge_ports: LineFile,
}

impl LinkRegistry {
    /// Registry located by the data layout
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            links: LineFile::new(layout.link_registry_path()),
            edge_ports: LineFile::new(layout.edge_ports_path()),
        }
    }

    /// Create the link registry if missing
    pub fn ensure(&self) -> Result<()> {
        self.links.ensure()?;
        Ok(())
    }

    /// Create the edge port registry if missing
    pub fn ensure_edge_ports(&self) -> Result<()> {
        self.edge_ports.ensure()?;
        Ok(())
    }

    /// Append a link record
    pub fn append(&self, record: &LinkRecord) -> Result<()> {
        self.links.append(&record.to_string())?;
        info!("Registered link {}", record);
        Ok(())
    }

    /// Record the management port of a managed link
    pub fn append_edge_port(&self, interface: &str, community: &str, port: u16) -> Result<()> {
        self.edge_ports
            .append(&format!("{} {} {}", interface, community, port))
    }

    /// Undo the most recent append of `record`
    pub fn rollback(&self, record: &LinkRecord) -> Result<bool> {
        let removed = remove_last(&self.links, &record.to_string())?;
        if removed {
            warn!("Rolled back registry entry {}", record);
        }
        Ok(removed)
    }

    /// Undo the most recent edge port entry
    pub fn rollback_edge_port(&self, interface: &str, community: &str, port: u16) -> Result<bool> {
        remove_last(
            &self.edge_ports,
            &format!("{} {} {}", interface, community, port),
        )
    }

    /// All well-formed link records
    pub fn list(&self) -> Result<Vec<LinkRecord>> {
        Ok(self
            .links
            .read_lines()?
            .iter()
            .filter_map(|line| match line.parse() {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed link entry {:?}: {}", line, e);
                    None
                }
            })
            .collect())
    }

    /// Registered record with exactly this interface and community
    pub fn find(&self, interface: &str, community: &str) -> Result<Option<LinkRecord>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|r| r.interface == interface && r.community == community))
    }

    /// Management port recorded for a managed link
    pub fn edge_port(&self, interface: &str, community: &str) -> Result<Option<u16>> {
        Ok(self.edge_ports.read_lines()?.iter().find_map(|line| {
            match line.split_whitespace().collect::<Vec<_>>().as_slice() {
                [i, c, port] if *i == interface && *c == community => port.parse().ok(),
                _ => None,
            }
        }))
    }

    /// Drop every line of both registries matching the link
    ///
    /// Returns how many link registry lines were removed.
    pub fn remove_matching(&self, interface: &str, community: Option<&str>) -> Result<usize> {
        let removed = self
            .links
            .remove_where(|line| line_matches(line, interface, community))?;

        let edge_removed = self.edge_ports.remove_where(|line| {
            let mut fields = line.split_whitespace();
            fields.next() == Some(interface)
                && community.map_or(true, |c| fields.next() == Some(c))
        })?;

        debug!(
            "Dropped {} link and {} edge port entries for {}",
            removed, edge_removed, interface
        );
        Ok(removed)
    }
}

fn remove_last(file: &LineFile, line: &str) -> Result<bool> {
    let mut lines = file.read_lines()?;
    match lines.iter().rposition(|l| l == line) {
        Some(idx) => {
            lines.remove(idx);
            file.rewrite(&lines)?;
            Ok(true)
        }
        None => Ok(false),
    }
}
