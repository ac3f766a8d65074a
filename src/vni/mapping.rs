//! Per-port VNI mapping files

use crate::error::{OverlayError, Result};
use crate::registry::{DataLayout, LineFile};
use crate::vni::{VniMapping, VniTriple};
use std::fs;
use std::io::ErrorKind;
use tracing::{debug, info, warn};

/// Mapping files, one per tunnel port
#[derive(Debug, Clone)]
pub struct MappingStore {
    layout: DataLayout,
}

impl MappingStore {
    /// Store located by the data layout
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            layout: layout.clone(),
        }
    }

    fn file(&self, port_name: &str) -> LineFile {
        LineFile::new(self.layout.mapping_path(port_name))
    }

    /// Whether the port has a mapping file
    pub fn exists(&self, port_name: &str) -> bool {
        self.file(port_name).exists()
    }

    /// Create an empty mapping file for the port if it has none
    pub fn ensure(&self, port_name: &str) -> Result<()> {
        if self.file(port_name).ensure()? {
            debug!("Created mapping file for {}", port_name);
        }
        Ok(())
    }

    /// Add a triple to the port; returns false if it was already there
    pub fn append(&self, port_name: &str, triple: &VniTriple) -> Result<bool> {
        if self.list(port_name)?.contains(triple) {
            debug!("Mapping {} already present on {}", triple, port_name);
            return Ok(false);
        }

        self.file(port_name).append(&triple.to_string())?;
        info!("Mapped {} to {}", triple, port_name);
        Ok(true)
    }

    /// Triples mapped on one port; a missing file is empty
    pub fn list(&self, port_name: &str) -> Result<Vec<VniTriple>> {
        Ok(self
            .file(port_name)
            .read_lines()?
            .iter()
            .filter_map(|line| match line.parse() {
                Ok(triple) => Some(triple),
                Err(e) => {
                    warn!("Skipping malformed mapping of {} {:?}: {}", port_name, line, e);
                    None
                }
            })
            .collect())
    }

    /// Ports that have a mapping file, sorted
    pub fn ports(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(self.layout.network_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ports = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(port) = name.to_str().and_then(DataLayout::port_from_mapping_file) {
                ports.push(port.to_string());
            }
        }

        ports.sort();
        Ok(ports)
    }

    /// Every mapping across every port
    pub fn list_all(&self) -> Result<Vec<VniMapping>> {
        let mut mappings = Vec::new();
        for port in self.ports()? {
            for triple in self.list(&port)? {
                mappings.push(VniMapping {
                    port_name: port.clone(),
                    triple,
                });
            }
        }
        Ok(mappings)
    }

    /// Drop every entry of the port matching vni and vlan
    ///
    /// Returns how many lines went. Lines that do not parse are kept as is.
    pub fn delete_entry(&self, port_name: &str, vni: u32, vlan: u16) -> Result<usize> {
        let file = self.file(port_name);
        if !file.exists() {
            return Err(OverlayError::MappingFileNotFound(port_name.to_string()));
        }

        let removed = file.remove_where(|line| {
            line.parse::<VniTriple>()
                .map(|t| t.matches_key(vni, vlan))
                .unwrap_or(false)
        })?;

        info!(
            "Deleted {} mapping(s) of vni {} vlan {} from {}",
            removed, vni, vlan, port_name
        );
        Ok(removed)
    }

    /// Empty the port's mapping file, returning what it held
    pub fn clear(&self, port_name: &str) -> Result<Vec<VniTriple>> {
        let file = self.file(port_name);
        if !file.exists() {
            return Err(OverlayError::MappingFileNotFound(port_name.to_string()));
        }

        let previous = self.list(port_name)?;
        file.rewrite::<&str>(&[])?;
        info!("Cleared {} mapping(s) of {}", previous.len(), port_name);
        Ok(previous)
    }

    /// Delete the port's mapping file; returns false if there was none
    pub fn remove_file(&self, port_name: &str) -> Result<bool> {
        self.file(port_name).remove()
    }
}
