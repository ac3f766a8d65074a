//! Shared VNI reservation store

use crate::error::Result;
use crate::registry::{DataLayout, LineFile};
use crate::vni::{ReservationMatch, VniTriple};
use tracing::{info, warn};

/// Append-only store of reserved triples
#[derive(Debug, Clone)]
pub struct ReservationStore {
    file: LineFile,
}

impl ReservationStore {
    /// Store located by the data layout
    pub fn new(layout: &DataLayout) -> Self {
        Self {
            file: LineFile::new(layout.reservations_path()),
        }
    }

    /// Whether any reservation was ever made
    pub fn exists(&self) -> bool {
        self.file.exists()
    }

    /// Record a reservation; duplicates are kept
    pub fn reserve(&self, triple: &VniTriple) -> Result<()> {
        self.file.ensure()?;
        self.file.append(&triple.to_string())?;
        info!("Reserved {}", triple);
        Ok(())
    }

    /// All well-formed reservations, in file order
    pub fn list(&self) -> Result<Vec<VniTriple>> {
        Ok(self
            .file
            .read_lines()?
            .iter()
            .filter_map(|line| match line.parse() {
                Ok(triple) => Some(triple),
                Err(e) => {
                    warn!("Skipping malformed reservation {:?}: {}", line, e);
                    None
                }
            })
            .collect())
    }

    /// Compare a triple against every reservation
    pub fn check(&self, triple: &VniTriple) -> Result<ReservationMatch> {
        let found = self
            .list()?
            .iter()
            .fold(ReservationMatch::default(), |acc, r| ReservationMatch {
                vni: acc.vni || r.vni == triple.vni,
                vlan: acc.vlan || r.vlan == triple.vlan,
                tenant: acc.tenant || r.tenant_id == triple.tenant_id,
                full: acc.full || r == triple,
            });
        Ok(found)
    }
}
