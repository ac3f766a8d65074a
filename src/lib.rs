//! overlay-agent: Overlay tunnel and VNI orchestration for container hosts
//!
//! This library manages the overlay network of a host running isolated
//! containers: VXLAN/GRE tunnel ports on the virtual switch, VNI/VLAN/tenant
//! reservations and their binding to tunnel ports, and peer-to-peer mesh
//! links served by external link processes.
//!
//! # Architecture
//!
//! State lives in plain text registries under one network directory. The
//! [`orchestrator::Orchestrator`] validates each request against those
//! registries, performs the switch or process side effect and persists the
//! change, holding a single-writer lock while it does.
//!
//! # Modules
//!
//! - `config`: Configuration parsing and management
//! - `error`: Error types and handling
//! - `security`: Input validation and privilege detection
//! - `registry`: File-backed storage primitives
//! - `switch`: Virtual switch control plane
//! - `tunnel`: Tunnel registry and lifecycle
//! - `vni`: VNI reservations and mappings
//! - `p2p`: Peer-to-peer link management
//! - `orchestrator`: Orchestration facade

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod p2p;
pub mod registry;
pub mod security;
pub mod switch;
pub mod tunnel;
pub mod vni;

// Re-export commonly used types
pub use error::{OverlayError, Result};
pub use orchestrator::Orchestrator;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
