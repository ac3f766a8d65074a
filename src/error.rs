//! Error types for overlay-agent
//!
//! This module defines the error types used throughout the library.
//! We use `thiserror` for ergonomic error definitions and `anyhow` for
//! error propagation in the binary.

use thiserror::Error;

/// Main error type for overlay-agent operations
#[derive(Error, Debug)]
pub enum OverlayError {
    /// Requested tunnel type is neither vxlan nor gre
    #[error("Invalid tunnel type '{0}': must be vxlan or gre")]
    InvalidTunnelType(String),

    /// Port name fails the switch naming rules
    #[error("Invalid port name '{name}': {reason}")]
    InvalidPortName {
        /// Offending port name
        name: String,
        /// Rule that was violated
        reason: String,
    },

    /// Port name already exists on the switch
    #[error("Port '{0}' already exists on the switch")]
    PortNameInUse(String),

    /// Another tunnel already targets this remote IP
    #[error("Remote IP {remote_ip} is already used by tunnel '{port_name}'")]
    DuplicateRemoteIp {
        /// Remote IP that was requested
        remote_ip: String,
        /// Existing tunnel using it
        port_name: String,
    },

    /// Switch refused to create the tunnel port
    #[error("Tunnel creation failed for '{port_name}': {message}")]
    TunnelCreationFailed {
        /// Port that could not be created
        port_name: String,
        /// Underlying control-plane error text
        message: String,
    },

    /// Generic control-plane command failure
    #[error("Control plane command failed: {command}: {message}")]
    ControlPlane {
        /// Command line that was executed
        command: String,
        /// Tool output
        message: String,
    },

    /// Switch dump did not match the expected layout
    #[error("Port dump parse error at line {line}: {message}")]
    DumpParse {
        /// 1-based line number in the dump
        line: usize,
        /// What was wrong
        message: String,
    },

    /// Mapping requested before any reservation exists
    #[error("No reserved VNIs yet: reserve a VNI before mapping it")]
    NoReservationsYet,

    /// Requested triple is not (fully) reserved
    #[error(
        "No reservation for the requested triple (vni found: {vni}, vlan found: {vlan}, tenant found: {tenant})"
    )]
    ReservationMismatch {
        /// VNI is present in some reservation
        vni: bool,
        /// VLAN is present in some reservation
        vlan: bool,
        /// Tenant is present in some reservation
        tenant: bool,
    },

    /// Port has no mapping file
    #[error("No VNI mapping file for port '{0}'")]
    MappingFileNotFound(String),

    /// Peer link process could not be started
    #[error("Failed to start peer link on '{interface}': {message}")]
    LinkStartFailed {
        /// Link interface name
        interface: String,
        /// Spawn error text
        message: String,
    },

    /// Port probing exhausted the configured range
    #[error("No available management port in range {start}..{end}")]
    NoAvailablePort {
        /// First port probed
        start: u16,
        /// Exclusive end of the probed range
        end: u16,
    },

    /// Explicit management port cannot be bound
    #[error("Management port {0} is used by another process")]
    PortInUse(u16),

    /// Signal could not be delivered to a link process
    #[error("Failed to signal process {pid}: {message}")]
    SignalDeliveryFailed {
        /// Target process id
        pid: i32,
        /// OS error text
        message: String,
    },

    /// Link process did not exit after being signalled
    #[error("Process {pid} did not exit within {timeout_ms}ms")]
    LinkTeardownTimeout {
        /// Process that is still alive
        pid: i32,
        /// How long we waited
        timeout_ms: u64,
    },

    /// Another orchestrator holds the registry lock
    #[error("Registry is locked by another process: {0}")]
    RegistryLocked(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using OverlayError
pub type Result<T> = std::result::Result<T, OverlayError>;

impl OverlayError {
    /// Create a control-plane error
    pub fn control_plane(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ControlPlane {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create an invalid port name error
    pub fn invalid_port_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPortName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for conditions that teardown treats as informational
    pub fn is_not_found(&self) -> bool {
        matches!(self, OverlayError::MappingFileNotFound(_))
    }
}

impl From<serde_json::Error> for OverlayError {
    fn from(err: serde_json::Error) -> Self {
        OverlayError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for OverlayError {
    fn from(err: toml::de::Error) -> Self {
        OverlayError::Config(err.to_string())
    }
}
