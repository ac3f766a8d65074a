//! Management port probing
//!
//! A port is free when a UDP socket can be bound to it. The probe socket is
//! closed before returning so the link process can take the port.

use crate::error::{OverlayError, Result};
use std::net::{Ipv4Addr, UdpSocket};
use tracing::{debug, info};

/// Answers whether a UDP port can be bound
#[cfg_attr(test, mockall::automock)]
pub trait PortProber {
    /// True when nothing holds the port
    fn is_free(&self, port: u16) -> bool;
}

/// Probes by binding `0.0.0.0:<port>`
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpPortProber;

impl PortProber for UdpPortProber {
    fn is_free(&self, port: u16) -> bool {
        match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)) {
            Ok(socket) => {
                drop(socket);
                true
            }
            Err(e) => {
                debug!("UDP port {} unavailable: {}", port, e);
                false
            }
        }
    }
}

/// First free port in `[start, end)`
pub fn allocate_port(prober: &dyn PortProber, start: u16, end: u16) -> Result<u16> {
    let port = (start..end)
        .find(|&port| prober.is_free(port))
        .ok_or(OverlayError::NoAvailablePort { start, end })?;

    info!("Selected management port {}", port);
    Ok(port)
}

/// Accept a caller-chosen port only if it is free
pub fn check_explicit_port(prober: &dyn PortProber, port: u16) -> Result<u16> {
    if prober.is_free(port) {
        Ok(port)
    } else {
        Err(OverlayError::PortInUse(port))
    }
}
