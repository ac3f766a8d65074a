//! Input validation and sanitization
//!
//! Every name and number handed to the switch, written to a registry line or
//! passed to a link process goes through one of these checks first. Registry
//! lines are whitespace-delimited, so no field may contain whitespace.

use crate::error::OverlayError;
use std::net::IpAddr;
use tracing::warn;

/// Largest interface name the kernel accepts (IFNAMSIZ - 1)
pub const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Largest 24-bit VXLAN network identifier
pub const MAX_VNI: u32 = 0x00FF_FFFF;

/// Smallest usable 802.1Q VLAN id
pub const MIN_VLAN: u16 = 1;

/// Largest usable 802.1Q VLAN id
pub const MAX_VLAN: u16 = 4094;

/// Validate a switch tunnel port name
pub fn validate_port_name(name: &str) -> Result<(), OverlayError> {
    if name.is_empty() {
        return Err(OverlayError::invalid_port_name(name, "name cannot be empty"));
    }

    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(OverlayError::invalid_port_name(
            name,
            format!("too long (max {} characters)", MAX_INTERFACE_NAME_LEN),
        ));
    }

    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(OverlayError::invalid_port_name(
            name,
            "must start with a letter",
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(OverlayError::invalid_port_name(
            name,
            "only alphanumeric, '-', '_' and '.' allowed",
        ));
    }

    Ok(())
}

/// Validate a peer link interface name
pub fn validate_interface_name(name: &str) -> Result<(), OverlayError> {
    validate_port_name(name).map_err(|e| match e {
        OverlayError::InvalidPortName { name, reason } => {
            OverlayError::Validation(format!("Invalid interface name '{}': {}", name, reason))
        }
        other => other,
    })
}

/// Validate a token stored as a single registry field (tenant id, community)
pub fn validate_token(kind: &str, value: &str) -> Result<(), OverlayError> {
    if value.is_empty() {
        return Err(OverlayError::Validation(format!("{} cannot be empty", kind)));
    }

    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        warn!("Rejected {} with whitespace: {:?}", kind, value);
        return Err(OverlayError::Validation(format!(
            "{} '{}' cannot contain whitespace",
            kind, value
        )));
    }

    Ok(())
}

/// Validate a tenant (environment) id
pub fn validate_tenant_id(tenant_id: &str) -> Result<(), OverlayError> {
    validate_token("Tenant id", tenant_id)
}

/// Validate a peer link community name
pub fn validate_community_name(community: &str) -> Result<(), OverlayError> {
    validate_token("Community name", community)
}

/// Validate IP address string
pub fn validate_ip_address(ip: &str) -> Result<IpAddr, OverlayError> {
    ip.parse::<IpAddr>()
        .map_err(|_| OverlayError::Validation(format!("Invalid IP address: {}", ip)))
}

/// Validate CIDR notation
pub fn validate_cidr(cidr: &str) -> Result<(), OverlayError> {
    let (addr, prefix) = cidr.split_once('/').ok_or_else(|| {
        OverlayError::Validation(format!("Invalid CIDR notation: {}", cidr))
    })?;

    let ip = validate_ip_address(addr)?;

    let prefix: u8 = prefix.parse().map_err(|_| {
        OverlayError::Validation(format!("Invalid prefix length in CIDR: {}", cidr))
    })?;

    let max_prefix = if ip.is_ipv4() { 32 } else { 128 };
    if prefix > max_prefix {
        return Err(OverlayError::Validation(format!(
            "Invalid prefix length {} for {}",
            prefix,
            if ip.is_ipv4() { "IPv4" } else { "IPv6" }
        )));
    }

    Ok(())
}

/// Validate a VXLAN network identifier
pub fn validate_vni(vni: u32) -> Result<(), OverlayError> {
    if vni > MAX_VNI {
        return Err(OverlayError::Validation(format!(
            "VNI {} out of range (0-{})",
            vni, MAX_VNI
        )));
    }
    Ok(())
}

/// Validate an 802.1Q VLAN id
pub fn validate_vlan(vlan: u16) -> Result<(), OverlayError> {
    if !(MIN_VLAN..=MAX_VLAN).contains(&vlan) {
        return Err(OverlayError::Validation(format!(
            "VLAN {} out of range ({}-{})",
            vlan, MIN_VLAN, MAX_VLAN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_port_name() {
        assert!(validate_port_name("tun0").is_ok());
        assert!(validate_port_name("tunnel-10.1").is_ok());
        assert!(validate_port_name("vx_a").is_ok());

        assert!(validate_port_name("").is_err());
        assert!(validate_port_name("0tun").is_err());
        assert!(validate_port_name("tun 0").is_err());
        assert!(validate_port_name("tun;rm").is_err());
        assert!(validate_port_name("abcdefghijklmnop").is_err());
    }

    #[test]
    fn test_validate_port_name_error_kind() {
        match validate_port_name("0tun") {
            Err(OverlayError::InvalidPortName { name, .. }) => assert_eq!(name, "0tun"),
            other => panic!("Expected InvalidPortName, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_interface_name_is_validation_error() {
        assert!(validate_interface_name("p2p1").is_ok());
        assert!(matches!(
            validate_interface_name("bad name"),
            Err(OverlayError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_tokens() {
        assert!(validate_tenant_id("tenantA").is_ok());
        assert!(validate_community_name("c0mmunity-1").is_ok());

        assert!(validate_tenant_id("").is_err());
        assert!(validate_tenant_id("tenant A").is_err());
        assert!(validate_community_name("comm\tx").is_err());
    }

    #[test]
    fn test_validate_ip_address() {
        assert!(validate_ip_address("192.168.1.1").is_ok());
        assert!(validate_ip_address("2001:db8::1").is_ok());

        assert!(validate_ip_address("256.1.1.1").is_err());
        assert!(validate_ip_address("not-an-ip").is_err());
    }

    #[test]
    fn test_validate_cidr() {
        assert!(validate_cidr("10.10.0.1/24").is_ok());
        assert!(validate_cidr("2001:db8::/32").is_ok());

        assert!(validate_cidr("10.10.0.1").is_err());
        assert!(validate_cidr("10.10.0.1/33").is_err());
        assert!(validate_cidr("invalid/24").is_err());
    }

    #[test]
    fn test_validate_vni_and_vlan() {
        assert!(validate_vni(0).is_ok());
        assert!(validate_vni(MAX_VNI).is_ok());
        assert!(validate_vni(MAX_VNI + 1).is_err());

        assert!(validate_vlan(1).is_ok());
        assert!(validate_vlan(4094).is_ok());
        assert!(validate_vlan(0).is_err());
        assert!(validate_vlan(4095).is_err());
    }
}
