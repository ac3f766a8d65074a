//! Integration tests for overlay-agent
//!
//! These tests verify the interaction between configuration, the registry
//! layout and the orchestrator.

mod common;

use common::Harness;
use overlay_agent::config::{Config, DATA_PREFIX_ENV};
use overlay_agent::registry::WriterLock;
use overlay_agent::security::{validate_interface_name, validate_port_name};
use overlay_agent::OverlayError;
use serial_test::serial;
use std::fs;
use std::path::PathBuf;

#[test]
#[serial]
fn test_config_file_and_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
data_prefix = "/srv/overlay"

[switch]
tunnel_bridge = "br-overlay"

[peer]
teardown_timeout_ms = 1000
"#,
    )
    .unwrap();

    std::env::remove_var(DATA_PREFIX_ENV);
    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.data_prefix, PathBuf::from("/srv/overlay"));
    assert_eq!(config.switch.tunnel_bridge, "br-overlay");

    std::env::set_var(DATA_PREFIX_ENV, dir.path());
    let config = Config::load(Some(path.as_path())).unwrap();
    std::env::remove_var(DATA_PREFIX_ENV);

    assert_eq!(config.data_prefix, dir.path());
    assert_eq!(
        config.layout().link_registry_path(),
        dir.path().join("var/subutai-network/p2p.txt")
    );
}

#[test]
#[serial]
fn test_explicit_missing_config_is_error() {
    let result = Config::load(Some(std::path::Path::new("/nonexistent/overlay.toml")));
    assert!(matches!(result, Err(OverlayError::Config(_))));
}

#[test]
fn test_registries_share_one_directory() {
    let h = Harness::new();
    h.orch.reserve_vni(100, 20, "tenantA").unwrap();
    h.orch.create_mapping("tun0", 100, 20, "tenantA").unwrap();
    h.orch.create_link("p2p0", "tenantA", "10.10.0.1").unwrap();

    let mut names: Vec<String> = fs::read_dir(h.orch.layout().network_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names, vec![".lock", "p2p.txt", "tun0_vni_vlan", "vni_reserve"]);
}

#[test]
fn test_second_writer_is_refused() {
    let h = Harness::new();
    let _held = WriterLock::acquire(h.orch.layout().lock_path()).unwrap();

    assert!(matches!(
        h.orch.create_link("p2p0", "tenantA", "10.10.0.1"),
        Err(OverlayError::RegistryLocked(_))
    ));
    assert!(h.link_lines().is_empty());
}

#[test]
fn test_lock_is_released_after_each_operation() {
    let h = Harness::new();
    h.orch.reserve_vni(100, 20, "tenantA").unwrap();

    assert!(WriterLock::acquire(h.orch.layout().lock_path()).is_ok());
}

#[test]
fn test_switch_pass_through() {
    let h = Harness::new();

    assert!(h.orch.show_flow("br-int").unwrap().contains("br-int"));
    assert!(h.orch.show_port("br-int").unwrap().contains("br-int"));
    h.orch.add_flow("br-int", "priority=10,actions=normal").unwrap();
    h.orch.delete_flow("br-int", Some("in_port=2")).unwrap();
    h.orch.delete_flow("br-int", None).unwrap();
    h.orch.create_gateway(20, "10.20.0.1/24").unwrap();
    h.orch.delete_gateway(20).unwrap();

    assert_eq!(
        h.switch.0.borrow().calls,
        vec![
            "add-flow br-int priority=10,actions=normal",
            "del-flows br-int in_port=2",
            "del-flows br-int",
            "gateway 20 10.20.0.1/24",
            "del-gateway 20",
        ]
    );
}

#[test]
fn test_security_validation_integration() {
    assert!(validate_port_name("tun0").is_ok());
    assert!(validate_port_name("vxlan-10.0.0.2").is_ok());
    assert!(validate_port_name("").is_err());
    assert!(validate_port_name("0tun").is_err());

    assert!(validate_interface_name("p2p0").is_ok());
    assert!(matches!(
        validate_interface_name("p2p 0"),
        Err(OverlayError::Validation(_))
    ));
}
