//! In-memory collaborators for driving the orchestrator in tests

#![allow(dead_code)]

use overlay_agent::config::Config;
use overlay_agent::error::{OverlayError, Result};
use overlay_agent::p2p::{EdgeParams, LinkRecord, PortProber, ProcessControl};
use overlay_agent::switch::SwitchControl;
use overlay_agent::tunnel::TunnelType;
use overlay_agent::Orchestrator;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;
use tempfile::TempDir;

/// Switch state shared between a test and its fake
#[derive(Debug, Default)]
pub struct SwitchState {
    /// port name -> (remote ip, type)
    pub ports: BTreeMap<String, (String, TunnelType)>,
    /// Every mutating call, rendered as text
    pub calls: Vec<String>,
    /// Make the structured query fail so the dump is parsed
    pub dump_only: bool,
}

/// Switch that keeps its ports in memory
#[derive(Clone, Default)]
pub struct FakeSwitch(pub Rc<RefCell<SwitchState>>);

impl SwitchControl for FakeSwitch {
    fn show(&self) -> Result<String> {
        let state = self.0.borrow();
        let mut dump = String::from("0f9c7a4e\n    Bridge br-tun\n");
        for (name, (ip, kind)) in &state.ports {
            dump.push_str(&format!("        Port \"{}\"\n", name));
            dump.push_str(&format!("            Interface \"{}\"\n", name));
            dump.push_str(&format!("                type: {}\n", kind));
            dump.push_str(&format!(
                "                options: {{key=flow, remote_ip=\"{}\", stp_enable=\"true\"}}\n",
                ip
            ));
        }
        Ok(dump)
    }

    fn list_interfaces_json(&self) -> Result<String> {
        let state = self.0.borrow();
        if state.dump_only {
            return Err(OverlayError::control_plane(
                "ovs-vsctl --format=json list Interface",
                "unsupported",
            ));
        }

        let rows: Vec<serde_json::Value> = state
            .ports
            .iter()
            .map(|(name, (ip, kind))| {
                serde_json::json!([name, kind.to_string(), ["map", [["remote_ip", ip]]]])
            })
            .collect();
        Ok(serde_json::json!({"data": rows, "headings": ["name", "type", "options"]}).to_string())
    }

    fn list_ports(&self) -> Result<Vec<String>> {
        Ok(self.0.borrow().ports.keys().cloned().collect())
    }

    fn create_tunnel_port(&self, name: &str, remote_ip: &str, tunnel_type: TunnelType) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.calls.push(format!("create {} {} {}", name, remote_ip, tunnel_type));
        state
            .ports
            .insert(name.to_string(), (remote_ip.to_string(), tunnel_type));
        Ok(())
    }

    fn remove_port(&self, name: &str) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.calls.push(format!("remove {}", name));
        state.ports.remove(name);
        Ok(())
    }

    fn dump_bridge_flows(&self, bridge: &str) -> Result<String> {
        Ok(format!("NXST_FLOW reply for {}", bridge))
    }

    fn dump_port(&self, bridge: &str) -> Result<String> {
        Ok(format!("OFPST_PORT reply for {}", bridge))
    }

    fn add_flow(&self, bridge: &str, flow: &str) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("add-flow {} {}", bridge, flow));
        Ok(())
    }

    fn delete_flow(&self, bridge: &str, flow: &str) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("del-flows {} {}", bridge, flow));
        Ok(())
    }

    fn delete_all_flows(&self, bridge: &str) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("del-flows {}", bridge));
        Ok(())
    }

    fn create_gateway(&self, vlan: u16, address: &str) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("gateway {} {}", vlan, address));
        Ok(())
    }

    fn delete_gateway(&self, vlan: u16) -> Result<()> {
        self.0.borrow_mut().calls.push(format!("del-gateway {}", vlan));
        Ok(())
    }
}

/// Process table shared between a test and its fake
#[derive(Debug, Default)]
pub struct ProcessState {
    /// pid -> (interface, community)
    pub running: BTreeMap<i32, (String, String)>,
    /// Pids that received SIGHUP, in order
    pub signals: Vec<i32>,
    /// Arguments of every edge started
    pub edges: Vec<Vec<String>>,
    /// Make every spawn fail
    pub fail_spawn: bool,
    pub next_pid: i32,
}

/// Process control over an in-memory process table
#[derive(Clone, Default)]
pub struct FakeProcess(pub Rc<RefCell<ProcessState>>);

impl FakeProcess {
    fn start(&self, interface: &str, community: &str) -> Result<i32> {
        let mut state = self.0.borrow_mut();
        if state.fail_spawn {
            return Err(OverlayError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "binary not found",
            )));
        }
        state.next_pid += 1;
        let pid = 1000 + state.next_pid;
        state
            .running
            .insert(pid, (interface.to_string(), community.to_string()));
        Ok(pid)
    }
}

impl ProcessControl for FakeProcess {
    fn spawn_p2p(&self, record: &LinkRecord) -> Result<i32> {
        self.start(&record.interface, &record.community)
    }

    fn spawn_edge(&self, params: &EdgeParams) -> Result<i32> {
        self.0.borrow_mut().edges.push(params.args());
        self.start(&params.record.interface, &params.record.community)
    }

    fn find_pid(&self, interface: &str, community: &str) -> Result<Option<i32>> {
        Ok(self
            .0
            .borrow()
            .running
            .iter()
            .find(|(_, (i, c))| i == interface && c == community)
            .map(|(pid, _)| *pid))
    }

    fn find_pid_by_interface(&self, interface: &str) -> Result<Option<i32>> {
        Ok(self
            .0
            .borrow()
            .running
            .iter()
            .find(|(_, (i, _))| i == interface)
            .map(|(pid, _)| *pid))
    }

    fn signal_hangup(&self, pid: i32) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.signals.push(pid);
        state.running.remove(&pid);
        Ok(())
    }

    fn is_alive(&self, pid: i32) -> bool {
        self.0.borrow().running.contains_key(&pid)
    }
}

/// Port prober with a fixed set of busy ports
#[derive(Clone, Default)]
pub struct FakeProber {
    pub busy: Rc<RefCell<HashSet<u16>>>,
    pub all_busy: bool,
}

impl PortProber for FakeProber {
    fn is_free(&self, port: u16) -> bool {
        !self.all_busy && !self.busy.borrow().contains(&port)
    }
}

/// Orchestrator over fakes, rooted in a temporary data prefix
pub struct Harness {
    pub dir: TempDir,
    pub switch: FakeSwitch,
    pub process: FakeProcess,
    pub orch: Orchestrator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_prober(FakeProber::default())
    }

    pub fn with_prober(prober: FakeProber) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config::new();
        config.data_prefix = dir.path().to_path_buf();
        config.peer.teardown_timeout_ms = 200;
        config.peer.sysfs_net = dir.path().join("sys/class/net");

        let switch = FakeSwitch::default();
        let process = FakeProcess::default();
        let orch = Orchestrator::with_collaborators(
            config,
            Box::new(switch.clone()),
            Box::new(process.clone()),
            Box::new(prober),
        );

        Self {
            dir,
            switch,
            process,
            orch,
        }
    }

    /// Raw lines of the link registry
    pub fn link_lines(&self) -> Vec<String> {
        overlay_agent::registry::LineFile::new(self.orch.layout().link_registry_path())
            .read_lines()
            .expect("Failed to read link registry")
    }
}
