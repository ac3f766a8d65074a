//! overlay-agent main entry point
//!
//! This binary is the network management command line of the host. It
//! handles CLI parsing, logging setup and dispatch to the orchestrator.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use overlay_agent::{
    config::Config,
    p2p::{KeyType, ManagedLinkRequest},
    security, Orchestrator, OverlayError, APP_NAME, VERSION,
};

/// Overlay tunnel, VNI and peer link management
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None, disable_version_flag = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a VXLAN/GRE tunnel port
    #[command(short_flag = 'c', long_flag = "createtunnel")]
    CreateTunnel {
        /// Tunnel port name
        port_name: String,
        /// Remote endpoint address
        remote_ip: String,
        /// vxlan or gre
        tunnel_type: String,
    },

    /// List tunnel ports
    #[command(short_flag = 'l', long_flag = "listtunnel")]
    ListTunnels,

    /// Remove a tunnel port and its VNI mappings
    #[command(short_flag = 'r', long_flag = "removetunnel")]
    RemoveTunnel {
        /// Tunnel port name
        port_name: String,
    },

    /// Reserve a VNI/VLAN pair for a tenant
    #[command(short_flag = 'E', long_flag = "reservvni")]
    ReserveVni {
        /// VXLAN network identifier
        vni: u32,
        /// VLAN tag
        vlan: u16,
        /// Tenant (environment) id
        tenant_id: String,
    },

    /// Map a reserved triple to a tunnel port
    #[command(short_flag = 'm', long_flag = "createvnimap")]
    CreateVniMap {
        /// Tunnel port name
        port_name: String,
        /// VXLAN network identifier
        vni: u32,
        /// VLAN tag
        vlan: u16,
        /// Tenant (environment) id
        tenant_id: String,
    },

    /// List VNI mappings of every port
    #[command(short_flag = 'v', long_flag = "listvnimap")]
    ListVniMap,

    /// Remove a port's mappings for a VNI/VLAN pair
    #[command(short_flag = 'M', long_flag = "removevni")]
    RemoveVni {
        /// Tunnel port name
        port_name: String,
        /// VXLAN network identifier
        vni: u32,
        /// VLAN tag
        vlan: u16,
    },

    /// Bulk VNI operations
    #[command(short_flag = 'Z', long_flag = "vniop")]
    VniOp {
        #[command(subcommand)]
        op: VniOp,
    },

    /// Create a peer-to-peer link
    #[command(short_flag = 'N', long_flag = "addn2n")]
    AddLink {
        /// TAP interface name
        interface: String,
        /// Community (tenant) name
        community: String,
        /// Local overlay address
        local_ip: String,
    },

    /// Create a supernode-managed link
    #[command(short_flag = 'n', long_flag = "addedge")]
    AddEdge {
        /// Supernode address
        supernode_ip: String,
        /// Supernode port
        supernode_port: u16,
        /// TAP interface name
        interface: String,
        /// Community (tenant) name
        community: String,
        /// Local overlay address
        local_ip: String,
        /// file or inline
        key_type: String,
        /// Key file path or inline key
        key: String,
        /// Management port; the first free port is used when omitted
        management_port: Option<u16>,
    },

    /// Remove a peer-to-peer link
    #[command(short_flag = 'R', long_flag = "removen2n")]
    RemoveLink {
        /// TAP interface name
        interface: String,
        /// Community (tenant) name
        community: String,
    },

    /// Restart a registered peer-to-peer link
    #[command(short_flag = 'e', long_flag = "reloadn2n")]
    ReloadLink {
        /// TAP interface name
        interface: String,
        /// Community (tenant) name
        community: String,
    },

    /// List registered peer-to-peer links
    #[command(short_flag = 'L', long_flag = "listn2n")]
    ListLinks,

    /// List TAP devices
    #[command(short_flag = 'S', long_flag = "listopenedtab")]
    ListTapDevices,

    /// Remove the link process serving a TAP device
    #[command(short_flag = 'V', long_flag = "removetab")]
    RemoveTapDevice {
        /// TAP interface name
        interface: String,
    },

    /// Show the flow table of a bridge
    #[command(short_flag = 's', long_flag = "showflow")]
    ShowFlow {
        /// Bridge name
        bridge: String,
    },

    /// Show port statistics of a bridge
    #[command(short_flag = 'p', long_flag = "showport")]
    ShowPort {
        /// Bridge name
        bridge: String,
    },

    /// Add a flow to a bridge
    #[command(short_flag = 'f', long_flag = "addflow")]
    AddFlow {
        /// Bridge name
        bridge: String,
        /// OpenFlow flow specification
        flow: String,
    },

    /// Delete flows from a bridge; all flows when no spec is given
    #[command(short_flag = 'd', long_flag = "deleteflow")]
    DeleteFlow {
        /// Bridge name
        bridge: String,
        /// OpenFlow match specification
        flow: Option<String>,
    },

    /// Create the gateway of a VLAN
    #[command(short_flag = 'T', long_flag = "creategateway")]
    CreateGateway {
        /// VLAN tag
        vlan: u16,
        /// Gateway address in CIDR notation
        address: String,
    },

    /// Delete the gateway of a VLAN
    #[command(short_flag = 'D', long_flag = "deletegateway")]
    DeleteGateway {
        /// VLAN tag
        vlan: u16,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug)]
enum VniOp {
    /// Clear every mapping of a port and drop its unused gateways
    Deleteall {
        /// Tunnel port name
        port_name: String,
    },
    /// Remove a port's mappings for a VNI/VLAN pair
    Delete {
        /// Tunnel port name
        port_name: String,
        /// VXLAN network identifier
        vni: u32,
        /// VLAN tag
        vlan: u16,
    },
    /// List reserved triples
    List,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        match e.downcast_ref::<OverlayError>() {
            Some(err) if err.is_not_found() => {
                info!("{}", err);
            }
            _ => {
                error!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Results go to stdout, diagnostics to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Run the CLI command
fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Version = cli.command {
        println!("{} v{}", APP_NAME, VERSION);
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    for problem in security::preflight(&config) {
        warn!("{}", problem);
    }

    let json = cli.json;
    let orch = Orchestrator::new(config);

    match cli.command {
        Commands::CreateTunnel {
            port_name,
            remote_ip,
            tunnel_type,
        } => {
            let tunnel = orch.create_tunnel(&port_name, &remote_ip, &tunnel_type)?;
            info!("Tunnel {} created", tunnel);
        }
        Commands::ListTunnels => {
            let tunnels = orch.list_tunnels()?;
            print_list(json, "List of Tunnels", &tunnels)?;
        }
        Commands::RemoveTunnel { port_name } => {
            let outcome = orch.remove_tunnel(&port_name)?;
            print_value(json, &outcome, || format!("{}: {:?}", port_name, outcome))?;
        }
        Commands::ReserveVni {
            vni,
            vlan,
            tenant_id,
        } => {
            let triple = orch.reserve_vni(vni, vlan, &tenant_id)?;
            info!("{} is reserved", triple);
        }
        Commands::CreateVniMap {
            port_name,
            vni,
            vlan,
            tenant_id,
        } => {
            let found = orch.create_mapping(&port_name, vni, vlan, &tenant_id)?;
            info!("VNI map created: {} {} {} on {}", vni, vlan, tenant_id, port_name);
            print_value(json, &found, String::new)?;
        }
        Commands::ListVniMap => {
            let mappings = orch.list_mappings()?;
            print_list(json, "List of VNI mappings", &mappings)?;
        }
        Commands::RemoveVni {
            port_name,
            vni,
            vlan,
        }
        | Commands::VniOp {
            op:
                VniOp::Delete {
                    port_name,
                    vni,
                    vlan,
                },
        } => {
            let removed = orch.delete_mapping_entry(&port_name, vni, vlan)?;
            info!("{} {} deleted from {} ({} entries)", vni, vlan, port_name, removed);
        }
        Commands::VniOp {
            op: VniOp::Deleteall { port_name },
        } => {
            let teardown = orch.delete_all_vni(&port_name)?;
            print_value(json, &teardown, || {
                format!(
                    "Cleared {} mapping(s) of {}, removed gateways {:?}",
                    teardown.cleared.len(),
                    teardown.port_name,
                    teardown.gateways_removed
                )
            })?;
        }
        Commands::VniOp { op: VniOp::List } => {
            let reservations = orch.list_reservations()?;
            print_list(json, "Reserved VNIs", &reservations)?;
        }
        Commands::AddLink {
            interface,
            community,
            local_ip,
        } => {
            let link = orch.create_link(&interface, &community, &local_ip)?;
            info!("Link {} started with pid {}", link.record, link.pid);
        }
        Commands::AddEdge {
            supernode_ip,
            supernode_port,
            interface,
            community,
            local_ip,
            key_type,
            key,
            management_port,
        } => {
            let request = ManagedLinkRequest {
                supernode_ip,
                supernode_port,
                interface,
                community,
                local_ip,
                key_type: key_type.parse::<KeyType>()?,
                key,
                management_port,
            };
            let link = orch.create_managed_link(&request)?;
            print_value(json, &link, || {
                format!(
                    "Link {} started with pid {} on management port {}",
                    link.record, link.pid, link.management_port
                )
            })?;
        }
        Commands::RemoveLink {
            interface,
            community,
        } => {
            let outcome = orch.remove_link(&interface, &community)?;
            report_teardown(&interface, outcome.pid, outcome.removed);
        }
        Commands::ReloadLink {
            interface,
            community,
        } => {
            let link = orch.reload_link(&interface, &community)?;
            info!("{} {} reloaded with pid {}", interface, community, link.pid);
        }
        Commands::ListLinks => {
            let links = orch.list_links()?;
            let rendered: Vec<String> = links
                .iter()
                .map(|l| match l.pid {
                    Some(pid) => format!("{} (pid {})", l.record, pid),
                    None => format!("{} (stale)", l.record),
                })
                .collect();
            if json {
                print_value(json, &links, String::new)?;
            } else {
                print_list(false, "List of peer links", &rendered)?;
            }
        }
        Commands::ListTapDevices => {
            let devices = orch.list_tap_devices()?;
            print_list(json, "List of TAP devices", &devices)?;
        }
        Commands::RemoveTapDevice { interface } => {
            let outcome = orch.remove_generic_link(&interface)?;
            report_teardown(&interface, outcome.pid, outcome.removed);
        }
        Commands::ShowFlow { bridge } => {
            info!("Flow table of {}", bridge);
            println!("{}", orch.show_flow(&bridge)?);
        }
        Commands::ShowPort { bridge } => {
            info!("Port information of {}", bridge);
            println!("{}", orch.show_port(&bridge)?);
        }
        Commands::AddFlow { bridge, flow } => {
            orch.add_flow(&bridge, &flow)?;
        }
        Commands::DeleteFlow { bridge, flow } => {
            orch.delete_flow(&bridge, flow.as_deref())?;
        }
        Commands::CreateGateway { vlan, address } => {
            orch.create_gateway(vlan, &address)?;
            info!("Gateway for VLAN {} created with {}", vlan, address);
        }
        Commands::DeleteGateway { vlan } => {
            orch.delete_gateway(vlan)?;
            info!("Gateway for VLAN {} deleted", vlan);
        }
        Commands::Version => {}
    }

    Ok(())
}

fn report_teardown(interface: &str, pid: Option<i32>, removed: usize) {
    match pid {
        Some(pid) => info!(
            "{} stopped (pid {}), {} registry line(s) removed",
            interface, pid, removed
        ),
        None => info!(
            "{} was not running, {} registry line(s) removed",
            interface, removed
        ),
    }
}

fn print_list<T: Serialize + std::fmt::Display>(
    json: bool,
    title: &str,
    items: &[T],
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    println!("{}\n--------", title);
    for item in items {
        println!("{}", item);
    }
    Ok(())
}

fn print_value<T, F>(json: bool, value: &T, text: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce() -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        let text = text();
        if !text.is_empty() {
            println!("{}", text);
        }
    }
    Ok(())
}
