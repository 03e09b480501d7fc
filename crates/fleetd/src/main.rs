//! fleetd — the FleetGrid node daemon.
//!
//! Runs on every pool member. Assembles:
//! - Stats table and election state (in memory)
//! - Election audit log (redb)
//! - Load, provider and dispatch collaborators
//! - Polling loop (nominate, exchange, tally)
//! - Stats endpoint (axum)
//!
//! # Usage
//!
//! ```text
//! fleetd run --config /etc/fleetgrid/fleetd.toml --peer 10.0.0.8:8642
//! fleetd check --descriptor /etc/fleetgrid/cluster.json
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info};

use fleet_core::{ClusterDescriptor, DaemonConfig};
use fleetd::{Node, assemble};

const DEFAULT_CONFIG_PATH: &str = "/etc/fleetgrid/fleetd.toml";

#[derive(Parser)]
#[command(name = "fleetd", about = "FleetGrid autoscaling daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator and the stats endpoint.
    Run {
        /// Config file. Defaults to /etc/fleetgrid/fleetd.toml when present.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Address the stats endpoint listens on.
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// This node's ip as peers see it.
        #[arg(long)]
        node_ip: Option<String>,

        /// Cluster descriptor JSON.
        #[arg(long)]
        descriptor: Option<PathBuf>,

        /// Directory for the election audit log.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Polling cycle period, e.g. "30s".
        #[arg(long)]
        poll_interval: Option<String>,

        /// Static peer (`ip` or `ip:port`). Repeatable.
        #[arg(long = "peer")]
        peers: Vec<String>,
    },

    /// Parse a cluster descriptor and print the resulting bounds and rules.
    Check {
        #[arg(long, default_value = "/etc/fleetgrid/cluster.json")]
        descriptor: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            listen,
            node_ip,
            descriptor,
            data_dir,
            poll_interval,
            peers,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(listen) = listen {
                config.listen = listen;
            }
            if node_ip.is_some() {
                config.node_ip = node_ip;
            }
            if let Some(descriptor) = descriptor {
                config.descriptor = descriptor;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if let Some(interval) = poll_interval {
                config.poll_interval = interval;
            }
            if !peers.is_empty() {
                config.peers = peers;
            }
            config.validate()?;
            run(config).await
        }
        Command::Check { descriptor } => check(&descriptor),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fleetd=debug,fleetgrid=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DaemonConfig> {
    match path {
        Some(path) => Ok(DaemonConfig::from_file(path)?),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            Ok(DaemonConfig::from_file(Path::new(DEFAULT_CONFIG_PATH))?)
        }
        None => Ok(DaemonConfig::default()),
    }
}

async fn run(config: DaemonConfig) -> anyhow::Result<()> {
    info!("FleetGrid daemon starting");

    let assembly = assemble(&config)?;
    let node = Node::new(assembly.coordinator.clone(), assembly.exchange)
        .with_peer_discovery(assembly.discover_peers);

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Polling loop ───────────────────────────────────────────

    let interval = config.poll_interval();
    let poll_handle = tokio::spawn(async move {
        node.run(interval, shutdown_rx).await;
    });

    // ── Stats endpoint ─────────────────────────────────────────

    let router = fleetgrid_api::build_router(assembly.coordinator, Some(assembly.audit));
    info!(addr = %config.listen, node_ip = %assembly.node_ip, "stats endpoint starting");
    let listener = tokio::net::TcpListener::bind(config.listen).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c, shutting down");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;
    let _ = poll_handle.await;

    info!("FleetGrid daemon stopped");
    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let descriptor = ClusterDescriptor::from_file(path)?;
    let rules = fleetgrid_rules::RuleSet::from_expressions(descriptor.rule_expressions())?;

    let summary = serde_json::json!({
        "minimum_instances": descriptor.minimum_instances,
        "maximum_instances": descriptor.maximum_instances,
        "rules": rules,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
