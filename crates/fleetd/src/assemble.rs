//! Wiring: config and descriptor in, a ready coordinator out.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};

use fleet_core::{ClusterDescriptor, DaemonConfig};
use fleetgrid_autoscale::{Coordinator, NominationEngine};
use fleetgrid_cluster::{PeerClient, PeerExchange};
use fleetgrid_provider::{
    ActionDispatcher, CloudProvider, CommandDispatcher, CommandProvider, LoadAverage, StaticProvider,
    detect_local_ip,
};
use fleetgrid_rules::RuleSet;
use fleetgrid_state::{AuditStore, Bounds, StatsTable};

/// File name of the election audit database inside `data_dir`.
pub const AUDIT_DB_FILE: &str = "fleetgrid.redb";

/// Everything a running node needs.
pub struct Assembly {
    pub node_ip: String,
    pub coordinator: Arc<Coordinator>,
    pub audit: AuditStore,
    pub exchange: PeerExchange,
    /// Whether provider-listed instances are contacted as peers. Off when
    /// the pool is just the static peer list.
    pub discover_peers: bool,
}

/// Parse the descriptor's rules. One bad expression disables every rule;
/// the instance bounds still apply.
pub fn build_rules(descriptor: &ClusterDescriptor) -> RuleSet {
    match RuleSet::from_expressions(descriptor.rule_expressions()) {
        Ok(rules) => rules,
        Err(e) => {
            error!(error = %e, "rule set rejected, only instance bounds will drive nominations");
            RuleSet::new()
        }
    }
}

/// Host part of a peer given as `ip`, `ip:port` or `host:port`.
fn peer_host(peer: &str) -> String {
    if let Ok(addr) = peer.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    match peer.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host.to_string(),
        _ => peer.to_string(),
    }
}

pub fn assemble(config: &DaemonConfig) -> anyhow::Result<Assembly> {
    let node_ip = match &config.node_ip {
        Some(ip) => ip.clone(),
        None => detect_local_ip().context("cannot detect this node's ip, set node_ip")?,
    };

    let descriptor = ClusterDescriptor::load_or_default(&config.descriptor);
    let rules = build_rules(&descriptor);
    let bounds = Bounds::new(descriptor.minimum_instances, descriptor.maximum_instances);
    info!(
        %node_ip,
        min = bounds.min_instances,
        max = bounds.max_instances,
        classes = rules.classes().len(),
        "cluster descriptor loaded"
    );

    let request_timeout = config.request_timeout();

    let discover_peers = config.commands.instances.is_some();
    let provider: Arc<dyn CloudProvider> = match &config.commands.instances {
        Some(argv) => Arc::new(CommandProvider::new(
            argv.clone(),
            config.commands.scaling_status.clone(),
            request_timeout,
        )),
        None => {
            let pool = std::iter::once(node_ip.clone()).chain(config.peers.iter().map(|p| peer_host(p)));
            Arc::new(StaticProvider::running(pool))
        }
    };

    let dispatcher: Arc<dyn ActionDispatcher> = Arc::new(CommandDispatcher::new(
        config.commands.action.clone(),
        config.dispatch_timeout(),
    ));

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let db_path = config.data_dir.join(AUDIT_DB_FILE);
    let audit = AuditStore::open(&db_path)?;
    info!(path = ?db_path, "election audit log opened");

    let coordinator = Coordinator::new(
        StatsTable::new(node_ip.clone()),
        NominationEngine::new(rules, bounds),
        Arc::new(LoadAverage::new(request_timeout)),
        provider,
        dispatcher,
    )
    .with_audit(audit.clone())
    .with_call_timeout(request_timeout)
    .with_dispatch_timeout(config.dispatch_timeout())
    .with_settle_timeout(config.settle_timeout())
    .with_pool_membership(discover_peers);

    let exchange = PeerExchange::new(PeerClient::new(config.peer_port, request_timeout))
        .with_static_peers(config.peers.clone());

    Ok(Assembly {
        node_ip,
        coordinator: Arc::new(coordinator),
        audit,
        exchange,
        discover_peers,
    })
}
