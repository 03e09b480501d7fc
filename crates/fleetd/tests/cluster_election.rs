//! Multi-node election tests.
//!
//! Several nodes run in-process, each with its own coordinator and stats
//! endpoint on a loopback port, exchanging tables over real HTTP.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleetd::Node;
use fleetgrid_api::build_router;
use fleetgrid_autoscale::{Coordinator, NominationEngine};
use fleetgrid_cluster::{PeerClient, PeerExchange};
use fleetgrid_provider::{ActionDispatcher, BoxFuture, MetricsSource, ProviderResult, StaticProvider};
use fleetgrid_rules::RuleSet;
use fleetgrid_state::{Bounds, Nomination, ScaleAction, StatsTable};

struct Load(f64);

impl MetricsSource for Load {
    fn current_load(&self) -> BoxFuture<'_, ProviderResult<f64>> {
        let v = self.0;
        Box::pin(async move { Ok(v) })
    }
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<ScaleAction>>,
}

impl Recorder {
    fn calls(&self) -> Vec<ScaleAction> {
        self.calls.lock().unwrap().clone()
    }
}

impl ActionDispatcher for Recorder {
    fn dispatch(&self, action: ScaleAction) -> BoxFuture<'_, ProviderResult<()>> {
        self.calls.lock().unwrap().push(action);
        Box::pin(async { Ok(()) })
    }
}

struct TestNode {
    node: Node,
    dispatcher: Arc<Recorder>,
}

fn node_ip(i: usize) -> String {
    format!("10.2.0.{}", i + 1)
}

/// Start one endpoint per load value, then wire every node to every other
/// node's loopback address.
async fn cluster(loads: &[f64], bounds: Bounds) -> Vec<TestNode> {
    let pool: Vec<String> = (0..loads.len()).map(node_ip).collect();
    let rules = RuleSet::from_expressions([("expand_when", "load > 0.9"), ("contract_when", "load < 0.4")]).unwrap();

    let mut coordinators = Vec::new();
    let mut addrs: Vec<SocketAddr> = Vec::new();
    let mut dispatchers = Vec::new();

    for (i, load) in loads.iter().enumerate() {
        let dispatcher = Arc::new(Recorder::default());
        let coordinator = Arc::new(
            Coordinator::new(
                StatsTable::new(node_ip(i)),
                NominationEngine::new(rules.clone(), bounds),
                Arc::new(Load(*load)),
                Arc::new(StaticProvider::running(pool.clone())),
                dispatcher.clone(),
            )
            .with_call_timeout(Duration::from_secs(2)),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        addrs.push(listener.local_addr().unwrap());
        let app = build_router(coordinator.clone(), None);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        coordinators.push(coordinator);
        dispatchers.push(dispatcher);
    }

    coordinators
        .into_iter()
        .zip(dispatchers)
        .enumerate()
        .map(|(i, (coordinator, dispatcher))| {
            let peers = addrs
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, a)| a.to_string())
                .collect();
            let exchange = PeerExchange::new(PeerClient::new(0, Duration::from_secs(2))).with_static_peers(peers);
            TestNode {
                node: Node::new(coordinator, exchange).with_peer_discovery(false),
                dispatcher,
            }
        })
        .collect()
}

async fn round(nodes: &[TestNode]) {
    for n in nodes {
        n.node.cycle().await;
    }
}

#[tokio::test]
async fn loaded_cluster_expands_and_then_holds() {
    let nodes = cluster(&[0.95, 0.95, 0.95, 0.95, 0.6], Bounds::new(2, 8)).await;

    round(&nodes).await;
    round(&nodes).await;

    let expands: usize = nodes.iter().map(|n| n.dispatcher.calls().len()).sum();
    assert!(expands >= 1, "no node dispatched");
    for n in &nodes {
        let calls = n.dispatcher.calls();
        assert!(calls.len() <= 1, "node dispatched {calls:?}");
        assert!(calls.iter().all(|a| *a == ScaleAction::Expand));
    }

    // Every node that dispatched now abstains with "none".
    for n in nodes.iter().filter(|n| !n.dispatcher.calls().is_empty()) {
        let coordinator = n.node.coordinator();
        assert_eq!(coordinator.elected_action().await, Some(ScaleAction::Expand));
        assert_eq!(coordinator.nominate().await, vec![Nomination::None]);
    }

    // Further rounds never dispatch again on the same node.
    round(&nodes).await;
    for n in &nodes {
        assert!(n.dispatcher.calls().len() <= 1);
    }
}

#[tokio::test]
async fn split_cluster_never_elects() {
    let nodes = cluster(&[0.95, 0.95, 0.1, 0.1], Bounds::new(2, 8)).await;

    for _ in 0..3 {
        round(&nodes).await;
    }
    for n in &nodes {
        assert!(n.dispatcher.calls().is_empty());
        assert_eq!(n.node.coordinator().elected_action().await, None);
    }
}

#[tokio::test]
async fn tables_converge_after_a_round() {
    let nodes = cluster(&[0.6, 0.6, 0.6], Bounds::new(2, 8)).await;
    round(&nodes).await;
    round(&nodes).await;

    for n in &nodes {
        let table = n.node.coordinator().table().snapshot();
        assert_eq!(table.len(), 3);
        assert!(table.values().all(|r| r.load == Some(0.6)));
    }
}

#[tokio::test]
async fn unreachable_peer_does_not_stop_the_cycle() {
    let dead = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };
    let dispatcher = Arc::new(Recorder::default());
    let coordinator = Arc::new(Coordinator::new(
        StatsTable::new("10.3.0.1"),
        NominationEngine::new(RuleSet::from_expressions([("expand", "load > 0.9")]).unwrap(), Bounds::new(1, 4)),
        Arc::new(Load(0.99)),
        Arc::new(StaticProvider::running(["10.3.0.1"])),
        dispatcher.clone(),
    ));
    let exchange = PeerExchange::new(PeerClient::new(0, Duration::from_millis(500))).with_static_peers(vec![dead.to_string()]);
    let node = Node::new(coordinator, exchange).with_peer_discovery(false);

    let report = node.cycle().await;
    assert_eq!(report.exchange.failures.len(), 2);
    assert_eq!(report.outcome.fired(), Some(ScaleAction::Expand));
    assert_eq!(dispatcher.calls(), vec![ScaleAction::Expand]);
}
