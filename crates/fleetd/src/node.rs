//! The polling loop.
//!
//! One cycle:
//!
//! ```text
//! refresh  → drop last cycle's measurements
//! pool     → drop records of instances the provider no longer lists
//! settle   → close the epoch if the elected action has landed
//! nominate → write this node's ballot
//! exchange → pull peer tables, push ours back
//! tally    → elect and dispatch if the margin is there
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use fleetgrid_autoscale::{Coordinator, ElectionOutcome};
use fleetgrid_cluster::{ExchangeReport, PeerExchange};
use fleetgrid_state::Nomination;

#[derive(Debug)]
pub struct CycleReport {
    pub settled: bool,
    pub nominations: Vec<Nomination>,
    pub exchange: ExchangeReport,
    pub outcome: ElectionOutcome,
}

pub struct Node {
    coordinator: Arc<Coordinator>,
    exchange: PeerExchange,
    discover_peers: bool,
}

impl Node {
    pub fn new(coordinator: Arc<Coordinator>, exchange: PeerExchange) -> Self {
        Self {
            coordinator,
            exchange,
            discover_peers: true,
        }
    }

    /// Contact provider-listed instances in addition to static peers.
    pub fn with_peer_discovery(mut self, enabled: bool) -> Self {
        self.discover_peers = enabled;
        self
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub async fn cycle(&self) -> CycleReport {
        self.coordinator.refresh().await;
        let pool = self.coordinator.sync_membership().await;
        let settled = self.coordinator.settle().await;
        let nominations = self.coordinator.nominate().await;

        let local = self.coordinator.local_ip();
        let discovered = match pool {
            Some(ips) if self.discover_peers => ips.into_iter().filter(|ip| ip != local).collect(),
            _ => Vec::new(),
        };
        let exchange = self
            .exchange
            .exchange(self.coordinator.table(), discovered)
            .await;

        let outcome = self.coordinator.tally().await;
        debug!(
            settled,
            ?nominations,
            peers = exchange.peers,
            pulled = exchange.pulled,
            failures = exchange.failures.len(),
            ?outcome,
            "cycle complete"
        );

        CycleReport {
            settled,
            nominations,
            exchange,
            outcome,
        }
    }

    /// Run cycles every `interval` until `shutdown` flips.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), node = %self.coordinator.local_ip(), "polling loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    self.cycle().await;
                }
                _ = shutdown.changed() => {
                    info!("polling loop shutting down");
                    break;
                }
            }
        }
    }
}
