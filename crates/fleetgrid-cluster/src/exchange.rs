//! One round of pull-then-push gossip with every known peer.

use std::collections::BTreeSet;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use fleetgrid_state::{NodeIp, StatsTable};

use crate::client::PeerClient;
use crate::error::TransportError;

/// What happened during one exchange round.
#[derive(Debug, Default)]
pub struct ExchangeReport {
    pub peers: usize,
    pub pulled: usize,
    pub pushed: usize,
    /// Records merged into the local table.
    pub merged: usize,
    pub failures: Vec<TransportError>,
}

#[derive(Debug, Clone)]
pub struct PeerExchange {
    client: PeerClient,
    static_peers: Vec<String>,
}

impl PeerExchange {
    pub fn new(client: PeerClient) -> Self {
        Self {
            client,
            static_peers: Vec::new(),
        }
    }

    /// Peers to contact every round in addition to the discovered ones.
    pub fn with_static_peers(mut self, peers: Vec<String>) -> Self {
        self.static_peers = peers;
        self
    }

    /// Static peers plus `discovered`, without this node and without
    /// duplicates.
    pub fn targets(&self, local_ip: &str, discovered: Vec<NodeIp>) -> Vec<String> {
        let local_addr = self.client.address(local_ip);
        let mut seen = BTreeSet::new();
        self.static_peers
            .iter()
            .cloned()
            .chain(discovered)
            .filter(|peer| peer != local_ip && self.client.address(peer) != local_addr)
            .filter(|peer| seen.insert(self.client.address(peer)))
            .collect()
    }

    /// Pull every peer's table into `table`, then push the merged table
    /// back to each of them.
    pub async fn exchange(&self, table: &StatsTable, discovered: Vec<NodeIp>) -> ExchangeReport {
        let targets = self.targets(table.local_ip(), discovered);
        let mut report = ExchangeReport {
            peers: targets.len(),
            ..Default::default()
        };
        if targets.is_empty() {
            return report;
        }

        let mut pulls = JoinSet::new();
        for peer in &targets {
            let client = self.client.clone();
            let peer = peer.clone();
            pulls.spawn(async move { client.pull(&peer).await.map(|t| (peer, t)) });
        }
        while let Some(joined) = pulls.join_next().await {
            match joined {
                Ok(Ok((peer, remote))) => {
                    let merged = table.merge_all(remote);
                    debug!(%peer, merged, "pulled peer stats");
                    report.pulled += 1;
                    report.merged += merged;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "stats pull failed");
                    report.failures.push(e);
                }
                Err(e) => warn!(error = %e, "stats pull task failed"),
            }
        }

        let snapshot = table.snapshot();
        let mut pushes = JoinSet::new();
        for peer in targets {
            let client = self.client.clone();
            let snapshot = snapshot.clone();
            pushes.spawn(async move { client.push(&peer, &snapshot).await });
        }
        while let Some(joined) = pushes.join_next().await {
            match joined {
                Ok(Ok(())) => report.pushed += 1,
                Ok(Err(e)) => {
                    warn!(error = %e, "stats push failed");
                    report.failures.push(e);
                }
                Err(e) => warn!(error = %e, "stats push task failed"),
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn exchange(static_peers: &[&str]) -> PeerExchange {
        PeerExchange::new(PeerClient::new(8642, Duration::from_secs(1)))
            .with_static_peers(static_peers.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn targets_skip_self_and_duplicates() {
        let x = exchange(&["10.0.0.2", "10.0.0.3:8642"]);
        let targets = x.targets(
            "10.0.0.1",
            vec!["10.0.0.1".into(), "10.0.0.2".into(), "10.0.0.3".into(), "10.0.0.4".into()],
        );
        assert_eq!(targets, vec!["10.0.0.2", "10.0.0.3:8642", "10.0.0.4"]);
    }

    #[tokio::test]
    async fn no_peers_is_empty_round() {
        let table = StatsTable::new("10.0.0.1");
        let report = exchange(&[]).exchange(&table, vec!["10.0.0.1".into()]).await;
        assert_eq!(report.peers, 0);
        assert!(report.failures.is_empty());
    }
}
