//! Pull/push exchange against real HTTP peers on loopback.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use fleetgrid_cluster::{PeerClient, PeerExchange, TransportError};
use fleetgrid_state::{NodeIp, NodeStatsRecord, Nomination, StatsSnapshot, StatsTable};

async fn get_stats(State(table): State<StatsTable>) -> Json<StatsSnapshot> {
    Json(table.snapshot())
}

async fn put_stats(State(table): State<StatsTable>, body: String) -> Json<serde_json::Value> {
    match serde_json::from_str::<HashMap<NodeIp, NodeStatsRecord>>(&body) {
        Ok(remote) => {
            table.merge_all(remote);
            Json(serde_json::to_value(table.snapshot()).unwrap())
        }
        Err(_) => Json(serde_json::json!("boom")),
    }
}

async fn serve(table: StatsTable) -> SocketAddr {
    let app = Router::new()
        .route("/stats", get(get_stats).put(put_stats))
        .with_state(table);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client() -> PeerClient {
    PeerClient::new(8642, Duration::from_secs(2))
}

fn voting(ip: &str, nomination: Nomination) -> StatsTable {
    let table = StatsTable::new(ip);
    table.update_local(|r| {
        r.load = Some(0.95);
        r.set_nominations(vec![nomination]);
    });
    table
}

#[tokio::test]
async fn pull_reads_whole_table() {
    let remote = voting("10.0.0.2", Nomination::Expand);
    remote.merge(NodeStatsRecord::new("10.0.0.3"));
    let addr = serve(remote).await;

    let table = client().pull(&addr.to_string()).await.unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table["10.0.0.2"].nominations, vec![Nomination::Expand]);
}

#[tokio::test]
async fn exchange_converges_both_sides() {
    let b = voting("10.0.0.2", Nomination::Expand);
    let addr = serve(b.clone()).await;

    let a = voting("10.0.0.1", Nomination::Contract);
    let report = PeerExchange::new(client())
        .with_static_peers(vec![addr.to_string()])
        .exchange(&a, Vec::new())
        .await;

    assert_eq!(report.peers, 1);
    assert_eq!(report.pulled, 1);
    assert_eq!(report.pushed, 1);
    assert!(report.failures.is_empty());

    assert_eq!(a.get("10.0.0.2").unwrap().nominations, vec![Nomination::Expand]);
    assert_eq!(b.get("10.0.0.1").unwrap().nominations, vec![Nomination::Contract]);
    // Neither side let the other overwrite its own record.
    assert_eq!(a.local().nominations, vec![Nomination::Contract]);
    assert_eq!(b.local().nominations, vec![Nomination::Expand]);
}

#[tokio::test]
async fn dead_peer_does_not_block_live_one() {
    let live = serve(voting("10.0.0.2", Nomination::Expand)).await;
    let dead = {
        let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap()
    };

    let a = StatsTable::new("10.0.0.1");
    let report = PeerExchange::new(client())
        .with_static_peers(vec![dead.to_string(), live.to_string()])
        .exchange(&a, Vec::new())
        .await;

    assert_eq!(report.pulled, 1);
    assert_eq!(report.pushed, 1);
    assert_eq!(report.failures.len(), 2);
    assert!(
        report
            .failures
            .iter()
            .all(|e| matches!(e, TransportError::Connect { .. }))
    );
    assert!(a.get("10.0.0.2").is_some());
}
