//! HTTP/1 client for a peer's stats endpoint.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use tracing::debug;

use fleetgrid_state::{NodeIp, NodeStatsRecord, StatsSnapshot};

use crate::error::{TransportError, TransportResult};

#[derive(Debug, Clone)]
pub struct PeerClient {
    port: u16,
    timeout: Duration,
}

impl PeerClient {
    /// `port` is used for peers given as a bare ip or host name.
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `host:port` for a peer given as `ip`, `ip:port`, `host` or `host:port`.
    pub fn address(&self, peer: &str) -> String {
        if peer.parse::<SocketAddr>().is_ok() {
            return peer.to_string();
        }
        if let Ok(ip) = peer.parse::<IpAddr>() {
            return SocketAddr::new(ip, self.port).to_string();
        }
        match peer.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => peer.to_string(),
            _ => format!("{peer}:{}", self.port),
        }
    }

    /// Fetch a peer's whole stats table.
    pub async fn pull(&self, peer: &str) -> TransportResult<HashMap<NodeIp, NodeStatsRecord>> {
        let body = self.request(peer, Method::GET, Bytes::new()).await?;
        decode_table(peer, &body)
    }

    /// Send our table to a peer for merging.
    pub async fn push(&self, peer: &str, snapshot: &StatsSnapshot) -> TransportResult<()> {
        let payload = serde_json::to_vec(snapshot).map_err(|e| TransportError::Decode {
            peer: peer.to_string(),
            reason: e.to_string(),
        })?;
        let body = self.request(peer, Method::PUT, Bytes::from(payload)).await?;

        // The reply is the peer's merged table, or a bare JSON string when
        // it refused ours.
        if let Ok(message) = serde_json::from_slice::<String>(&body) {
            return Err(TransportError::Rejected {
                peer: peer.to_string(),
                message,
            });
        }
        Ok(())
    }

    async fn request(&self, peer: &str, method: Method, payload: Bytes) -> TransportResult<Bytes> {
        let address = self.address(peer);
        let uri = format!("http://{address}/stats");

        let exchange = async {
            let connect_err = |reason: String| TransportError::Connect {
                peer: peer.to_string(),
                reason,
            };

            let stream = tokio::net::TcpStream::connect(&address)
                .await
                .map_err(|e| connect_err(e.to_string()))?;

            let io = hyper_util::rt::TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| connect_err(format!("handshake: {e}")))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let req = http::Request::builder()
                .method(method)
                .uri(&uri)
                .header(http::header::HOST, &address)
                .header(http::header::USER_AGENT, "fleetgrid-cluster/0.1")
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(Full::new(payload))
                .map_err(|e| connect_err(e.to_string()))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| connect_err(e.to_string()))?;

            let status = resp.status();
            if status != StatusCode::OK {
                return Err(TransportError::Status {
                    peer: peer.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| TransportError::Body {
                    peer: peer.to_string(),
                    reason: e.to_string(),
                })?
                .to_bytes();
            debug!(%uri, bytes = body.len(), "peer answered");
            Ok(body)
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                peer: peer.to_string(),
                after: self.timeout,
            }),
        }
    }
}

/// Decode a `GET /stats` reply. A bare JSON string is the peer reporting
/// an error.
pub fn decode_table(peer: &str, body: &[u8]) -> TransportResult<HashMap<NodeIp, NodeStatsRecord>> {
    match serde_json::from_slice(body) {
        Ok(table) => Ok(table),
        Err(e) => match serde_json::from_slice::<String>(body) {
            Ok(message) => Err(TransportError::Rejected {
                peer: peer.to_string(),
                message,
            }),
            Err(_) => Err(TransportError::Decode {
                peer: peer.to_string(),
                reason: e.to_string(),
            }),
        },
    }
}
