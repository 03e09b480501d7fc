//! Local host identity.

use std::net::UdpSocket;

use crate::error::{ProviderError, ProviderResult};

/// Determine the ip this host uses for outbound traffic.
///
/// "Connecting" a UDP socket only selects a route; no packet is sent.
pub fn detect_local_ip() -> ProviderResult<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| ProviderError::MetricUnavailable(format!("bind: {e}")))?;
    socket
        .connect("8.8.8.8:80")
        .map_err(|e| ProviderError::MetricUnavailable(format!("no outbound route: {e}")))?;
    let addr = socket
        .local_addr()
        .map_err(|e| ProviderError::MetricUnavailable(format!("local_addr: {e}")))?;
    Ok(addr.ip().to_string())
}
