use std::time::Duration;

use thiserror::Error;

/// Failure talking to one peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot reach {peer}: {reason}")]
    Connect { peer: String, reason: String },

    #[error("{peer} did not answer within {after:?}")]
    Timeout { peer: String, after: Duration },

    #[error("{peer} answered with status {status}")]
    Status { peer: String, status: u16 },

    #[error("reading response from {peer}: {reason}")]
    Body { peer: String, reason: String },

    #[error("undecodable stats from {peer}: {reason}")]
    Decode { peer: String, reason: String },

    #[error("{peer} rejected the request: {message}")]
    Rejected { peer: String, message: String },
}

pub type TransportResult<T> = Result<T, TransportError>;
