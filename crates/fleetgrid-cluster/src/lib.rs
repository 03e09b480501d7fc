//! fleetgrid-cluster — peer-to-peer stats exchange.
//!
//! Nodes share no leader and no consensus log. Each polling cycle a node
//! pulls every peer's table (`GET /stats`), merges what it learns, and
//! pushes its merged table back (`PUT /stats`). Gossip converges because
//! every node republishes what it has heard.
//!
//! ```text
//! node A                         node B
//!   │ GET /stats ─────────────────▶ │
//!   │ ◀──────────────── {ip: rec}   │
//!   │ merge (skip own ip)           │
//!   │ PUT /stats {ip: rec} ───────▶ │ merge (skip own ip)
//! ```
//!
//! A peer that is down, slow, or answers garbage is logged and skipped;
//! it never aborts the cycle for the other peers.

pub mod client;
pub mod error;
pub mod exchange;

pub use client::PeerClient;
pub use error::{TransportError, TransportResult};
pub use exchange::{ExchangeReport, PeerExchange};
