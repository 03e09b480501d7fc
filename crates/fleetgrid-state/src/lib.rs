//! fleetgrid-state — the cluster's eventually-consistent view.
//!
//! Two pieces of state live here:
//!
//! - [`StatsTable`]: ip → [`NodeStatsRecord`], in memory, shared between
//!   the polling loop (writes the local record) and the stats endpoint
//!   (merges peer records). Last write wins per ip.
//! - [`AuditStore`]: a redb database of fired elections, kept so operators
//!   can reconstruct why the pool grew or shrank.
//!
//! # Architecture
//!
//! Audit records are JSON-serialized into redb's `&[u8]` value columns,
//! keyed by a zero-padded `{epoch_millis}:{seq}` so that key order is
//! chronological. The `AuditStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`).

pub mod error;
pub mod store;
pub mod table;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::AuditStore;
pub use table::{StatsSnapshot, StatsTable};
pub use types::*;
