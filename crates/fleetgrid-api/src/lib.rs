//! fleetgrid-api — the stats endpoint.
//!
//! Serves this node's stats table to peers and accepts theirs. Every
//! failure is reported in-band as a JSON string (`"Error: <message>"`)
//! with status 200, so a peer can always decode the body.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/stats` | Whole table, local record refreshed |
//! | GET | `/stats?<key>` | One computed stat |
//! | GET | `/stats/{key}` | One computed stat |
//! | PUT | `/stats` | Merge a peer's table; `"boom"` on a malformed body |
//! | POST | `/stats/reset` | Start a new epoch |
//! | GET | `/elections?limit=N` | Recent fired elections, newest first |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use fleetgrid_autoscale::Coordinator;
use fleetgrid_state::AuditStore;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<Coordinator>,
    pub audit: Option<AuditStore>,
}

pub fn build_router(coordinator: Arc<Coordinator>, audit: Option<AuditStore>) -> Router {
    let state = ApiState { coordinator, audit };

    Router::new()
        .route("/stats", get(handlers::get_stats).put(handlers::put_stats))
        .route("/stats/reset", post(handlers::reset_stats))
        .route("/stats/{key}", get(handlers::get_stat))
        .route("/elections", get(handlers::list_elections))
        .with_state(state)
}
