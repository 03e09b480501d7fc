//! ElectionCoordinator — tallies ballots and dispatches at most once.
//!
//! # Quorum rule
//!
//! ```text
//! expand_votes   = records nominating "expand"
//! contract_votes = records nominating "contract"
//! total          = records in the table (0 → abstain)
//!
//! (expand_votes - contract_votes) / total > 0.5   → expand
//! (contract_votes - expand_votes) / total > 0.5   → contract
//! ```
//!
//! The signed difference rewards agreement rather than plurality: with 4
//! nodes, 3 expand votes against 1 contract is exactly 0.5 and does not
//! fire. Records without a ballot (or voting "none") count toward `total`
//! only.
//!
//! Duplicate suppression is local and best effort: two nodes that both see
//! no elected action can both dispatch.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, info, warn};

use fleetgrid_provider::{ActionDispatcher, ProviderError};
use fleetgrid_state::{AuditStore, ElectionRecord, Nomination, ScaleAction, StatsSnapshot};

/// Vote counts over one table snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub expand_votes: u32,
    pub contract_votes: u32,
    pub total: u32,
}

impl Tally {
    pub fn from_snapshot(snapshot: &StatsSnapshot) -> Self {
        let mut tally = Tally {
            expand_votes: 0,
            contract_votes: 0,
            total: snapshot.len() as u32,
        };
        for record in snapshot.values() {
            if record.nominates(&Nomination::Expand) {
                tally.expand_votes += 1;
            }
            if record.nominates(&Nomination::Contract) {
                tally.contract_votes += 1;
            }
        }
        tally
    }

    /// The side whose signed margin over `total` exceeds one half, if any.
    /// An empty table never elects.
    pub fn winner(&self) -> Option<ScaleAction> {
        if self.total == 0 {
            return None;
        }
        let total = self.total as f64;
        let expand = self.expand_votes as f64;
        let contract = self.contract_votes as f64;

        if (expand - contract) / total > 0.5 {
            Some(ScaleAction::Expand)
        } else if (contract - expand) / total > 0.5 {
            Some(ScaleAction::Contract)
        } else {
            None
        }
    }
}

/// What a tally request resulted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ElectionOutcome {
    /// No records known; nothing counted.
    Abstained,
    /// Neither side crossed the threshold.
    NoQuorum { tally: Tally },
    /// The winning side is already the elected action; nothing dispatched.
    AlreadyElected { action: ScaleAction, tally: Tally },
    /// The action was dispatched. `error` carries a failed dispatch; the
    /// action counts as elected either way.
    Elected {
        action: ScaleAction,
        tally: Tally,
        error: Option<String>,
    },
}

impl ElectionOutcome {
    pub fn fired(&self) -> Option<ScaleAction> {
        match self {
            ElectionOutcome::Elected { action, .. } => Some(*action),
            _ => None,
        }
    }
}

/// Per-epoch election state. The only thing standing between a
/// repeated tally and a repeated dispatch.
#[derive(Debug, Clone, Default)]
pub struct ElectionState {
    pub elected_action: Option<ScaleAction>,
    /// When the current action was elected.
    pub elected_at: Option<Instant>,
    /// Running instance count observed when the action was dispatched.
    pub baseline_running: Option<u32>,
}

/// What [`ElectionCoordinator::decide`] concluded.
pub enum Decision {
    /// Nothing to dispatch.
    Done(ElectionOutcome),
    /// An action was just elected and must be dispatched.
    Dispatch(PendingDispatch),
}

/// An elected action waiting for its dispatch call.
///
/// Runs without borrowing the coordinator, so the election state stays
/// readable while the action command executes.
pub struct PendingDispatch {
    pub action: ScaleAction,
    pub tally: Tally,
    dispatcher: Arc<dyn ActionDispatcher>,
    timeout: Duration,
}

impl PendingDispatch {
    /// Dispatch under the timeout. Returns the failure, if any.
    pub async fn run(&self) -> Option<String> {
        let result = match tokio::time::timeout(self.timeout, self.dispatcher.dispatch(self.action)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                what: format!("{} dispatch", self.action),
                after: self.timeout,
            }),
        };
        result.err().map(|e| e.to_string())
    }
}

/// Owns the election state and the dispatcher.
pub struct ElectionCoordinator {
    state: ElectionState,
    dispatcher: Arc<dyn ActionDispatcher>,
    dispatch_timeout: Duration,
    audit: Option<AuditStore>,
}

impl ElectionCoordinator {
    pub fn new(dispatcher: Arc<dyn ActionDispatcher>) -> Self {
        Self {
            state: ElectionState::default(),
            dispatcher,
            dispatch_timeout: Duration::from_secs(120),
            audit: None,
        }
    }

    /// Persist every fired election to the audit log.
    pub fn with_audit(mut self, audit: AuditStore) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Upper bound on one dispatch call.
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn state(&self) -> &ElectionState {
        &self.state
    }

    pub fn elected_action(&self) -> Option<ScaleAction> {
        self.state.elected_action
    }

    /// Tally `snapshot`. A winner that is not already elected becomes the
    /// elected action immediately and is handed back for dispatch.
    /// `running` is recorded as the settlement baseline.
    pub fn decide(&mut self, snapshot: &StatsSnapshot, running: Option<u32>) -> Decision {
        let tally = Tally::from_snapshot(snapshot);
        if tally.total == 0 {
            debug!("empty stats table, abstaining");
            return Decision::Done(ElectionOutcome::Abstained);
        }

        let action = match tally.winner() {
            Some(action) => action,
            None => {
                debug!(?tally, "no quorum");
                return Decision::Done(ElectionOutcome::NoQuorum { tally });
            }
        };

        if self.state.elected_action == Some(action) {
            debug!(%action, ?tally, "action already elected, not re-dispatching");
            return Decision::Done(ElectionOutcome::AlreadyElected { action, tally });
        }

        // Elected before the dispatch runs; a failed dispatch does not undo it.
        self.state = ElectionState {
            elected_action: Some(action),
            elected_at: Some(Instant::now()),
            baseline_running: running,
        };

        Decision::Dispatch(PendingDispatch {
            action,
            tally,
            dispatcher: self.dispatcher.clone(),
            timeout: self.dispatch_timeout,
        })
    }

    /// Log and audit a dispatched election.
    pub fn record(&self, snapshot: &StatsSnapshot, pending: &PendingDispatch, error: Option<String>) -> ElectionOutcome {
        let (action, tally) = (pending.action, pending.tally);
        let epoch_millis = epoch_millis();
        let snapshot_json = serde_json::to_string(snapshot).unwrap_or_default();
        match &error {
            None => info!(
                timestamp = epoch_millis,
                %action,
                expand_votes = tally.expand_votes,
                contract_votes = tally.contract_votes,
                total = tally.total,
                snapshot = %snapshot_json,
                "election fired"
            ),
            Some(e) => warn!(
                timestamp = epoch_millis,
                %action,
                expand_votes = tally.expand_votes,
                contract_votes = tally.contract_votes,
                total = tally.total,
                snapshot = %snapshot_json,
                error = %e,
                "election fired but dispatch failed"
            ),
        }

        if let Some(audit) = &self.audit {
            let record = ElectionRecord {
                epoch_millis,
                action,
                expand_votes: tally.expand_votes,
                contract_votes: tally.contract_votes,
                total: tally.total,
                snapshot: snapshot.clone(),
                dispatched: error.is_none(),
                error: error.clone(),
            };
            if let Err(e) = audit.append_election(&record) {
                warn!(error = %e, "failed to persist election record");
            }
        }

        ElectionOutcome::Elected { action, tally, error }
    }

    /// Decide, dispatch and record in one step.
    pub async fn elect(&mut self, snapshot: &StatsSnapshot, running: Option<u32>) -> ElectionOutcome {
        match self.decide(snapshot, running) {
            Decision::Done(outcome) => outcome,
            Decision::Dispatch(pending) => {
                let error = pending.run().await;
                self.record(snapshot, &pending, error)
            }
        }
    }

    /// Clear the elected action, starting a fresh epoch.
    pub fn reset(&mut self) {
        if let Some(action) = self.state.elected_action {
            info!(%action, "election state cleared");
        }
        self.state = ElectionState::default();
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
