//! Coordinator — the per-node autoscaling state and its operations.
//!
//! Owns the stats table, the nomination engine, the election state, and
//! the collaborators. Shared as `Arc<Coordinator>` between the polling
//! loop and the stats endpoint; every method takes `&self`.
//!
//! # Epochs and cycles
//!
//! An *epoch* runs from one [`Coordinator::reset`] to the next. Within an
//! epoch the polling loop runs many *cycles*; each cycle starts with
//! [`Coordinator::refresh`], which drops memoized measurements so that
//! load and instance counts are re-read. The election state and the peer
//! records survive a refresh and are cleared only by a reset.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fleetgrid_provider::{ActionDispatcher, CloudProvider, MetricsSource, ProviderError, ProviderResult};
use fleetgrid_state::{AuditStore, NodeIp, NodeStatsRecord, Nomination, ScaleAction, StatsSnapshot, StatsTable};

use crate::election::{Decision, ElectionCoordinator, ElectionOutcome};
use crate::nomination::{
    METRIC_INSTANCES, METRIC_LOAD, METRIC_MAX_INSTANCES, METRIC_MIN_INSTANCES, NominationEngine,
    NominationInputs,
};

/// Failure to produce a computed stat.
#[derive(Debug, Error)]
pub enum StatError {
    #[error("unknown stat {0}")]
    Unknown(String),

    #[error(transparent)]
    Unavailable(#[from] ProviderError),

    #[error("cannot encode stat: {0}")]
    Encode(String),
}

/// Measurements memoized until the next refresh or reset.
#[derive(Debug, Default)]
struct MeasurementCache {
    load: Option<f64>,
    running: Option<u32>,
    nominated: bool,
    computed: HashMap<String, Value>,
}

pub struct Coordinator {
    table: StatsTable,
    engine: NominationEngine,
    metrics: Arc<dyn MetricsSource>,
    provider: Arc<dyn CloudProvider>,
    election: Mutex<ElectionCoordinator>,
    cache: Mutex<MeasurementCache>,
    call_timeout: Duration,
    settle_timeout: Duration,
    pool_membership: bool,
}

impl Coordinator {
    pub fn new(
        table: StatsTable,
        engine: NominationEngine,
        metrics: Arc<dyn MetricsSource>,
        provider: Arc<dyn CloudProvider>,
        dispatcher: Arc<dyn ActionDispatcher>,
    ) -> Self {
        Self {
            table,
            engine,
            metrics,
            provider,
            election: Mutex::new(ElectionCoordinator::new(dispatcher)),
            cache: Mutex::new(MeasurementCache::default()),
            call_timeout: Duration::from_secs(5),
            settle_timeout: Duration::from_secs(600),
            pool_membership: false,
        }
    }

    /// Record fired elections in `audit`.
    pub fn with_audit(self, audit: AuditStore) -> Self {
        let election = self.election.into_inner().with_audit(audit);
        Self {
            election: Mutex::new(election),
            ..self
        }
    }

    /// Upper bound on any single collaborator call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Upper bound on one call to the action command.
    pub fn with_dispatch_timeout(self, timeout: Duration) -> Self {
        let election = self.election.into_inner().with_dispatch_timeout(timeout);
        Self {
            election: Mutex::new(election),
            ..self
        }
    }

    /// Treat the provider's active instances as the whole pool: records
    /// for any other ip are dropped whenever the provider answers, and
    /// refused by later merges.
    pub fn with_pool_membership(mut self, enabled: bool) -> Self {
        self.pool_membership = enabled;
        self
    }

    /// How long an elected action may stay unconfirmed before the epoch
    /// is closed anyway.
    pub fn with_settle_timeout(mut self, timeout: Duration) -> Self {
        self.settle_timeout = timeout;
        self
    }

    pub fn table(&self) -> &StatsTable {
        &self.table
    }

    pub fn engine(&self) -> &NominationEngine {
        &self.engine
    }

    pub fn local_ip(&self) -> &str {
        self.table.local_ip()
    }

    pub async fn elected_action(&self) -> Option<ScaleAction> {
        self.election.lock().await.elected_action()
    }

    async fn bounded<T, F>(&self, what: &str, fut: F) -> ProviderResult<T>
    where
        F: Future<Output = ProviderResult<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                what: what.to_string(),
                after: self.call_timeout,
            }),
        }
    }

    // ── Measurements ───────────────────────────────────────────────

    /// Local load, measured at most once per cycle.
    pub async fn load(&self) -> ProviderResult<f64> {
        let mut cache = self.cache.lock().await;
        if let Some(load) = cache.load {
            return Ok(load);
        }
        let load = self.bounded("load measurement", self.metrics.current_load()).await?;
        cache.load = Some(load);
        Ok(load)
    }

    /// Running instance count, read at most once per cycle.
    pub async fn running_count(&self) -> ProviderResult<u32> {
        let mut cache = self.cache.lock().await;
        if let Some(running) = cache.running {
            return Ok(running);
        }
        let running = self.fresh_running_count().await?;
        cache.running = Some(running);
        Ok(running)
    }

    async fn fresh_running_count(&self) -> ProviderResult<u32> {
        let instances = self.bounded("instance listing", self.provider.instances()).await?;
        Ok(instances.iter().filter(|i| i.is_running()).count() as u32)
    }

    /// Ips the provider reports as pending or running, or `None` when it
    /// does not answer. With pool membership on, the table is narrowed to
    /// them.
    pub async fn sync_membership(&self) -> Option<Vec<NodeIp>> {
        let instances = match self.bounded("instance listing", self.provider.instances()).await {
            Ok(instances) => instances,
            Err(e) => {
                warn!(error = %e, "cannot list active instances");
                return None;
            }
        };
        let active: Vec<NodeIp> = instances
            .into_iter()
            .filter(|i| i.is_active())
            .map(|i| i.ip)
            .collect();
        if self.pool_membership {
            let dropped = self.table.retain_members(active.iter().cloned());
            if dropped > 0 {
                info!(dropped, "departed instances removed from stats table");
            }
        }
        Some(active)
    }

    /// Ips the provider reports as pending or running. Empty on failure.
    pub async fn active_ips(&self) -> Vec<NodeIp> {
        self.sync_membership().await.unwrap_or_default()
    }

    async fn in_flight(&self) -> bool {
        if self.elected_action().await.is_some() {
            return true;
        }
        match self
            .bounded("scaling status", self.provider.scaling_in_progress())
            .await
        {
            Ok(scaling) => scaling,
            Err(e) => {
                warn!(error = %e, "scaling status unknown, assuming idle");
                false
            }
        }
    }

    // ── Nomination ─────────────────────────────────────────────────

    /// Compute this node's ballot and write it (with the current load) into
    /// the local record.
    pub async fn nominate(&self) -> Vec<Nomination> {
        let in_flight = self.in_flight().await;

        let running = self
            .running_count()
            .await
            .inspect_err(|e| warn!(error = %e, "running count unavailable"))
            .ok();
        let load = self
            .load()
            .await
            .inspect_err(|e| warn!(error = %e, "load unavailable"))
            .ok();

        let bounds = self.engine.bounds();
        let mut metrics = HashMap::from([
            (METRIC_MIN_INSTANCES.to_string(), bounds.min_instances as f64),
            (METRIC_MAX_INSTANCES.to_string(), bounds.max_instances as f64),
        ]);
        if let Some(load) = load {
            metrics.insert(METRIC_LOAD.to_string(), load);
        }
        if let Some(running) = running {
            metrics.insert(METRIC_INSTANCES.to_string(), running as f64);
        }

        let inputs = NominationInputs {
            in_flight,
            running,
            metrics,
        };
        let nominations = self.engine.nominate(&inputs);

        self.table.update_local(|record| {
            if load.is_some() {
                record.load = load;
            }
            record.set_nominations(nominations.clone());
        });
        self.cache.lock().await.nominated = true;

        debug!(?nominations, ?load, ?running, in_flight, "nominated");
        nominations
    }

    // ── Stats endpoint ─────────────────────────────────────────────

    /// Ensure the local record carries a load and a ballot for this cycle,
    /// then return the whole table.
    pub async fn default_stats(&self) -> StatsSnapshot {
        let nominated = self.cache.lock().await.nominated;
        if !nominated {
            self.nominate().await;
        } else if self.table.local().load.is_none() {
            if let Ok(load) = self.load().await {
                self.table.update_local(|r| r.load = Some(load));
            }
        }
        self.table.snapshot()
    }

    /// A named computed value, cached until the next refresh.
    pub async fn stat(&self, key: &str) -> Result<Value, StatError> {
        if let Some(value) = self.cache.lock().await.computed.get(key) {
            return Ok(value.clone());
        }

        let bounds = self.engine.bounds();
        let value = match key {
            "load" => json!(self.load().await?),
            "nominations" => json!(self.nominate().await),
            "instances" => json!(self.running_count().await?),
            "min_instances" => json!(bounds.min_instances),
            "max_instances" => json!(bounds.max_instances),
            "can_expand" => json!(bounds.can_expand(self.running_count().await?)),
            "can_contract" => json!(bounds.can_contract(self.running_count().await?)),
            "rules" => serde_json::to_value(self.engine.rules()).map_err(|e| StatError::Encode(e.to_string()))?,
            // Election state is live; never cached.
            "elected_action" => return Ok(json!(self.elected_action().await)),
            other => return Err(StatError::Unknown(other.to_string())),
        };

        self.cache
            .lock()
            .await
            .computed
            .insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Merge a peer's table. The local record is never overwritten, and
    /// with pool membership on, records for departed ips are refused.
    pub fn merge_remote(&self, remote: HashMap<NodeIp, NodeStatsRecord>) -> usize {
        self.table.merge_all(remote)
    }

    // ── Election ───────────────────────────────────────────────────

    /// Tally the current table and dispatch if a threshold is crossed.
    ///
    /// When an election fires the table is re-seeded for the next round
    /// and the local record is annotated with the elected action; the
    /// election state itself stays set until [`Coordinator::settle`] or
    /// [`Coordinator::reset`] clears it.
    ///
    /// The action is elected before the dispatcher runs, and the election
    /// lock is not held across the dispatch call.
    pub async fn tally(&self) -> ElectionOutcome {
        let snapshot = self.table.snapshot();
        let running = self.running_count().await.ok();

        let pending = match self.election.lock().await.decide(&snapshot, running) {
            Decision::Done(outcome) => return outcome,
            Decision::Dispatch(pending) => pending,
        };
        let error = pending.run().await;
        let outcome = self.election.lock().await.record(&snapshot, &pending, error);

        let action = pending.action;
        let active = self.active_ips().await;
        self.table.reset(active);
        // An operator reset during the dispatch wins.
        if self.elected_action().await == Some(action) {
            self.table.update_local(|r| r.elected_action = Some(action));
        }
        *self.cache.lock().await = MeasurementCache::default();
        outcome
    }

    /// Close the epoch once the provider reflects the elected action, or
    /// once `settle_timeout` has passed. Returns whether a reset happened.
    pub async fn settle(&self) -> bool {
        let state = self.election.lock().await.state().clone();
        let (Some(action), Some(elected_at)) = (state.elected_action, state.elected_at) else {
            return false;
        };

        let current = match self.fresh_running_count().await {
            Ok(n) => Some(n),
            Err(e) => {
                debug!(error = %e, "cannot confirm elected action yet");
                None
            }
        };

        let confirmed = match (state.baseline_running, current) {
            (Some(before), Some(now)) => match action {
                ScaleAction::Expand => now > before,
                ScaleAction::Contract => now < before,
            },
            _ => false,
        };

        if confirmed {
            info!(%action, before = ?state.baseline_running, now = ?current, "provider reflects elected action");
        } else if elapsed_since(elected_at) >= self.settle_timeout {
            warn!(%action, timeout = ?self.settle_timeout, "elected action not reflected in time, closing epoch");
        } else {
            return false;
        }

        self.reset().await;
        true
    }

    /// Start a fresh epoch: clear the election, every record, and all
    /// memoized measurements, then re-seed the local node and every
    /// active pool member.
    pub async fn reset(&self) {
        let active = self.active_ips().await;
        self.election.lock().await.reset();
        self.table.reset(active);
        *self.cache.lock().await = MeasurementCache::default();
        info!(records = self.table.len(), "epoch reset");
    }

    /// Drop memoized measurements so the next cycle re-reads them.
    pub async fn refresh(&self) {
        *self.cache.lock().await = MeasurementCache::default();
    }
}

fn elapsed_since(t: std::time::Instant) -> Duration {
    std::time::Instant::now().saturating_duration_since(t)
}
