//! StatsTable — the shared ip → record map.
//!
//! Single-writer discipline: only the local polling loop writes the local
//! node's record (via [`StatsTable::update_local`]); merges coming from
//! peers never touch it. One lock guards the whole map; records are small
//! and merges replace whole records, so nothing finer is needed.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::types::{NodeIp, NodeStatsRecord};

/// A point-in-time copy of the table, ordered by ip.
pub type StatsSnapshot = BTreeMap<NodeIp, NodeStatsRecord>;

/// Thread-safe stats table. Cloning shares the underlying map.
#[derive(Clone, Debug)]
pub struct StatsTable {
    local_ip: NodeIp,
    records: Arc<RwLock<HashMap<NodeIp, NodeStatsRecord>>>,
    /// Pool membership; `None` accepts every ip.
    members: Arc<RwLock<Option<HashSet<NodeIp>>>>,
}

impl StatsTable {
    /// Create a table seeded with an empty record for the local node.
    pub fn new(local_ip: impl Into<NodeIp>) -> Self {
        let local_ip = local_ip.into();
        let mut records = HashMap::new();
        records.insert(local_ip.clone(), NodeStatsRecord::new(local_ip.clone()));
        Self {
            local_ip,
            records: Arc::new(RwLock::new(records)),
            members: Arc::new(RwLock::new(None)),
        }
    }

    pub fn local_ip(&self) -> &str {
        &self.local_ip
    }

    // A panic while holding the lock cannot leave a record half-written
    // (every mutation is a whole-value assignment), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<NodeIp, NodeStatsRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<NodeIp, NodeStatsRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }

    fn admits(&self, ip: &str) -> bool {
        match &*self.members.read().unwrap_or_else(|e| e.into_inner()) {
            Some(members) => members.contains(ip),
            None => true,
        }
    }

    /// Mutate (creating if absent) the record for `ip`.
    pub fn update<R>(&self, ip: &str, f: impl FnOnce(&mut NodeStatsRecord) -> R) -> R {
        let mut records = self.write();
        let record = records
            .entry(ip.to_string())
            .or_insert_with(|| NodeStatsRecord::new(ip));
        f(record)
    }

    /// Mutate the local node's record.
    pub fn update_local<R>(&self, f: impl FnOnce(&mut NodeStatsRecord) -> R) -> R {
        let ip = self.local_ip.clone();
        self.update(&ip, f)
    }

    /// Upsert a peer's record verbatim (last write wins).
    ///
    /// Records claiming the local ip (or no ip), and records for ips outside
    /// the pool membership, are ignored and `false` is returned.
    pub fn merge(&self, record: NodeStatsRecord) -> bool {
        if record.ip == self.local_ip || record.ip.is_empty() || !self.admits(&record.ip) {
            return false;
        }
        self.write().insert(record.ip.clone(), record);
        true
    }

    /// Merge a whole peer table (ip → record), as received on the wire.
    /// The map key wins over any `ip` field in the body. Returns the
    /// number of records merged.
    pub fn merge_all(&self, remote: impl IntoIterator<Item = (NodeIp, NodeStatsRecord)>) -> usize {
        let members = self.members.read().unwrap_or_else(|e| e.into_inner());
        let mut records = self.write();
        let mut merged = 0;
        for (ip, mut record) in remote {
            if ip == self.local_ip || ip.is_empty() {
                continue;
            }
            if members.as_ref().is_some_and(|m| !m.contains(&ip)) {
                continue;
            }
            record.ip = ip.clone();
            records.insert(ip, record);
            merged += 1;
        }
        debug!(merged, "merged peer records");
        merged
    }

    /// Clear every record and re-seed empty records for the local node
    /// and for each ip the provider currently reports as active.
    pub fn reset(&self, active_ips: impl IntoIterator<Item = NodeIp>) {
        let mut records = self.write();
        records.clear();
        records.insert(self.local_ip.clone(), NodeStatsRecord::new(self.local_ip.clone()));
        for ip in active_ips {
            records
                .entry(ip.clone())
                .or_insert_with(|| NodeStatsRecord::new(ip));
        }
        debug!(records = records.len(), "stats table reset");
    }

    /// Restrict the table to `members` and the local node. Records for
    /// any other ip are dropped now and refused by later merges, until the
    /// next call replaces the membership. Returns the number dropped.
    pub fn retain_members(&self, members: impl IntoIterator<Item = NodeIp>) -> usize {
        let members: HashSet<NodeIp> = members.into_iter().collect();
        let mut guard = self.members.write().unwrap_or_else(|e| e.into_inner());
        let mut records = self.write();
        let before = records.len();
        records.retain(|ip, _| *ip == self.local_ip || members.contains(ip));
        let dropped = before - records.len();
        *guard = Some(members);
        if dropped > 0 {
            debug!(dropped, "dropped records outside the pool");
        }
        dropped
    }

    /// Consistent copy for tallying.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.read()
            .iter()
            .map(|(ip, r)| (ip.clone(), r.clone()))
            .collect()
    }

    pub fn get(&self, ip: &str) -> Option<NodeStatsRecord> {
        self.read().get(ip).cloned()
    }

    pub fn local(&self) -> NodeStatsRecord {
        self.get(&self.local_ip)
            .unwrap_or_else(|| NodeStatsRecord::new(self.local_ip.clone()))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
