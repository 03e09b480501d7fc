//! Domain types shared across the autoscaler.
//!
//! These are also the wire schema of the stats endpoint: a table is sent
//! as a JSON object mapping ip → [`NodeStatsRecord`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A node's ip address, used as the stats table key.
pub type NodeIp = String;

// ── Actions ─────────────────────────────────────────────────────────

/// A scaling direction the cluster can elect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleAction {
    Expand,
    Contract,
}

impl ScaleAction {
    /// The literal argument handed to the action command.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScaleAction::Expand => "expand",
            ScaleAction::Contract => "contract",
        }
    }

    pub fn nomination(&self) -> Nomination {
        match self {
            ScaleAction::Expand => Nomination::Expand,
            ScaleAction::Contract => Nomination::Contract,
        }
    }
}

impl fmt::Display for ScaleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a node's ballot.
///
/// Serialized as a bare string. Classes that are neither expand nor
/// contract are carried under their own name and never counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Nomination {
    Expand,
    Contract,
    None,
    Custom(String),
}

impl Nomination {
    pub fn as_str(&self) -> &str {
        match self {
            Nomination::Expand => "expand",
            Nomination::Contract => "contract",
            Nomination::None => "none",
            Nomination::Custom(s) => s,
        }
    }
}

impl From<String> for Nomination {
    fn from(s: String) -> Self {
        match s.as_str() {
            "expand" => Nomination::Expand,
            "contract" => Nomination::Contract,
            "none" => Nomination::None,
            _ => Nomination::Custom(s),
        }
    }
}

impl From<&str> for Nomination {
    fn from(s: &str) -> Self {
        Nomination::from(s.to_string())
    }
}

impl From<Nomination> for String {
    fn from(n: Nomination) -> Self {
        match n {
            Nomination::Custom(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Nomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Stats records ───────────────────────────────────────────────────

/// One node's contribution to the shared table.
///
/// All fields default so that a freshly seeded `{}` record (or a peer
/// payload that omits `ip`) still decodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatsRecord {
    #[serde(default)]
    pub ip: NodeIp,
    /// 1-minute load average, unset until measured this epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<f64>,
    #[serde(default)]
    pub nominations: Vec<Nomination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elected_action: Option<ScaleAction>,
}

impl NodeStatsRecord {
    /// An empty record, as seeded at the start of an epoch.
    pub fn new(ip: impl Into<NodeIp>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    /// Replace the ballot, dropping duplicates but keeping first-seen order.
    pub fn set_nominations(&mut self, nominations: Vec<Nomination>) {
        let mut deduped: Vec<Nomination> = Vec::with_capacity(nominations.len());
        for n in nominations {
            if !deduped.contains(&n) {
                deduped.push(n);
            }
        }
        self.nominations = deduped;
    }

    pub fn nominates(&self, nomination: &Nomination) -> bool {
        self.nominations.contains(nomination)
    }
}

// ── Bounds ──────────────────────────────────────────────────────────

/// Configured instance-count limits for the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_instances: u32,
    pub max_instances: u32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_instances: 2,
            max_instances: 5,
        }
    }
}

impl Bounds {
    pub fn new(min_instances: u32, max_instances: u32) -> Self {
        Self {
            min_instances,
            max_instances,
        }
    }

    pub fn can_expand(&self, running: u32) -> bool {
        running < self.max_instances
    }

    pub fn can_contract(&self, running: u32) -> bool {
        running > self.min_instances
    }
}

// ── Provider view ───────────────────────────────────────────────────

/// Lifecycle status of a pool instance as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    #[serde(other)]
    Unknown,
}

/// A pool member as described by the cloud provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub ip: NodeIp,
    pub status: InstanceStatus,
}

impl InstanceInfo {
    pub fn running(ip: impl Into<NodeIp>) -> Self {
        Self {
            ip: ip.into(),
            status: InstanceStatus::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == InstanceStatus::Running
    }

    /// Running or about to run; these members get a seat in a fresh table.
    pub fn is_active(&self) -> bool {
        matches!(self.status, InstanceStatus::Running | InstanceStatus::Pending)
    }
}

// ── Audit ───────────────────────────────────────────────────────────

/// A fired election, as persisted in the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionRecord {
    /// Unix timestamp (milliseconds) of the decision.
    pub epoch_millis: u64,
    pub action: ScaleAction,
    pub expand_votes: u32,
    pub contract_votes: u32,
    pub total: u32,
    /// The table the tally was computed from.
    pub snapshot: BTreeMap<NodeIp, NodeStatsRecord>,
    /// Whether the action command reported success.
    pub dispatched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_wire_round_trip() {
        let mut record = NodeStatsRecord::new("10.0.0.1");
        record.load = Some(0.72);
        record.set_nominations(vec![Nomination::Expand, "scale_db".into()]);
        record.elected_action = Some(ScaleAction::Expand);

        let json = serde_json::to_string(&record).unwrap();
        let back: NodeStatsRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn record_wire_shape() {
        let mut record = NodeStatsRecord::new("10.0.0.1");
        record.load = Some(1.5);
        record.set_nominations(vec![Nomination::Contract]);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ip": "10.0.0.1", "load": 1.5, "nominations": ["contract"]})
        );
    }

    #[test]
    fn empty_object_decodes() {
        let record: NodeStatsRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, NodeStatsRecord::default());
    }

    #[test]
    fn nominations_dedupe_keeps_order() {
        let mut record = NodeStatsRecord::new("ip");
        record.set_nominations(vec![
            Nomination::Contract,
            Nomination::Expand,
            Nomination::Contract,
        ]);
        assert_eq!(record.nominations, vec![Nomination::Contract, Nomination::Expand]);
    }

    #[test]
    fn nomination_string_mapping() {
        assert_eq!(Nomination::from("none"), Nomination::None);
        assert_eq!(Nomination::from("reboot"), Nomination::Custom("reboot".into()));
        assert_eq!(String::from(Nomination::Expand), "expand");
    }

    #[test]
    fn bounds_guards() {
        let bounds = Bounds::default();
        assert!(bounds.can_expand(4));
        assert!(!bounds.can_expand(5));
        assert!(bounds.can_contract(3));
        assert!(!bounds.can_contract(2));
    }

    #[test]
    fn unknown_instance_status_decodes() {
        let info: InstanceInfo =
            serde_json::from_str(r#"{"ip": "10.0.0.3", "status": "stopping"}"#).unwrap();
        assert_eq!(info.status, InstanceStatus::Unknown);
        assert!(!info.is_running());
    }
}
