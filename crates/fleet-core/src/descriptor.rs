//! Cluster descriptor (`cluster.json`).
//!
//! Written by the provisioning pipeline onto every node. Only the fields the
//! autoscaler consumes are modelled; anything else in the file is ignored.
//!
//! ```json
//! {
//!   "minimum_instances": 2,
//!   "maximum_instances": 8,
//!   "rules": {
//!     "expand": "load > 0.9",
//!     "contract": ["load < 0.4", "instances > 6"]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{ConfigError, ConfigResult};

/// Fallback lower bound when the descriptor is missing.
pub const DEFAULT_MINIMUM_INSTANCES: u32 = 2;
/// Fallback upper bound when the descriptor is missing.
pub const DEFAULT_MAXIMUM_INSTANCES: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterDescriptor {
    #[serde(default = "default_min")]
    pub minimum_instances: u32,
    #[serde(default = "default_max")]
    pub maximum_instances: u32,
    /// Action class name → threshold expression(s).
    #[serde(default)]
    pub rules: BTreeMap<String, RuleExpressions>,
}

/// A class may carry one expression or a list of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RuleExpressions {
    One(String),
    Many(Vec<String>),
}

impl RuleExpressions {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            RuleExpressions::One(s) => std::slice::from_ref(s),
            RuleExpressions::Many(v) => v.as_slice(),
        };
        slice.iter().map(String::as_str)
    }
}

fn default_min() -> u32 {
    DEFAULT_MINIMUM_INSTANCES
}

fn default_max() -> u32 {
    DEFAULT_MAXIMUM_INSTANCES
}

impl Default for ClusterDescriptor {
    fn default() -> Self {
        Self {
            minimum_instances: DEFAULT_MINIMUM_INSTANCES,
            maximum_instances: DEFAULT_MAXIMUM_INSTANCES,
            rules: BTreeMap::new(),
        }
    }
}

impl ClusterDescriptor {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        let descriptor: ClusterDescriptor = serde_json::from_str(content)?;
        if descriptor.minimum_instances > descriptor.maximum_instances {
            return Err(ConfigError::Invalid(format!(
                "minimum_instances {} exceeds maximum_instances {}",
                descriptor.minimum_instances, descriptor.maximum_instances
            )));
        }
        Ok(descriptor)
    }

    /// Load the descriptor, falling back to process-wide defaults when the
    /// file cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(d) => d,
            Err(e) => {
                warn!(path = ?path, error = %e, "cluster descriptor unavailable, using defaults");
                Self::default()
            }
        }
    }

    /// Flatten the rules into `(class, expression)` pairs in class order.
    pub fn rule_expressions(&self) -> Vec<(&str, &str)> {
        self.rules
            .iter()
            .flat_map(|(class, exprs)| exprs.iter().map(move |e| (class.as_str(), e)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_single_and_list_rules() {
        let json = r#"{
            "minimum_instances": 1,
            "maximum_instances": 8,
            "rules": {
                "expand_when": "load > 0.9",
                "contract_when": ["load < 0.4", "instances > 6"]
            }
        }"#;
        let d = ClusterDescriptor::from_json_str(json).unwrap();
        assert_eq!(d.minimum_instances, 1);
        assert_eq!(d.maximum_instances, 8);
        assert_eq!(
            d.rule_expressions(),
            vec![
                ("contract_when", "load < 0.4"),
                ("contract_when", "instances > 6"),
                ("expand_when", "load > 0.9"),
            ]
        );
    }

    #[test]
    fn missing_bounds_use_defaults() {
        let d = ClusterDescriptor::from_json_str("{}").unwrap();
        assert_eq!(d, ClusterDescriptor::default());
    }

    #[test]
    fn inverted_bounds_rejected() {
        let json = r#"{"minimum_instances": 6, "maximum_instances": 3}"#;
        assert!(ClusterDescriptor::from_json_str(json).is_err());
    }

    #[test]
    fn unreadable_file_falls_back() {
        let d = ClusterDescriptor::load_or_default(Path::new("/nonexistent/cluster.json"));
        assert_eq!(d.minimum_instances, 2);
        assert_eq!(d.maximum_instances, 5);
        assert!(d.rules.is_empty());
    }

    #[test]
    fn garbage_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        let d = ClusterDescriptor::load_or_default(file.path());
        assert_eq!(d, ClusterDescriptor::default());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"maximum_instances": 9, "rules": {"expand": "load > 2"}}"#)
            .unwrap();
        let d = ClusterDescriptor::load_or_default(file.path());
        assert_eq!(d.minimum_instances, 2);
        assert_eq!(d.maximum_instances, 9);
        assert_eq!(d.rule_expressions(), vec![("expand", "load > 2")]);
    }
}
