//! fleet-core — configuration shared by every FleetGrid crate.
//!
//! Two inputs drive a node:
//!
//! - `fleetd.toml`: daemon-level settings (listen address, peers, poll
//!   interval, external commands). See [`DaemonConfig`].
//! - `cluster.json`: the cluster descriptor written by the provisioning
//!   pipeline, carrying instance bounds and threshold rule expressions.
//!   See [`ClusterDescriptor`].

pub mod config;
pub mod descriptor;

pub use config::{CommandsConfig, ConfigError, ConfigResult, DaemonConfig, parse_duration};
pub use descriptor::{ClusterDescriptor, RuleExpressions};
