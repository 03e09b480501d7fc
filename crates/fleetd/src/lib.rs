//! fleetd internals, exposed for integration tests.
//!
//! [`assemble`] turns a [`fleet_core::DaemonConfig`] into a wired
//! [`fleetgrid_autoscale::Coordinator`]; [`node::Node`] runs the polling
//! cycle against it.

pub mod assemble;
pub mod node;

pub use assemble::{Assembly, assemble, build_rules};
pub use node::{CycleReport, Node};
