//! fleetgrid-autoscale — rule-driven nominations and peer-majority elections.
//!
//! Every node evaluates its rules against local measurements and writes a
//! ballot into its own record of the stats table. Peers exchange tables;
//! any node may then tally the merged table and, when one direction has a
//! clear margin, dispatch the scaling action exactly once per epoch.
//!
//! # Election Algorithm
//!
//! ```text
//! total    = records in the table (silent nodes included)
//! expand   = records nominating "expand"
//! contract = records nominating "contract"
//!
//! if total == 0:                              abstain
//! if (expand - contract) / total > 0.5:       elect expand
//! if (contract - expand) / total > 0.5:       elect contract
//! otherwise:                                  no quorum
//!
//! dispatch only if the winner differs from elected_action
//! ```
//!
//! A margin of exactly one half never fires. Once elected, the action stays
//! elected (and local ballots read `["none"]`) until the provider reflects
//! the change, the settle timeout passes, or an operator resets the epoch.

pub mod coordinator;
pub mod election;
pub mod nomination;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{Coordinator, StatError};
pub use election::{Decision, ElectionCoordinator, ElectionOutcome, ElectionState, PendingDispatch, Tally};
pub use nomination::{NominationEngine, NominationInputs};
