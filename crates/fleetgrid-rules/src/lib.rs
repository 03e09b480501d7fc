//! fleetgrid-rules — threshold rules for the autoscaler.
//!
//! A rule is a single comparison of a named metric against a numeric
//! bound, written as `<metric> <comparator> <number>`:
//!
//! ```text
//! load > 0.9
//! instances>=4
//! load == 1
//! ```
//!
//! Rules are parsed once when the cluster descriptor is loaded and grouped
//! by action class into a [`RuleSet`]. Evaluation is a pure numeric
//! comparison; an unknown comparator can only fail at parse time.

pub mod error;
pub mod rule;
pub mod ruleset;

pub use error::{RuleError, RuleResult};
pub use rule::{Comparator, Rule};
pub use ruleset::{ActionClass, RuleClass, RuleSet};
