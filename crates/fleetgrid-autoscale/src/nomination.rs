//! NominationEngine — turns rules and measurements into a local ballot.
//!
//! Evaluation is synchronous and side-effect free; the [`Coordinator`]
//! gathers the inputs (which may involve I/O) and writes the result into
//! the stats table.
//!
//! [`Coordinator`]: crate::Coordinator

use std::collections::HashMap;

use tracing::debug;

use fleetgrid_rules::{ActionClass, RuleSet};
use fleetgrid_state::{Bounds, Nomination};

/// Metric names the coordinator knows how to resolve.
pub const METRIC_LOAD: &str = "load";
pub const METRIC_INSTANCES: &str = "instances";
pub const METRIC_MIN_INSTANCES: &str = "min_instances";
pub const METRIC_MAX_INSTANCES: &str = "max_instances";

/// Everything a nomination depends on for one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NominationInputs {
    /// An action is already elected, or the pool reports a scaling
    /// operation in progress.
    pub in_flight: bool,
    /// Running instance count, `None` if the provider could not answer.
    pub running: Option<u32>,
    /// Metric name → value. Missing names are "unavailable this epoch".
    pub metrics: HashMap<String, f64>,
}

/// Stateless rule evaluator for the local node.
#[derive(Debug, Clone)]
pub struct NominationEngine {
    rules: RuleSet,
    bounds: Bounds,
}

impl NominationEngine {
    pub fn new(rules: RuleSet, bounds: Bounds) -> Self {
        Self { rules, bounds }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Produce this cycle's ballot.
    ///
    /// 1. In flight → exactly `["none"]`.
    /// 2. A class is satisfied when any of its rules holds.
    /// 3. Satisfied expand/contract classes are kept only if the running
    ///    count allows the move; other classes are kept unconditionally.
    /// 4. Below `min_instances` forces `expand`; above `max_instances`
    ///    forces `contract`, regardless of rules.
    pub fn nominate(&self, inputs: &NominationInputs) -> Vec<Nomination> {
        if inputs.in_flight {
            return vec![Nomination::None];
        }

        let mut nominations = Vec::new();

        for class in self.rules.classes() {
            let satisfied = class.rules.iter().any(|rule| match inputs.metrics.get(&rule.metric) {
                Some(value) => rule.evaluate(*value),
                None => {
                    debug!(metric = %rule.metric, class = %class.name, "metric unavailable, rule skipped");
                    false
                }
            });
            if !satisfied {
                continue;
            }

            let nomination = match &class.class {
                ActionClass::Expand => inputs
                    .running
                    .filter(|n| self.bounds.can_expand(*n))
                    .map(|_| Nomination::Expand),
                ActionClass::Contract => inputs
                    .running
                    .filter(|n| self.bounds.can_contract(*n))
                    .map(|_| Nomination::Contract),
                ActionClass::Other(name) => Some(Nomination::Custom(name.clone())),
            };
            if let Some(n) = nomination {
                push_unique(&mut nominations, n);
            }
        }

        if let Some(running) = inputs.running {
            if running < self.bounds.min_instances {
                push_unique(&mut nominations, Nomination::Expand);
            }
            if running > self.bounds.max_instances {
                push_unique(&mut nominations, Nomination::Contract);
            }
        }

        nominations
    }
}

fn push_unique(list: &mut Vec<Nomination>, n: Nomination) {
    if !list.contains(&n) {
        list.push(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(pairs: &[(&str, &str)], min: u32, max: u32) -> NominationEngine {
        let rules = RuleSet::from_expressions(pairs.iter().copied()).unwrap();
        NominationEngine::new(rules, Bounds::new(min, max))
    }

    fn inputs(load: f64, running: u32) -> NominationInputs {
        NominationInputs {
            in_flight: false,
            running: Some(running),
            metrics: HashMap::from([
                (METRIC_LOAD.to_string(), load),
                (METRIC_INSTANCES.to_string(), running as f64),
            ]),
        }
    }

    fn standard() -> NominationEngine {
        engine(&[("expand_when", "load > 0.9"), ("contract_when", "load < 0.4")], 2, 5)
    }

    #[test]
    fn expand_rule_fires_within_bounds() {
        assert_eq!(standard().nominate(&inputs(0.95, 3)), vec![Nomination::Expand]);
    }

    #[test]
    fn contract_rule_fires_within_bounds() {
        assert_eq!(standard().nominate(&inputs(0.1, 3)), vec![Nomination::Contract]);
    }

    #[test]
    fn quiet_load_nominates_nothing() {
        assert!(standard().nominate(&inputs(0.6, 3)).is_empty());
    }

    #[test]
    fn expand_blocked_at_max() {
        assert!(standard().nominate(&inputs(0.95, 5)).is_empty());
    }

    #[test]
    fn contract_blocked_at_min() {
        assert!(standard().nominate(&inputs(0.1, 2)).is_empty());
    }

    #[test]
    fn below_min_forces_expand_regardless_of_rules() {
        for running in 0..2 {
            for load in [0.0, 0.1, 0.6, 0.95, 5.0] {
                let n = standard().nominate(&inputs(load, running));
                assert!(n.contains(&Nomination::Expand), "running={running} load={load}");
            }
        }
    }

    #[test]
    fn above_max_forces_contract_regardless_of_rules() {
        for running in 6..10 {
            for load in [0.0, 0.6, 0.95, 5.0] {
                let n = standard().nominate(&inputs(load, running));
                assert!(n.contains(&Nomination::Contract), "running={running} load={load}");
            }
        }
    }

    #[test]
    fn empty_rules_within_bounds_is_empty() {
        let engine = engine(&[], 2, 5);
        for running in 2..=5 {
            assert!(engine.nominate(&inputs(0.99, running)).is_empty());
        }
    }

    #[test]
    fn in_flight_nominates_none_only() {
        let mut i = inputs(0.95, 1);
        i.in_flight = true;
        assert_eq!(standard().nominate(&i), vec![Nomination::None]);
    }

    #[test]
    fn any_rule_in_class_suffices() {
        let engine = engine(&[("expand", "load > 0.9"), ("expand", "instances < 3")], 2, 5);
        assert_eq!(engine.nominate(&inputs(0.1, 2)), vec![Nomination::Expand]);
    }

    #[test]
    fn other_classes_nominated_under_their_name() {
        let engine = engine(&[("page_oncall", "load > 4")], 2, 5);
        assert_eq!(
            engine.nominate(&inputs(6.0, 5)),
            vec![Nomination::Custom("page_oncall".to_string())]
        );
    }

    #[test]
    fn unavailable_metric_omits_rule() {
        let mut i = inputs(0.95, 3);
        i.metrics.remove(METRIC_LOAD);
        assert!(standard().nominate(&i).is_empty());
    }

    #[test]
    fn unknown_running_count_skips_bounded_classes_and_overrides() {
        let engine = engine(&[("expand", "load > 0.9"), ("notify", "load > 0.9")], 2, 5);
        let mut i = inputs(0.95, 0);
        i.running = None;
        assert_eq!(engine.nominate(&i), vec![Nomination::Custom("notify".to_string())]);
    }

    #[test]
    fn override_does_not_duplicate_rule_nomination() {
        let n = standard().nominate(&inputs(0.95, 1));
        assert_eq!(n, vec![Nomination::Expand]);
    }
}
