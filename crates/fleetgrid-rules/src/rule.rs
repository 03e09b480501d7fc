//! Single threshold rule: parsing and evaluation.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{RuleError, RuleResult};

/// `<metric> <operator> <bound>`. The operator group is deliberately loose
/// so that `load ?? 1` reports an unknown comparator instead of a shape error.
static RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*([^\w\s.+\-]+)\s*(\S+)\s*$")
        .expect("rule regex is valid")
});

/// Closed set of comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Eq => "==",
        }
    }

    /// Apply the operator as `value <op> bound`.
    pub fn apply(&self, value: f64, bound: f64) -> bool {
        match self {
            Comparator::Gt => value > bound,
            Comparator::Lt => value < bound,
            Comparator::Ge => value >= bound,
            Comparator::Le => value <= bound,
            // Plain float equality: `load == 0.3` only matches exactly.
            Comparator::Eq => value == bound,
        }
    }

    fn from_symbol(s: &str) -> Option<Self> {
        match s {
            ">" => Some(Comparator::Gt),
            "<" => Some(Comparator::Lt),
            ">=" => Some(Comparator::Ge),
            "<=" => Some(Comparator::Le),
            "==" => Some(Comparator::Eq),
            _ => None,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A parsed threshold rule. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub metric: String,
    pub comparator: Comparator,
    pub bound: f64,
}

impl Rule {
    /// Parse `<metric> <comparator> <number>`, whitespace tolerant.
    pub fn parse(expression: &str) -> RuleResult<Self> {
        let caps = RULE_RE
            .captures(expression)
            .ok_or_else(|| RuleError::parse(expression, "expected <metric> <comparator> <number>"))?;

        let metric = caps[1].to_string();
        let op = &caps[2];
        let comparator = Comparator::from_symbol(op)
            .ok_or_else(|| RuleError::parse(expression, format!("unknown comparator {op:?}")))?;
        let raw_bound = &caps[3];
        let bound: f64 = raw_bound
            .parse()
            .map_err(|_| RuleError::parse(expression, format!("bound {raw_bound:?} is not a number")))?;
        if !bound.is_finite() {
            return Err(RuleError::parse(expression, "bound must be finite"));
        }

        Ok(Self {
            metric,
            comparator,
            bound,
        })
    }

    /// Evaluate the rule against the current value of its metric.
    pub fn evaluate(&self, value: f64) -> bool {
        self.comparator.apply(value, self.bound)
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rule::parse(s)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.comparator, self.bound)
    }
}
