//! Rules grouped by action class.

use serde::Serialize;

use crate::error::RuleResult;
use crate::rule::Rule;

/// How a class name maps onto a scaling direction. Matching is by
/// substring so `expand_when` and `expand` are the same class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionClass {
    Expand,
    Contract,
    /// Neither direction; nominated under its own name.
    Other(String),
}

impl ActionClass {
    pub fn classify(name: &str) -> Self {
        if name.contains("expand") {
            ActionClass::Expand
        } else if name.contains("contract") {
            ActionClass::Contract
        } else {
            ActionClass::Other(name.to_string())
        }
    }
}

/// All rules declared under one class name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleClass {
    pub name: String,
    pub class: ActionClass,
    pub rules: Vec<Rule>,
}

/// Class name → ordered rules. Built once per descriptor load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    classes: Vec<RuleClass>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(class, expression)` pairs. Classes keep first-seen
    /// order; any unparsable expression fails the whole set.
    pub fn from_expressions<'a, I>(pairs: I) -> RuleResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut set = Self::new();
        for (class, expression) in pairs {
            set.push(class, Rule::parse(expression)?);
        }
        Ok(set)
    }

    /// Append a rule under `class`, creating the class if needed.
    pub fn push(&mut self, class: &str, rule: Rule) {
        match self.classes.iter_mut().find(|c| c.name == class) {
            Some(existing) => existing.rules.push(rule),
            None => self.classes.push(RuleClass {
                name: class.to_string(),
                class: ActionClass::classify(class),
                rules: vec![rule],
            }),
        }
    }

    pub fn classes(&self) -> &[RuleClass] {
        &self.classes
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Distinct metric names referenced by any rule.
    pub fn metrics(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .classes
            .iter()
            .flat_map(|c| c.rules.iter().map(|r| r.metric.as_str()))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}
