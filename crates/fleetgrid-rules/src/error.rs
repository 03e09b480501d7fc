//! Error types for rule parsing.

use thiserror::Error;

/// Result type alias for rule operations.
pub type RuleResult<T> = Result<T, RuleError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    /// The expression is not `<metric> <comparator> <number>`, the
    /// comparator is not one of `> < >= <= ==`, or the bound is not a number.
    #[error("cannot parse rule {expression:?}: {reason}")]
    Parse { expression: String, reason: String },
}

impl RuleError {
    pub(crate) fn parse(expression: &str, reason: impl Into<String>) -> Self {
        RuleError::Parse {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}
