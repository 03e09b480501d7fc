//! Audit log failures.
//!
//! Callers log these and keep electing. Each variant carries the redb or
//! serde message as text.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    /// The audit database file could not be created or opened.
    #[error("cannot open election audit log: {0}")]
    Open(String),

    /// Beginning or committing a redb transaction failed.
    #[error("audit log transaction failed: {0}")]
    Transaction(String),

    /// The elections table could not be opened or created.
    #[error("elections table unavailable: {0}")]
    Table(String),

    /// Iterating stored elections failed.
    #[error("cannot read elections: {0}")]
    Read(String),

    /// Appending an election record failed.
    #[error("cannot append election: {0}")]
    Write(String),

    /// An election record could not be encoded as JSON.
    #[error("cannot encode election record: {0}")]
    Serialize(String),

    /// A stored election record is not valid JSON for this version.
    #[error("corrupt election record: {0}")]
    Deserialize(String),
}
