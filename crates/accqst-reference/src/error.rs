//! Reference implementation error types.

use thiserror::Error;

/// Errors raised by the reference parts and variable calculators.
#[derive(Debug, Error)]
pub enum ReferenceError {
    /// A booking or working ledger could not be read.
    #[error("invalid ledger XML: {0}")]
    Ledger(String),

    /// A variable definition document could not be read.
    #[error("invalid variable definition: {0}")]
    Definition(String),

    /// A formula references a variable that has no value yet.
    #[error("unknown variable {0}")]
    UnknownVariable(String),

    /// A formula could not be evaluated.
    #[error("formula '{formula}' failed: {reason}")]
    Formula { formula: String, reason: String },
}
