//! Core error types.
//!
//! Storage and repository collaborators report failures through `anyhow`;
//! these typed errors are wrapped inside so the orchestrator's callers can
//! downcast and tell a bad definition from an unsupported request.

use thiserror::Error;

/// Errors raised by the accounting question core.
#[derive(Debug, Error)]
pub enum AccqstError {
    /// The chart-of-accounts XML could not be used.
    #[error("invalid account definition: {0}")]
    AccountDefinition(String),

    /// The variable definition XML was rejected by the variable parser.
    #[error("invalid variable definition: {0}")]
    VariableDefinition(String),

    /// A named variable could not be calculated.
    #[error("variable {name} could not be calculated: {reason}")]
    VariableCalculation { name: String, reason: String },

    /// The caller asked for a calculation mode that is not implemented.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The question has no storage identity yet.
    #[error("question has not been saved")]
    NotSaved,

    /// A ledger fragment could not be written.
    #[error("failed to encode ledger input: {0}")]
    Encode(String),

    /// An operation was attempted in the wrong grading phase.
    #[error("operation requires phase {expected}, current phase is {actual}")]
    InvalidPhase {
        expected: &'static str,
        actual: &'static str,
    },
}

impl AccqstError {
    /// Returns `true` for definition problems an author can fix by editing XML.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            AccqstError::AccountDefinition(_)
                | AccqstError::VariableDefinition(_)
                | AccqstError::VariableCalculation { .. }
        )
    }
}
