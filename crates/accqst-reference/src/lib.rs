//! Reference implementations for accqst.
//!
//! Provides a ledger part, a variable parser with formula support,
//! in-memory storage and a TOML question file loader, so the grading
//! core can run without an external host.

pub mod error;
pub mod formula;
pub mod ledger;
pub mod memory;
pub mod question_file;
pub mod variables;
mod xml;

pub use error::ReferenceError;
pub use ledger::LedgerPart;
pub use memory::{MemoryPartRepository, MemoryQuestionRepository, MemorySolutionStore};
pub use question_file::{load_question_file, parse_question_str, validate_question, ValidationWarning};
pub use variables::ReferenceVariableParser;
