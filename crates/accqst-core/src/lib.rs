//! Grading core for double-entry bookkeeping questions.
//!
//! This crate parses charts of accounts, resolves randomized variables,
//! encodes learner ledgers into stored solutions and orchestrates per-part
//! scoring. Parts, variable calculators and storage are supplied through
//! the traits in [`traits`].

pub mod accounts;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod lock;
pub mod model;
pub mod numeric;
pub mod orchestrator;
pub mod question;
pub mod report;
pub mod traits;
pub mod variables;

pub use error::AccqstError;
