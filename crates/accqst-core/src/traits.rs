//! Collaborator traits consumed by the scoring core.
//!
//! Parts, variable calculators and storage are supplied by the host; the
//! `accqst-reference` crate provides implementations of each.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{Attempt, PartId, QuestionId, ScoreBreakdown, SolutionRow};
use crate::numeric::Tolerance;
use crate::question::QuestionRecord;
use crate::variables::VariableEngine;

// ---------------------------------------------------------------------------
// Variables
// ---------------------------------------------------------------------------

/// One parsed variable definition.
pub trait VariableDefinition: Send + Sync + fmt::Debug {
    /// Unique variable name, used as `{name}` token.
    fn name(&self) -> &str;

    /// Display precision defined for this variable, if any.
    fn precision(&self) -> Option<u32> {
        None
    }

    /// Calculate a value. `resolved` holds the variables calculated
    /// before this one in the same pass.
    fn calculate(&self, resolved: &BTreeMap<String, f64>) -> anyhow::Result<f64>;
}

/// Turns a variable definition document into ordered definitions.
pub trait VariableParser: Send + Sync {
    fn parse(&self, xml: &str) -> anyhow::Result<Vec<Arc<dyn VariableDefinition>>>;
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

/// One ledger exercise of a question.
///
/// A part holds the author's booking (answer key) and the learner's
/// working ledger and calculates its own points.
pub trait Part: Send + Sync + fmt::Debug {
    fn part_id(&self) -> PartId;

    fn set_part_id(&mut self, part_id: PartId);

    /// Question owning this part.
    fn question_id(&self) -> Option<QuestionId>;

    fn set_question_id(&mut self, question_id: QuestionId);

    /// Number of ledger rows a learner may fill in.
    fn max_lines(&self) -> usize;

    fn max_points(&self) -> f64;

    fn text(&self) -> &str;

    fn set_text(&mut self, text: String);

    /// Booking XML as authored, before variable substitution.
    fn booking_xml(&self) -> &str;

    /// Set the booking; with `variables`, tokens are substituted before
    /// the booking is interpreted.
    fn set_booking_xml(
        &mut self,
        xml: &str,
        variables: Option<&VariableEngine>,
    ) -> anyhow::Result<()>;

    /// Set the learner's ledger fragment; empty means no input.
    fn set_working_xml(&mut self, xml: &str);

    /// Score the working ledger against the booking.
    fn calculate_reached_points(&mut self, tolerance: &Tolerance) -> f64;

    /// Breakdown of the last calculation.
    fn working_data(&self) -> &ScoreBreakdown;

    /// Deep copy without storage identity (part id `0`).
    fn clone_detached(&self) -> Box<dyn Part>;
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Selects stored rows by key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter<'a> {
    /// Every row except those with this key.
    AllExcept(&'a str),
    /// Only rows with this key.
    Only(&'a str),
}

impl RowFilter<'_> {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            RowFilter::AllExcept(kept) => key != *kept,
            RowFilter::Only(wanted) => key == *wanted,
        }
    }
}

/// Persisted solution rows of learners.
#[async_trait]
pub trait SolutionStore: Send + Sync {
    /// Rows of an attempt with the given authorization state.
    async fn load_rows(&self, attempt: &Attempt, authorized: bool)
        -> anyhow::Result<Vec<SolutionRow>>;

    /// Intermediate rows if any exist, authorized rows otherwise.
    async fn load_rows_preferring_intermediate(
        &self,
        attempt: &Attempt,
    ) -> anyhow::Result<Vec<SolutionRow>>;

    async fn insert_row(
        &self,
        attempt: &Attempt,
        authorized: bool,
        row: SolutionRow,
    ) -> anyhow::Result<()>;

    /// Delete the rows selected by `filter`. `authorized: None` targets
    /// both states. Returns the number of deleted rows.
    async fn delete_rows(
        &self,
        attempt: &Attempt,
        authorized: Option<bool>,
        filter: RowFilter<'_>,
    ) -> anyhow::Result<usize>;

    /// Highest pass with stored rows.
    async fn max_pass(&self, active_id: i64, question_id: QuestionId)
        -> anyhow::Result<Option<u32>>;
}

/// Question metadata storage.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert (id `None`) or update a question, returning its id.
    async fn save_question(&self, record: &QuestionRecord) -> anyhow::Result<QuestionId>;

    async fn load_question(&self, id: QuestionId) -> anyhow::Result<Option<QuestionRecord>>;
}

/// Part storage.
#[async_trait]
pub trait PartRepository: Send + Sync {
    /// Write a part. A part id of `0` obtains a fresh id, which is returned.
    async fn write_part(&self, part: &dyn Part) -> anyhow::Result<PartId>;

    /// Returns `false` if the part did not exist.
    async fn delete_part(&self, part_id: PartId) -> anyhow::Result<bool>;

    /// Parts of a question in their stored order.
    async fn load_parts(&self, question_id: QuestionId) -> anyhow::Result<Vec<Box<dyn Part>>>;
}
