//! The accounting question entity.
//!
//! A question owns its account directory, its variables and its parts.
//! Storage goes through [`QuestionRepository`] and [`PartRepository`];
//! copies are built with [`AccountingQuestion::duplicate_with`], which
//! never shares parts between source and copy.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::accounts::AccountDirectory;
use crate::config::ScoringConfig;
use crate::error::AccqstError;
use crate::model::{PartId, QuestionId, SubstitutionMode};
use crate::numeric::{DisplayFormat, NumberFormat, ThousandsDelim, Tolerance};
use crate::traits::{Part, PartRepository, QuestionRepository, VariableParser};
use crate::variables::VariableEngine;

/// Stored form of a question's metadata and definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: Option<QuestionId>,
    #[serde(default)]
    pub original_id: Option<QuestionId>,
    #[serde(default)]
    pub container_id: i64,
    pub title: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub owner: i64,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub accounts_xml: String,
    /// SHA-256 of `accounts_xml`, lets storage share identical charts.
    #[serde(default)]
    pub account_hash: String,
    #[serde(default)]
    pub variables_xml: String,
    #[serde(default = "default_precision")]
    pub precision: u32,
    #[serde(default)]
    pub thousands_delim_type: Option<ThousandsDelim>,
}

fn default_precision() -> u32 {
    2
}

/// Fields replaced when a question is duplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateOverrides {
    pub title: Option<String>,
    pub author: Option<String>,
    pub owner: Option<i64>,
    pub container_id: Option<i64>,
}

/// Question and part texts after display substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedQuestion {
    pub text: String,
    pub parts: Vec<RenderedPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedPart {
    pub part_id: PartId,
    pub text: String,
}

/// A double-entry bookkeeping question with one or more parts.
#[derive(Debug)]
pub struct AccountingQuestion {
    id: Option<QuestionId>,
    original_id: Option<QuestionId>,
    container_id: i64,
    title: String,
    comment: String,
    author: String,
    owner: i64,
    question_text: String,
    points: f64,
    precision: u32,
    thousands_delim_type: Option<ThousandsDelim>,
    accounts: AccountDirectory,
    variables: VariableEngine,
    parts: Vec<Box<dyn Part>>,
}

impl AccountingQuestion {
    /// An unsaved, empty question using the configured defaults.
    pub fn new(config: &ScoringConfig) -> Self {
        let precision = config.default_precision;
        Self {
            id: None,
            original_id: None,
            container_id: 0,
            title: String::new(),
            comment: String::new(),
            author: String::new(),
            owner: -1,
            question_text: String::new(),
            points: 0.0,
            precision,
            thousands_delim_type: None,
            accounts: AccountDirectory::new(),
            variables: VariableEngine::new(DisplayFormat {
                precision,
                number: config.number_format_for(None),
            }),
            parts: Vec::new(),
        }
    }

    /// Build a question from its stored record.
    ///
    /// Definitions that no longer parse are logged and left empty so the
    /// question can still be opened and repaired.
    pub fn from_record(
        record: QuestionRecord,
        variable_parser: &dyn VariableParser,
        config: &ScoringConfig,
    ) -> Self {
        let mut question = Self::new(config);
        question.id = record.id;
        question.original_id = record.original_id;
        question.container_id = record.container_id;
        question.title = record.title;
        question.comment = record.comment;
        question.author = record.author;
        question.owner = record.owner;
        question.question_text = record.question_text;
        question.points = record.points;
        question.thousands_delim_type = record.thousands_delim_type;
        question.precision = record.precision;
        question.apply_config(config);

        if let Err(e) = question.set_accounts_xml(&record.accounts_xml) {
            tracing::warn!(question = ?record.id, "stored accounts unusable: {e}");
        }
        if let Err(e) = question.set_variables_xml(&record.variables_xml, variable_parser) {
            tracing::warn!(question = ?record.id, "stored variables unusable: {e}");
        }
        question
    }

    /// Snapshot of the storable fields.
    pub fn to_record(&self) -> QuestionRecord {
        QuestionRecord {
            id: self.id,
            original_id: self.original_id,
            container_id: self.container_id,
            title: self.title.clone(),
            comment: self.comment.clone(),
            author: self.author.clone(),
            owner: self.owner,
            question_text: self.question_text.clone(),
            points: self.points,
            accounts_xml: self.accounts.definition().to_string(),
            account_hash: self.accounts.definition_hash(),
            variables_xml: self.variables.definition().to_string(),
            precision: self.precision,
            thousands_delim_type: self.thousands_delim_type,
        }
    }

    /// Load a question and its parts.
    pub async fn load(
        id: QuestionId,
        questions: &dyn QuestionRepository,
        parts: &dyn PartRepository,
        variable_parser: &dyn VariableParser,
        config: &ScoringConfig,
    ) -> Result<Self> {
        let record = questions
            .load_question(id)
            .await
            .with_context(|| format!("failed to load question {id}"))?
            .ok_or_else(|| anyhow::anyhow!("question {id} not found"))?;
        let mut question = Self::from_record(record, variable_parser, config);
        question.parts = parts
            .load_parts(id)
            .await
            .with_context(|| format!("failed to load parts of question {id}"))?;
        Ok(question)
    }

    /// Save the question, and its parts when `save_parts` is set.
    ///
    /// Maximum points are recalculated first; a new question receives its
    /// id here.
    pub async fn save(
        &mut self,
        questions: &dyn QuestionRepository,
        parts: &dyn PartRepository,
        save_parts: bool,
    ) -> Result<QuestionId> {
        self.calculate_maximum_points();

        let id = questions
            .save_question(&self.to_record())
            .await
            .context("failed to save question")?;
        self.id = Some(id);

        if save_parts {
            for part in &mut self.parts {
                part.set_question_id(id);
                let part_id = parts
                    .write_part(part.as_ref())
                    .await
                    .context("failed to save part")?;
                part.set_part_id(part_id);
            }
        }
        tracing::debug!(question = id, points = self.points, "question saved");
        Ok(id)
    }

    // -- identity and metadata ---------------------------------------------

    pub fn id(&self) -> Option<QuestionId> {
        self.id
    }

    pub fn original_id(&self) -> Option<QuestionId> {
        self.original_id
    }

    pub fn container_id(&self) -> i64 {
        self.container_id
    }

    pub fn set_container_id(&mut self, container_id: i64) {
        self.container_id = container_id;
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = author.into();
    }

    pub fn owner(&self) -> i64 {
        self.owner
    }

    pub fn set_owner(&mut self, owner: i64) {
        self.owner = owner;
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn set_question_text(&mut self, text: impl Into<String>) {
        self.question_text = text.into();
    }

    /// Total points; derived from the parts by
    /// [`calculate_maximum_points`](Self::calculate_maximum_points).
    pub fn points(&self) -> f64 {
        self.points
    }

    /// Title, author and text are set and the question is worth points.
    pub fn is_complete(&self) -> bool {
        !self.title.is_empty()
            && !self.author.is_empty()
            && !self.question_text.is_empty()
            && self.points > 0.0
    }

    // -- definitions -------------------------------------------------------

    pub fn accounts(&self) -> &AccountDirectory {
        &self.accounts
    }

    pub fn set_accounts_xml(&mut self, xml: &str) -> Result<(), AccqstError> {
        self.accounts.set_definition(xml)
    }

    pub fn variables(&self) -> &VariableEngine {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableEngine {
        &mut self.variables
    }

    pub fn set_variables_xml(
        &mut self,
        xml: &str,
        parser: &dyn VariableParser,
    ) -> Result<(), AccqstError> {
        self.variables.set_definition(xml, parser)
    }

    /// Message of the last rejected account or variable definition.
    pub fn analyze_error(&self) -> Option<&str> {
        self.variables
            .analyze_error()
            .or_else(|| self.accounts.analyze_error())
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn set_precision(&mut self, precision: u32) {
        self.precision = precision;
        let mut format = self.variables.display_format();
        format.precision = precision;
        self.variables.set_display_format(format);
    }

    pub fn thousands_delim_type(&self) -> Option<ThousandsDelim> {
        self.thousands_delim_type
    }

    pub fn set_thousands_delim_type(&mut self, delim: Option<ThousandsDelim>) {
        self.thousands_delim_type = delim;
    }

    /// Apply installation settings to the variable display format.
    pub fn apply_config(&mut self, config: &ScoringConfig) {
        self.variables.set_display_format(DisplayFormat {
            precision: self.precision,
            number: config.number_format_for(self.thousands_delim_type),
        });
    }

    /// Format of displayed values, which learners type amounts back in.
    pub fn number_format(&self) -> NumberFormat {
        self.variables.display_format().number
    }

    /// Comparison used for every monetary value of this question.
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.precision)
    }

    pub fn equals(&self, a: f64, b: f64) -> bool {
        self.tolerance().equals(a, b)
    }

    // -- parts -------------------------------------------------------------

    pub fn parts(&self) -> &[Box<dyn Part>] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [Box<dyn Part>] {
        &mut self.parts
    }

    pub fn part(&self, part_id: PartId) -> Option<&dyn Part> {
        self.parts
            .iter()
            .find(|part| part.part_id() == part_id)
            .map(|part| part.as_ref())
    }

    /// Append a part and update the maximum points.
    pub fn add_part(&mut self, mut part: Box<dyn Part>) {
        if let Some(id) = self.id {
            part.set_question_id(id);
        }
        self.parts.push(part);
        self.calculate_maximum_points();
    }

    /// Sum of the parts' maximum points, stored as the question's points.
    pub fn calculate_maximum_points(&mut self) -> f64 {
        self.points = self.parts.iter().map(|part| part.max_points()).sum();
        self.points
    }

    /// Delete a part from storage and from this question.
    ///
    /// Returns `false` when the question has no such part.
    pub async fn delete_part(
        &mut self,
        part_id: PartId,
        questions: &dyn QuestionRepository,
        parts: &dyn PartRepository,
    ) -> Result<bool> {
        let Some(index) = self.parts.iter().position(|part| part.part_id() == part_id) else {
            return Ok(false);
        };
        if !parts.delete_part(part_id).await? {
            return Ok(false);
        }
        self.parts.remove(index);
        self.save(questions, parts, false).await?;
        Ok(true)
    }

    // -- rendering ---------------------------------------------------------

    /// Substitute variables into question and part texts for display and
    /// re-apply each booking with numeric substitution.
    pub fn render(&mut self) -> Result<RenderedQuestion> {
        let text = self
            .variables
            .substitute(&self.question_text, SubstitutionMode::Display);

        let mut rendered_parts = Vec::with_capacity(self.parts.len());
        for part in &mut self.parts {
            rendered_parts.push(RenderedPart {
                part_id: part.part_id(),
                text: self.variables.substitute(part.text(), SubstitutionMode::Display),
            });
            let booking = part.booking_xml().to_string();
            part.set_booking_xml(&booking, Some(&self.variables))
                .with_context(|| format!("booking of part {} is invalid", part.part_id()))?;
        }

        Ok(RenderedQuestion {
            text,
            parts: rendered_parts,
        })
    }

    // -- duplication -------------------------------------------------------

    /// Independent copy with overrides applied.
    ///
    /// The copy has no storage identity; its parts are deep copies with
    /// part id `0`.
    pub fn duplicate_with(&self, overrides: DuplicateOverrides) -> Self {
        Self {
            id: None,
            original_id: None,
            container_id: overrides.container_id.unwrap_or(self.container_id),
            title: overrides.title.unwrap_or_else(|| self.title.clone()),
            comment: self.comment.clone(),
            author: overrides.author.unwrap_or_else(|| self.author.clone()),
            owner: overrides.owner.unwrap_or(self.owner),
            question_text: self.question_text.clone(),
            points: self.points,
            precision: self.precision,
            thousands_delim_type: self.thousands_delim_type,
            accounts: self.accounts.clone(),
            variables: self.variables.clone(),
            parts: self.parts.iter().map(|part| part.clone_detached()).collect(),
        }
    }

    /// Duplicate and store the copy with fresh question and part ids.
    ///
    /// A copy made for a test keeps a link to its original.
    pub async fn duplicate(
        &self,
        overrides: DuplicateOverrides,
        for_test: bool,
        questions: &dyn QuestionRepository,
        parts: &dyn PartRepository,
    ) -> Result<Self> {
        let Some(source_id) = self.id else {
            return Err(AccqstError::NotSaved.into());
        };

        let mut copy = self.duplicate_with(overrides);
        if for_test {
            copy.original_id = Some(self.original_id.unwrap_or(source_id));
        }
        let id = copy.save(questions, parts, true).await?;
        tracing::info!(source = source_id, copy = id, for_test, "question duplicated");
        Ok(copy)
    }

    /// Copy into another container.
    pub async fn copy_to(
        &self,
        container_id: i64,
        title: Option<String>,
        questions: &dyn QuestionRepository,
        parts: &dyn PartRepository,
    ) -> Result<Self> {
        let overrides = DuplicateOverrides {
            title,
            container_id: Some(container_id),
            ..Default::default()
        };
        self.duplicate(overrides, false, questions, parts).await
    }

    /// Write this question's data and parts over its original.
    ///
    /// The original's parts are deleted from storage and replaced by
    /// copies of this question's parts.
    pub async fn sync_with_original(
        &self,
        questions: &dyn QuestionRepository,
        parts: &dyn PartRepository,
    ) -> Result<()> {
        let Some(original_id) = self.original_id else {
            anyhow::bail!("question has no original to synchronize with");
        };

        let mut record = self.to_record();
        record.id = Some(original_id);
        record.original_id = None;
        questions
            .save_question(&record)
            .await
            .context("failed to update original question")?;

        for old in parts.load_parts(original_id).await? {
            parts.delete_part(old.part_id()).await?;
        }
        for part in &self.parts {
            let mut copy = part.clone_detached();
            copy.set_question_id(original_id);
            parts.write_part(copy.as_ref()).await?;
        }
        tracing::info!(question = ?self.id, original = original_id, "synchronized with original");
        Ok(())
    }
}
