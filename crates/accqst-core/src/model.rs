//! Core data model types for accounting questions.
//!
//! These are the values that flow between the account directory, the
//! variable engine, the solution codec and the scoring orchestrator.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Storage identity of a question part. `0` means "not yet written".
pub type PartId = u64;

/// Storage identity of a question.
pub type QuestionId = i64;

/// Reserved solution key holding the serialized variable map.
pub const VARS_KEY: &str = "accqst_vars";

/// Reserved solution key holding the concatenated ledger input of all parts.
pub const INPUT_KEY: &str = "accqst_input";

/// Prefix shared by every stored solution key.
pub const KEY_PREFIX: &str = "accqst_";

/// Marker separating the ledger fragments of consecutive parts.
pub const PART_BREAK: &str = "<partBreak />";

/// One entry of the chart of accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account number as written by the author.
    pub number: String,
    /// Account title.
    pub title: String,
    /// Text shown to learners, derived from the directory display mode.
    pub display_text: String,
}

/// Rendering mode for variable substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstitutionMode {
    /// Full precision with `.` decimals, for further calculation.
    Numeric,
    /// Rounded to precision with locale separators, for learners.
    Display,
    /// Plain value with `,` decimals, for textual authoring contexts.
    Default,
}

impl fmt::Display for SubstitutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubstitutionMode::Numeric => write!(f, "numeric"),
            SubstitutionMode::Display => write!(f, "display"),
            SubstitutionMode::Default => write!(f, "default"),
        }
    }
}

impl FromStr for SubstitutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "numeric" => Ok(SubstitutionMode::Numeric),
            "display" => Ok(SubstitutionMode::Display),
            "default" => Ok(SubstitutionMode::Default),
            other => Err(format!("unknown substitution mode: {other}")),
        }
    }
}

/// One persisted solution row: `value1` is the key, `value2` the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionRow {
    pub value1: String,
    pub value2: String,
}

impl SolutionRow {
    pub fn new(value1: impl Into<String>, value2: impl Into<String>) -> Self {
        Self {
            value1: value1.into(),
            value2: value2.into(),
        }
    }
}

/// A learner's solution as a key/value mapping.
///
/// Later rows with the same key replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolutionRecord {
    entries: BTreeMap<String, String>,
}

impl SolutionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect stored rows into a record.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = SolutionRow>,
    {
        let entries = rows
            .into_iter()
            .map(|row| (row.value1, row.value2))
            .collect();
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Convert back to storage rows in key order.
    pub fn to_rows(&self) -> Vec<SolutionRow> {
        self.entries
            .iter()
            .map(|(k, v)| SolutionRow::new(k.as_str(), v.as_str()))
            .collect()
    }
}

impl FromIterator<(String, String)> for SolutionRecord {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// One ledger line as typed by the learner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRowInput {
    #[serde(default)]
    pub left_account: String,
    #[serde(default)]
    pub left_amount: String,
    #[serde(default)]
    pub right_account: String,
    #[serde(default)]
    pub right_amount: String,
}

/// The submitted rows of one part together with its line limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartInput {
    pub part_id: PartId,
    pub max_lines: usize,
    pub rows: Vec<LedgerRowInput>,
}

/// Rows submitted for each part of a question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submission {
    rows: BTreeMap<PartId, Vec<LedgerRowInput>>,
}

impl Submission {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, part_id: PartId, rows: Vec<LedgerRowInput>) -> Self {
        self.rows.insert(part_id, rows);
        self
    }

    pub fn rows(&self, part_id: PartId) -> &[LedgerRowInput] {
        self.rows.get(&part_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One learner's attempt at a question within a test pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attempt {
    pub active_id: i64,
    pub question_id: QuestionId,
    pub pass: u32,
}

/// Whether an authorized or intermediate solution exists for an attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingSolutions {
    pub authorized: bool,
    pub intermediate: bool,
}

/// Points given for one ledger row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowScore {
    pub left_account_text: String,
    pub left_value_raw: String,
    pub left_points: f64,
    pub right_account_text: String,
    pub right_value_raw: String,
    pub right_points: f64,
}

/// Structured result of a part's point calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub header_left: String,
    pub header_right: String,
    pub rows: Vec<RowScore>,
    pub bonus_order_left: f64,
    pub bonus_order_right: f64,
    pub malus_count_left: f64,
    pub malus_count_right: f64,
    pub malus_sums_differ: f64,
}

impl ScoreBreakdown {
    /// Adjustment fields in export order, keyed by label name.
    pub fn adjustments(&self) -> [(Adjustment, f64); 5] {
        [
            (Adjustment::BonusOrderLeft, self.bonus_order_left),
            (Adjustment::BonusOrderRight, self.bonus_order_right),
            (Adjustment::MalusCountLeft, self.malus_count_left),
            (Adjustment::MalusCountRight, self.malus_count_right),
            (Adjustment::MalusSumsDiffer, self.malus_sums_differ),
        ]
    }
}

/// Bonus and malus adjustments reported by a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adjustment {
    BonusOrderLeft,
    BonusOrderRight,
    MalusCountLeft,
    MalusCountRight,
    MalusSumsDiffer,
}
