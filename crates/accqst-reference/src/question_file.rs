//! TOML question files.
//!
//! Loads a question with its accounts, variables and ledger parts from a
//! single file, and checks it for common authoring problems.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;

use accqst_core::config::ScoringConfig;
use accqst_core::model::QuestionId;
use accqst_core::numeric::ThousandsDelim;
use accqst_core::question::{AccountingQuestion, QuestionRecord};
use accqst_core::traits::Part;

use crate::ledger::LedgerPart;
use crate::variables::ReferenceVariableParser;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("token pattern is valid"));

/// Intermediate TOML structure for parsing question files.
#[derive(Debug, Deserialize)]
struct TomlQuestionFile {
    question: TomlQuestionHeader,
    #[serde(default)]
    parts: Vec<TomlPart>,
}

#[derive(Debug, Deserialize)]
struct TomlQuestionHeader {
    #[serde(default = "default_id")]
    id: QuestionId,
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    comment: String,
    text: String,
    #[serde(default)]
    precision: Option<u32>,
    #[serde(default)]
    thousands_delim: Option<ThousandsDelim>,
    accounts: String,
    #[serde(default)]
    variables: String,
    /// Makes random variables reproducible.
    #[serde(default)]
    seed: Option<u64>,
}

fn default_id() -> QuestionId {
    1
}

#[derive(Debug, Deserialize)]
struct TomlPart {
    #[serde(default)]
    text: String,
    #[serde(default = "default_max_lines")]
    max_lines: usize,
    booking: String,
}

fn default_max_lines() -> usize {
    4
}

/// Parse a single TOML file into a question.
pub fn load_question_file(path: &Path, config: &ScoringConfig) -> Result<AccountingQuestion> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read question file: {}", path.display()))?;

    parse_question_str(&content, path, config)
}

/// Parse a TOML string into a question (useful for testing).
///
/// Parts are numbered from 1 in file order.
pub fn parse_question_str(
    content: &str,
    source_path: &Path,
    config: &ScoringConfig,
) -> Result<AccountingQuestion> {
    let parsed: TomlQuestionFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;
    let header = parsed.question;

    let parser = match header.seed {
        Some(seed) => ReferenceVariableParser::with_seed(seed),
        None => ReferenceVariableParser::new(),
    };
    let record = QuestionRecord {
        id: Some(header.id),
        original_id: None,
        container_id: 0,
        title: header.title,
        comment: header.comment,
        author: header.author,
        owner: -1,
        question_text: header.text,
        points: 0.0,
        accounts_xml: header.accounts,
        account_hash: String::new(),
        variables_xml: header.variables,
        precision: header.precision.unwrap_or(config.default_precision),
        thousands_delim_type: header.thousands_delim,
    };
    let mut question = AccountingQuestion::from_record(record, &parser, config);
    if let Some(reason) = question.analyze_error() {
        bail!("invalid definition in {}: {reason}", source_path.display());
    }

    // learners type amounts the way the question displays them
    let number_format = question.number_format();
    for (idx, part) in parsed.parts.into_iter().enumerate() {
        let mut ledger = LedgerPart::new(part.max_lines)
            .with_text(part.text)
            .with_number_format(number_format)
            .with_booking(&part.booking)
            .with_context(|| format!("booking of part {}", idx + 1))?;
        ledger.set_part_id(idx as u64 + 1);
        question.add_part(Box::new(ledger));
    }

    Ok(question)
}

/// A warning from question validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The part (if applicable).
    pub part_id: Option<u64>,
    /// Warning message.
    pub message: String,
}

/// Validate a question for common authoring issues.
pub fn validate_question(question: &AccountingQuestion) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let defined: HashSet<&str> = question
        .variables()
        .variables()
        .map(|v| v.name.as_str())
        .collect();

    let mut check_tokens = |part_id: Option<u64>, what: &str, text: &str| {
        for caps in TOKEN_PATTERN.captures_iter(text) {
            let name = &caps[1];
            if !defined.contains(name) {
                warnings.push(ValidationWarning {
                    part_id,
                    message: format!("{what} references undefined variable {{{name}}}"),
                });
            }
        }
    };

    check_tokens(None, "question text", question.question_text());
    for part in question.parts() {
        let part_id = Some(part.part_id());
        check_tokens(part_id, "part text", part.text());
        check_tokens(part_id, "booking", part.booking_xml());
    }

    if question.accounts().accounts().is_empty() {
        warnings.push(ValidationWarning {
            part_id: None,
            message: "no accounts defined".into(),
        });
    }

    if question.parts().is_empty() {
        warnings.push(ValidationWarning {
            part_id: None,
            message: "question has no parts".into(),
        });
    }

    for part in question.parts() {
        if part.max_points() <= 0.0 {
            warnings.push(ValidationWarning {
                part_id: Some(part.part_id()),
                message: "booking gives no points".into(),
            });
        }
        if part.max_lines() == 0 {
            warnings.push(ValidationWarning {
                part_id: Some(part.part_id()),
                message: "part allows no ledger rows".into(),
            });
        }
    }

    if !question.is_complete() {
        warnings.push(ValidationWarning {
            part_id: None,
            message: "title, author, text or points missing".into(),
        });
    }

    warnings
}
