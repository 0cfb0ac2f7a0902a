//! Solution codec: learner ledger input to and from stored solution rows.
//!
//! The current format keeps the ledger of all parts in one `accqst_input`
//! row, one `<input part_id="…">` fragment per part joined by
//! `<partBreak />`. Older solutions stored one `accqst_<field>_<partId>`
//! row per part and field; only their `input` rows are decoded.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use regex::Regex;

use crate::accounts::AccountDirectory;
use crate::error::AccqstError;
use crate::model::{
    LedgerRowInput, PartId, PartInput, SolutionRecord, SolutionRow, INPUT_KEY, KEY_PREFIX,
    PART_BREAK,
};

static PART_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"part_id="([0-9]+)""#).expect("part id pattern is valid"));

/// Encodes submissions, resolving account texts through the directory.
#[derive(Debug, Clone, Copy)]
pub struct SolutionCodec<'a> {
    accounts: &'a AccountDirectory,
}

impl<'a> SolutionCodec<'a> {
    pub fn new(accounts: &'a AccountDirectory) -> Self {
        Self { accounts }
    }

    /// Encode all parts into the single `accqst_input` row.
    pub fn encode_submission(&self, parts: &[PartInput]) -> Result<SolutionRow, AccqstError> {
        let fragments = parts
            .iter()
            .map(|part| self.encode_fragment(part))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SolutionRow::new(INPUT_KEY, fragments.join(PART_BREAK)))
    }

    /// Encode the `<input>` fragment of one part.
    ///
    /// Exactly `max_lines` rows are written; missing rows are empty and
    /// surplus rows are dropped.
    pub fn encode_fragment(&self, part: &PartInput) -> Result<String, AccqstError> {
        let mut writer = Writer::new(Vec::new());
        let part_id = part.part_id.to_string();

        let mut input = BytesStart::new("input");
        input.push_attribute(("part_id", part_id.as_str()));
        writer
            .write_event(Event::Start(input))
            .map_err(|e| AccqstError::Encode(e.to_string()))?;

        let empty = LedgerRowInput::default();
        for idx in 0..part.max_lines {
            let row = part.rows.get(idx).unwrap_or(&empty);
            writer
                .write_event(Event::Empty(self.row_element(row)))
                .map_err(|e| AccqstError::Encode(e.to_string()))?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("input")))
            .map_err(|e| AccqstError::Encode(e.to_string()))?;

        String::from_utf8(writer.into_inner()).map_err(|e| AccqstError::Encode(e.to_string()))
    }

    fn row_element(&self, row: &LedgerRowInput) -> BytesStart<'static> {
        let mut element = BytesStart::new("row");
        // Money and raw values carry the same submitted text.
        element.push_attribute(("rightValueMoney", row.right_amount.as_str()));
        element.push_attribute(("leftValueMoney", row.left_amount.as_str()));
        element.push_attribute(("rightValueRaw", row.right_amount.as_str()));
        element.push_attribute(("leftValueRaw", row.left_amount.as_str()));
        element.push_attribute(("rightAccountNum", row.right_account.as_str()));
        element.push_attribute(("leftAccountNum", row.left_account.as_str()));
        element.push_attribute((
            "rightAccountRaw",
            self.accounts.text_for(&row.right_account),
        ));
        element.push_attribute(("leftAccountRaw", self.accounts.text_for(&row.left_account)));
        element
    }
}

/// The two stored solution vintages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredFormat<'a> {
    /// A single `accqst_input` row with concatenated fragments.
    Current { input: &'a str },
    /// Per-part `accqst_<field>_<partId>` rows.
    Legacy { entries: Vec<(&'a str, &'a str)> },
}

impl<'a> StoredFormat<'a> {
    /// Detect the vintage of a stored solution.
    pub fn detect(stored: &'a SolutionRecord) -> Self {
        match stored.get(INPUT_KEY) {
            Some(input) => StoredFormat::Current { input },
            None => StoredFormat::Legacy {
                entries: stored.iter().collect(),
            },
        }
    }

    /// Ledger fragments keyed by part id.
    pub fn into_parts(self) -> BTreeMap<PartId, String> {
        let mut parts = BTreeMap::new();
        match self {
            StoredFormat::Current { input } => {
                for fragment in input.split(PART_BREAK) {
                    match fragment_part_id(fragment) {
                        Some(part_id) => {
                            parts.insert(part_id, fragment.to_string());
                        }
                        None => tracing::trace!("dropping fragment without part id"),
                    }
                }
            }
            StoredFormat::Legacy { entries } => {
                for (key, value) in entries {
                    if let Some(part_id) = legacy_input_part_id(key) {
                        parts.insert(part_id, value.to_string());
                    }
                }
            }
        }
        parts
    }
}

/// Decode any stored solution into ledger fragments keyed by part id.
pub fn decode_stored(stored: &SolutionRecord) -> BTreeMap<PartId, String> {
    StoredFormat::detect(stored).into_parts()
}

fn fragment_part_id(fragment: &str) -> Option<PartId> {
    PART_ID_PATTERN
        .captures(fragment)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Part id of a legacy `accqst_input_<partId>` key; other fields are
/// textual analyses and yield `None`.
fn legacy_input_part_id(key: &str) -> Option<PartId> {
    if !key.starts_with(KEY_PREFIX) {
        return None;
    }
    let mut fields = key.split('_').skip(1);
    if fields.next() != Some("input") {
        return None;
    }
    match fields.next() {
        Some(id) => id.parse().ok(),
        None => Some(0),
    }
}
