//! Chart-of-accounts directory.
//!
//! Parses the author's `<konten>` XML into an ordered account table and
//! resolves learner input (number, title or rendered text) to accounts.

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use sha2::{Digest, Sha256};

use crate::error::AccqstError;
use crate::model::Account;
use crate::numeric::leading_int;

const ROOT_ELEMENT: &str = "konten";

/// How an account's display text is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayMode {
    /// `anzeige="nummer"`
    Number,
    /// `anzeige="titel"`
    Title,
    /// Anything else: `"<number>: <title>"`.
    #[default]
    NumberAndTitle,
}

impl DisplayMode {
    fn from_attribute(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "nummer" => DisplayMode::Number,
            "titel" => DisplayMode::Title,
            _ => DisplayMode::NumberAndTitle,
        }
    }

    fn render(&self, number: &str, title: &str) -> String {
        match self {
            DisplayMode::Number => number.to_string(),
            DisplayMode::Title => title.to_string(),
            DisplayMode::NumberAndTitle => format!("{number}: {title}"),
        }
    }
}

/// Searchable in-memory account table of one question.
#[derive(Debug, Clone, Default)]
pub struct AccountDirectory {
    definition: String,
    accounts: Vec<Account>,
    display_mode: DisplayMode,
    search_by_title: bool,
    analyze_error: Option<String>,
}

struct ParsedDefinition {
    accounts: Vec<Account>,
    display_mode: DisplayMode,
    search_by_title: bool,
}

impl AccountDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the directory with the accounts of `xml`.
    ///
    /// On failure the account table is left empty and the reason is kept
    /// for [`analyze_error`](Self::analyze_error).
    pub fn set_definition(&mut self, xml: &str) -> Result<(), AccqstError> {
        self.accounts.clear();

        match parse_definition(xml) {
            Ok(parsed) => {
                tracing::debug!(accounts = parsed.accounts.len(), "account definition parsed");
                self.definition = xml.to_string();
                self.accounts = parsed.accounts;
                self.display_mode = parsed.display_mode;
                self.search_by_title = parsed.search_by_title;
                self.analyze_error = None;
                Ok(())
            }
            Err(reason) => {
                tracing::debug!(%reason, "account definition rejected");
                self.analyze_error = Some(reason.clone());
                Err(AccqstError::AccountDefinition(reason))
            }
        }
    }

    /// The XML last accepted by [`set_definition`](Self::set_definition).
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// SHA-256 of the accepted definition, hex encoded.
    pub fn definition_hash(&self) -> String {
        hex::encode(Sha256::digest(self.definition.as_bytes()))
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Whether learners may pick accounts by title.
    pub fn search_by_title(&self) -> bool {
        self.search_by_title
    }

    pub fn analyze_error(&self) -> Option<&str> {
        self.analyze_error.as_deref()
    }

    /// Find the account matching a learner's text.
    ///
    /// An account matches when its number equals the integer value of
    /// `text`, when its title equals `text` ignoring case (only if title
    /// search is enabled) or when its display text equals `text` ignoring
    /// case. The first match in definition order wins.
    pub fn lookup(&self, text: &str) -> Option<&Account> {
        let number = leading_int(text);
        let needle = text.to_lowercase();
        self.accounts.iter().find(|account| {
            leading_int(&account.number) == number
                || (self.search_by_title && account.title.to_lowercase() == needle)
                || account.display_text.to_lowercase() == needle
        })
    }

    /// Display text of the first account whose number equals `number`.
    pub fn text_for(&self, number: &str) -> &str {
        let wanted = leading_int(number);
        self.accounts
            .iter()
            .find(|account| leading_int(&account.number) == wanted)
            .map(|account| account.display_text.as_str())
            .unwrap_or("")
    }
}

fn parse_definition(xml: &str) -> Result<ParsedDefinition, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let decoder = reader.decoder();

    let mut parsed: Option<ParsedDefinition> = None;
    let mut depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed XML at position {}: {e}", reader.error_position()))?;
        match event {
            Event::Start(element) => {
                visit_element(&element, depth, decoder, &mut parsed)?;
                depth += 1;
            }
            Event::Empty(element) => visit_element(&element, depth, decoder, &mut parsed)?,
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err("unexpected end of document".to_string());
    }
    parsed.ok_or_else(|| "document has no root element".to_string())
}

fn visit_element(
    element: &BytesStart<'_>,
    depth: usize,
    decoder: Decoder,
    parsed: &mut Option<ParsedDefinition>,
) -> Result<(), String> {
    match (depth, parsed.as_mut()) {
        (0, None) => {
            let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
            if name != ROOT_ELEMENT {
                return Err(format!("root element must be <{ROOT_ELEMENT}>, found <{name}>"));
            }
            let display = attribute(element, decoder, "anzeige")?.unwrap_or_default();
            let search = attribute(element, decoder, "suche")?.unwrap_or_default();
            *parsed = Some(ParsedDefinition {
                accounts: Vec::new(),
                display_mode: DisplayMode::from_attribute(&display),
                search_by_title: search == "beide" || search == "titel",
            });
            Ok(())
        }
        (0, Some(_)) => Err("document has more than one root element".to_string()),
        (1, Some(definition)) => {
            let number = attribute(element, decoder, "nummer")?.unwrap_or_default();
            let title = attribute(element, decoder, "titel")?.unwrap_or_default();
            let display_text = definition.display_mode.render(&number, &title);
            definition.accounts.push(Account {
                number,
                title,
                display_text,
            });
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Read and unescape one attribute of an element.
pub(crate) fn attribute(
    element: &BytesStart<'_>,
    decoder: Decoder,
    name: &str,
) -> Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|e| e.to_string())?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
