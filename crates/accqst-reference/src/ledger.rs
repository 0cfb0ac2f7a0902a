//! Reference ledger part.
//!
//! Booking and working ledgers share one XML shape:
//!
//! ```xml
//! <input headerLeft="Debit" headerRight="Credit">
//!   <row leftAccountNum="1200" leftValueMoney="500" leftPoints="1"
//!        rightAccountNum="4000" rightValueMoney="500" rightPoints="1"/>
//! </input>
//! ```
//!
//! Every booked side entry is worth its `leftPoints`/`rightPoints` (one
//! point when omitted). A learner's side entry earns the points of the
//! first unused booked entry on the same side with the same account
//! number and an equal amount.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use accqst_core::model::{PartId, QuestionId, RowScore, ScoreBreakdown, SubstitutionMode};
use accqst_core::numeric::{leading_float, leading_int, parse_amount, NumberFormat, Tolerance};
use accqst_core::traits::Part;
use accqst_core::variables::VariableEngine;

use crate::error::ReferenceError;
use crate::xml::{attributes, element_name};

const DEFAULT_HEADER_LEFT: &str = "Debit";
const DEFAULT_HEADER_RIGHT: &str = "Credit";

/// One side of a ledger row.
#[derive(Debug, Clone, Default, PartialEq)]
struct SideEntry {
    account_num: String,
    account_text: String,
    value_raw: String,
    points: f64,
}

impl SideEntry {
    fn is_empty(&self) -> bool {
        self.account_num.trim().is_empty() && self.value_raw.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct LedgerRow {
    left: SideEntry,
    right: SideEntry,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Ledger {
    header_left: Option<String>,
    header_right: Option<String>,
    rows: Vec<LedgerRow>,
}

fn parse_ledger(xml: &str) -> Result<Ledger, ReferenceError> {
    let mut ledger = Ledger::default();
    if xml.trim().is_empty() {
        return Ok(ledger);
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let decoder = reader.decoder();
    let mut depth = 0usize;

    loop {
        let event = reader.read_event().map_err(|e| {
            ReferenceError::Ledger(format!("position {}: {e}", reader.error_position()))
        })?;
        let (element, opens) = match event {
            Event::Start(element) => (element, true),
            Event::Empty(element) => (element, false),
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        let attrs = attributes(&element, decoder).map_err(ReferenceError::Ledger)?;
        if depth == 0 {
            ledger.header_left = attrs.get("headerLeft").cloned();
            ledger.header_right = attrs.get("headerRight").cloned();
        } else if element_name(&element) == "row" {
            ledger.rows.push(LedgerRow {
                left: side(&attrs, "left"),
                right: side(&attrs, "right"),
            });
        }
        if opens {
            depth += 1;
        }
    }
    Ok(ledger)
}

fn side(attrs: &BTreeMap<String, String>, prefix: &str) -> SideEntry {
    let get = |field: &str| attrs.get(&format!("{prefix}{field}")).cloned();
    let account_num = get("AccountNum").unwrap_or_default();
    let value_raw = get("ValueMoney")
        .or_else(|| get("ValueRaw"))
        .unwrap_or_default();
    let points = match get("Points") {
        Some(points) => leading_float(&points),
        None if account_num.trim().is_empty() => 0.0,
        None => 1.0,
    };
    SideEntry {
        account_text: get("AccountRaw")
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| account_num.clone()),
        account_num,
        value_raw,
        points,
    }
}

/// A ledger exercise scored by matching side entries.
#[derive(Debug, Clone)]
pub struct LedgerPart {
    part_id: PartId,
    question_id: Option<QuestionId>,
    max_lines: usize,
    text: String,
    booking_xml: String,
    booking: Ledger,
    working: Ledger,
    number_format: NumberFormat,
    data: ScoreBreakdown,
}

impl LedgerPart {
    pub fn new(max_lines: usize) -> Self {
        Self {
            part_id: 0,
            question_id: None,
            max_lines,
            text: String::new(),
            booking_xml: String::new(),
            booking: Ledger::default(),
            working: Ledger::default(),
            number_format: NumberFormat::default(),
            data: ScoreBreakdown::default(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the booking without variable substitution.
    pub fn with_booking(mut self, xml: &str) -> anyhow::Result<Self> {
        self.set_booking_xml(xml, None)?;
        Ok(self)
    }

    /// Format learners type amounts in, usually the displayed one.
    pub fn with_number_format(mut self, format: NumberFormat) -> Self {
        self.number_format = format;
        self
    }

    fn header_left(&self) -> String {
        self.booking
            .header_left
            .clone()
            .unwrap_or_else(|| DEFAULT_HEADER_LEFT.to_string())
    }

    fn header_right(&self) -> String {
        self.booking
            .header_right
            .clone()
            .unwrap_or_else(|| DEFAULT_HEADER_RIGHT.to_string())
    }
}

/// Points for `given` against the booked entries of one side.
fn match_side(
    given: &SideEntry,
    booked: &[SideEntry],
    used: &mut [bool],
    tolerance: &Tolerance,
    format: &NumberFormat,
) -> f64 {
    if given.is_empty() {
        return 0.0;
    }
    let account = leading_int(&given.account_num);
    let amount = format.parse(&given.value_raw);

    for (idx, entry) in booked.iter().enumerate() {
        if used[idx] || entry.is_empty() {
            continue;
        }
        // bookings carry numeric values with a decimal point
        let expected = parse_amount(&entry.value_raw, '.');
        if leading_int(&entry.account_num) == account && tolerance.equals(amount, expected) {
            used[idx] = true;
            return entry.points;
        }
    }
    0.0
}

impl Part for LedgerPart {
    fn part_id(&self) -> PartId {
        self.part_id
    }

    fn set_part_id(&mut self, part_id: PartId) {
        self.part_id = part_id;
    }

    fn question_id(&self) -> Option<QuestionId> {
        self.question_id
    }

    fn set_question_id(&mut self, question_id: QuestionId) {
        self.question_id = Some(question_id);
    }

    fn max_lines(&self) -> usize {
        self.max_lines
    }

    fn max_points(&self) -> f64 {
        self.booking
            .rows
            .iter()
            .map(|row| row.left.points + row.right.points)
            .sum()
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn set_text(&mut self, text: String) {
        self.text = text;
    }

    fn booking_xml(&self) -> &str {
        &self.booking_xml
    }

    fn set_booking_xml(
        &mut self,
        xml: &str,
        variables: Option<&VariableEngine>,
    ) -> anyhow::Result<()> {
        let applied = match variables {
            Some(engine) => engine.substitute(xml, SubstitutionMode::Numeric),
            None => xml.to_string(),
        };
        self.booking = parse_ledger(&applied)?;
        self.booking_xml = xml.to_string();
        Ok(())
    }

    fn set_working_xml(&mut self, xml: &str) {
        self.working = match parse_ledger(xml) {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::warn!(part = self.part_id, "ignoring unreadable working ledger: {e}");
                Ledger::default()
            }
        };
    }

    fn calculate_reached_points(&mut self, tolerance: &Tolerance) -> f64 {
        let booked_left: Vec<SideEntry> = self.booking.rows.iter().map(|r| r.left.clone()).collect();
        let booked_right: Vec<SideEntry> =
            self.booking.rows.iter().map(|r| r.right.clone()).collect();
        let mut used_left = vec![false; booked_left.len()];
        let mut used_right = vec![false; booked_right.len()];

        let mut rows = Vec::new();
        let mut total = 0.0;
        for row in &self.working.rows {
            if row.left.is_empty() && row.right.is_empty() {
                continue;
            }
            let left_points = match_side(
                &row.left,
                &booked_left,
                &mut used_left,
                tolerance,
                &self.number_format,
            );
            let right_points = match_side(
                &row.right,
                &booked_right,
                &mut used_right,
                tolerance,
                &self.number_format,
            );
            total += left_points + right_points;
            rows.push(RowScore {
                left_account_text: row.left.account_text.clone(),
                left_value_raw: row.left.value_raw.clone(),
                left_points,
                right_account_text: row.right.account_text.clone(),
                right_value_raw: row.right.value_raw.clone(),
                right_points,
            });
        }

        self.data = ScoreBreakdown {
            header_left: self.header_left(),
            header_right: self.header_right(),
            rows,
            ..Default::default()
        };
        total
    }

    fn working_data(&self) -> &ScoreBreakdown {
        &self.data
    }

    fn clone_detached(&self) -> Box<dyn Part> {
        let mut copy = self.clone();
        copy.part_id = 0;
        copy.question_id = None;
        copy.working = Ledger::default();
        copy.data = ScoreBreakdown::default();
        Box::new(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accqst_core::numeric::ThousandsDelim;

    const BOOKING: &str = r#"<input headerLeft="Soll" headerRight="Haben">
        <row leftAccountNum="1200" leftValueMoney="500" rightAccountNum="4000" rightValueMoney="500"/>
        <row leftAccountNum="1200" leftValueMoney="19.5" leftPoints="0.5" rightAccountNum="" rightValueMoney=""/>
    </input>"#;

    fn working(rows: &[(&str, &str, &str, &str)]) -> String {
        let mut xml = String::from(r#"<input part_id="1">"#);
        for (la, lv, ra, rv) in rows {
            xml.push_str(&format!(
                r#"<row rightValueMoney="{rv}" leftValueMoney="{lv}" rightValueRaw="{rv}" leftValueRaw="{lv}" rightAccountNum="{ra}" leftAccountNum="{la}" rightAccountRaw="{ra}: X" leftAccountRaw="{la}: Y"/>"#
            ));
        }
        xml.push_str("</input>");
        xml
    }

    fn part() -> LedgerPart {
        LedgerPart::new(3).with_booking(BOOKING).unwrap()
    }

    #[test]
    fn max_points_sum_booked_sides() {
        assert_eq!(part().max_points(), 2.5);
    }

    #[test]
    fn correct_ledger_reaches_max_points() {
        let mut part = part();
        part.set_working_xml(&working(&[("1200", "500,00", "4000", "500"), ("1200", "19,50", "", "")]));
        assert_eq!(part.calculate_reached_points(&Tolerance::default()), 2.5);

        let data = part.working_data();
        assert_eq!(data.header_left, "Soll");
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0].left_account_text, "1200: Y");
        assert_eq!(data.rows[1].left_points, 0.5);
    }

    #[test]
    fn booked_entries_are_used_once() {
        let mut part = part();
        part.set_working_xml(&working(&[("1200", "500", "", ""), ("1200", "500", "", "")]));
        assert_eq!(part.calculate_reached_points(&Tolerance::default()), 1.0);
    }

    #[test]
    fn amounts_compare_with_tolerance() {
        let mut part = part();
        part.set_working_xml(&working(&[("1200", "500,004", "4000", "500,01")]));
        assert_eq!(part.calculate_reached_points(&Tolerance::new(2)), 1.0);
    }

    #[test]
    fn amounts_follow_number_format() {
        let mut part = part().with_number_format(NumberFormat::new('.', ThousandsDelim::Apostrophe));
        part.set_working_xml(&working(&[("1200", "500.00", "4000", "500"), ("1200", "19.50", "", "")]));
        assert_eq!(part.calculate_reached_points(&Tolerance::default()), 2.5);

        let booking = r#"<input><row leftAccountNum="1200" leftValueMoney="1234.5" rightAccountNum="" rightValueMoney=""/></input>"#;
        let mut grouped = LedgerPart::new(1)
            .with_booking(booking)
            .unwrap()
            .with_number_format(NumberFormat::new(',', ThousandsDelim::Apostrophe));
        grouped.set_working_xml(&working(&[("1200", "1'234,50", "", "")]));
        assert_eq!(grouped.calculate_reached_points(&Tolerance::default()), 1.0);
    }

    #[test]
    fn empty_or_broken_working_scores_zero() {
        let mut part = part();
        part.set_working_xml("");
        assert_eq!(part.calculate_reached_points(&Tolerance::default()), 0.0);
        part.set_working_xml("<input><row></input>");
        assert_eq!(part.calculate_reached_points(&Tolerance::default()), 0.0);
        assert!(part.working_data().rows.is_empty());
    }

    #[test]
    fn booking_is_substituted_numerically() {
        use accqst_core::numeric::DisplayFormat;

        let mut engine = VariableEngine::new(DisplayFormat::default());
        engine
            .set_definition(
                r#"<variables><var name="x" value="1234.5"/></variables>"#,
                &crate::variables::ReferenceVariableParser::new(),
            )
            .unwrap();
        engine.calculate_all().unwrap();

        let mut part = LedgerPart::new(1);
        part.set_booking_xml(
            r#"<input><row leftAccountNum="1200" leftValueMoney="{x}"/></input>"#,
            Some(&engine),
        )
        .unwrap();
        assert!(part.booking_xml().contains("{x}"));

        part.set_working_xml(&working(&[("1200", "1.234,50", "", "")]));
        assert_eq!(part.calculate_reached_points(&Tolerance::default()), 1.0);
    }

    #[test]
    fn broken_booking_is_rejected_and_previous_kept() {
        let mut part = part();
        assert!(part.set_booking_xml("<input><row></input>", None).is_err());
        assert_eq!(part.max_points(), 2.5);
        assert_eq!(part.booking_xml(), BOOKING);
    }

    #[test]
    fn detached_clone_has_no_identity() {
        let mut part = part();
        part.set_part_id(7);
        part.set_question_id(3);
        let copy = part.clone_detached();
        assert_eq!(copy.part_id(), 0);
        assert_eq!(copy.question_id(), None);
        assert_eq!(copy.max_points(), 2.5);
    }
}
