//! Tabular export of graded solutions.
//!
//! Each part contributes a bold heading row with the ledger headers,
//! one row per scored ledger line and one row per non-zero adjustment.

use serde::{Deserialize, Serialize};

use crate::config::Labels;
use crate::model::{RowScore, ScoreBreakdown};
use crate::numeric::format_plain;

/// One spreadsheet row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub cells: Vec<String>,
    pub bold: bool,
}

impl ExportRow {
    fn plain(cells: Vec<String>) -> Self {
        Self { cells, bold: false }
    }

    fn bold(cells: Vec<String>) -> Self {
        Self { cells, bold: true }
    }
}

/// Heading row with the question type and title.
pub fn title_row(labels: &Labels, title: &str) -> ExportRow {
    ExportRow::bold(vec![labels.question_type.clone(), title.to_string()])
}

/// Rows of the part at 1-based `position`.
pub fn part_rows(labels: &Labels, position: usize, breakdown: &ScoreBreakdown) -> Vec<ExportRow> {
    let mut rows = Vec::with_capacity(breakdown.rows.len() + 2);
    rows.push(ExportRow::bold(vec![
        format!("{} {position}", labels.accounting_table),
        breakdown.header_left.clone(),
        breakdown.header_right.clone(),
    ]));

    for row in &breakdown.rows {
        let (left, right) = ledger_cells(labels, row);
        rows.push(ExportRow::plain(vec![String::new(), left, right]));
    }

    for (adjustment, value) in breakdown.adjustments() {
        if value == 0.0 {
            continue;
        }
        rows.push(ExportRow::plain(vec![
            String::new(),
            labels.adjustment(adjustment).to_string(),
            format!("{} {}", format_plain(value), labels.points_for(value.abs())),
        ]));
    }
    rows
}

fn ledger_cells(labels: &Labels, row: &RowScore) -> (String, String) {
    let side = |text: &str, raw: &str, points: f64| {
        format!(
            "{text} {raw} ({} {})",
            format_plain(points),
            labels.points_for(points)
        )
    };
    (
        side(&row.left_account_text, &row.left_value_raw, row.left_points),
        side(&row.right_account_text, &row.right_value_raw, row.right_points),
    )
}
