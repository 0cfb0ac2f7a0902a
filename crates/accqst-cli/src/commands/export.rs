//! The `accqst export` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};

pub fn execute(question: PathBuf, solution: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let mut orchestrator = super::orchestrator(&question, config_path)?;
    let record = super::read_solution(&solution)?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    for row in orchestrator.export_solution(&record)? {
        table.add_row(row.cells.into_iter().map(|text| {
            let cell = Cell::new(text);
            if row.bold {
                cell.add_attribute(Attribute::Bold)
            } else {
                cell
            }
        }));
    }
    println!("{table}");
    Ok(())
}
