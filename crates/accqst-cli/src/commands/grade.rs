//! The `accqst grade` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};

pub fn execute(
    question: PathBuf,
    solution: PathBuf,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut orchestrator = super::orchestrator(&question, config_path)?;
    let record = super::read_solution(&solution)?;
    let report = orchestrator.grade_solution(&record)?;

    if let Some(path) = &output {
        report.save_json(path)?;
        eprintln!("Report written to {}", path.display());
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            println!("{}", report.rendered.text);
            println!();

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Part", "Points", "Maximum"]);
            for part in &report.parts {
                table.add_row(vec![
                    part.part_id.to_string(),
                    part.points.to_string(),
                    part.max_points.to_string(),
                ]);
            }
            println!("{table}");
            println!(
                "Reached {} of {} points ({:.1}%)",
                report.reached_points,
                report.maximum_points,
                report.ratio() * 100.0
            );
        }
    }

    Ok(())
}
