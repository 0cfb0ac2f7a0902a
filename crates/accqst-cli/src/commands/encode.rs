//! The `accqst encode` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use accqst_core::model::{SolutionRecord, Submission};

pub fn execute(question: PathBuf, rows: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let mut orchestrator = super::orchestrator(&question, config_path)?;

    let content = std::fs::read_to_string(&rows)
        .with_context(|| format!("failed to read rows: {}", rows.display()))?;
    let submission: Submission = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse rows: {}", rows.display()))?;

    orchestrator.resolve_variables(&SolutionRecord::new())?;
    let encoded = orchestrator.encode_submission(&submission)?;
    let solution = orchestrator.add_variables_to_solution(encoded);

    println!("{}", serde_json::to_string_pretty(&solution)?);
    Ok(())
}
