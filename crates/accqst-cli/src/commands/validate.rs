//! The `accqst validate` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};

use accqst_core::accounts::AccountDirectory;
use accqst_core::config::ScoringConfig;
use accqst_core::numeric::DisplayFormat;
use accqst_core::variables::VariableEngine;
use accqst_reference::{load_question_file, validate_question, ReferenceVariableParser};

pub fn execute(
    accounts: Option<PathBuf>,
    variables: Option<PathBuf>,
    question: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = super::load_config(config_path)?;

    if let Some(path) = question {
        return validate_questions(&path, &config);
    }

    if let Some(path) = accounts {
        let xml = read(&path)?;
        let mut directory = AccountDirectory::new();
        directory.set_definition(&xml)?;

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Number", "Title", "Shown as"]);
        for account in directory.accounts() {
            table.add_row(vec![
                account.number.clone(),
                account.title.clone(),
                account.display_text.clone(),
            ]);
        }
        println!("Accounts: {} ({})", directory.accounts().len(), path.display());
        println!("{table}");
    }

    if let Some(path) = variables {
        let xml = read(&path)?;
        let mut engine = VariableEngine::new(DisplayFormat {
            precision: config.default_precision,
            number: config.number_format_for(None),
        });
        engine.set_definition(&xml, &ReferenceVariableParser::new())?;
        engine.calculate_all()?;

        let format = engine.display_format();
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Variable", "Value", "Shown as"]);
        for variable in engine.variables() {
            table.add_row(vec![
                variable.name.clone(),
                variable.numeric().unwrap_or_default(),
                variable.display(&format).unwrap_or_default(),
            ]);
        }
        println!("Variables: {} ({})", engine.len(), path.display());
        println!("{table}");
    }

    Ok(())
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn validate_questions(path: &Path, config: &ScoringConfig) -> Result<()> {
    let files = if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)
            .with_context(|| format!("failed to read directory: {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut total_warnings = 0;
    for file in &files {
        let question = load_question_file(file, config)?;
        println!(
            "Question: {} ({} parts, {} points)",
            question.title(),
            question.parts().len(),
            question.points()
        );

        let warnings = validate_question(&question);
        for w in &warnings {
            let prefix = w
                .part_id
                .map(|id| format!("  [part {id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All questions valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
