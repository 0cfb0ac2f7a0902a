pub mod encode;
pub mod export;
pub mod grade;
pub mod init;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use accqst_core::config::{load_config_from, ScoringConfig};
use accqst_core::lock::SolutionLocks;
use accqst_core::model::SolutionRecord;
use accqst_core::orchestrator::{ScoringOrchestrator, ScoringServices};
use accqst_core::traits::Part;
use accqst_reference::{load_question_file, MemorySolutionStore};

/// Load the config and a question file into a ready orchestrator.
///
/// The CLI never persists solutions, so an empty in-memory store backs it.
pub(crate) fn orchestrator(
    question_path: &Path,
    config_path: Option<PathBuf>,
) -> Result<ScoringOrchestrator> {
    let config = load_config(config_path)?;
    let question = load_question_file(question_path, &config)?;
    tracing::debug!(path = %question_path.display(), parts = question.parts().len(), "question loaded");
    let services = ScoringServices::new(
        Arc::new(MemorySolutionStore::new()),
        Arc::new(SolutionLocks::new()),
        Arc::new(config),
    );
    Ok(ScoringOrchestrator::new(question, services))
}

pub(crate) fn load_config(config_path: Option<PathBuf>) -> Result<ScoringConfig> {
    load_config_from(config_path.as_deref())
}

pub(crate) fn read_solution(path: &Path) -> Result<SolutionRecord> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read solution: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse solution: {}", path.display()))
}
