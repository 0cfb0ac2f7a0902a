//! Grading report types with JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{PartId, QuestionId, ScoreBreakdown};
use crate::question::RenderedQuestion;

/// The outcome of grading one stored solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub question_id: Option<QuestionId>,
    pub title: String,
    /// Question and part texts as the learner saw them.
    pub rendered: RenderedQuestion,
    /// Variable values used, `name -> numeric string`.
    pub variables: BTreeMap<String, String>,
    pub parts: Vec<PartScore>,
    pub reached_points: f64,
    pub maximum_points: f64,
}

/// Points of one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartScore {
    pub part_id: PartId,
    pub points: f64,
    pub max_points: f64,
    pub breakdown: ScoreBreakdown,
}

impl GradingReport {
    /// Share of the maximum reached, `0.0` for a question without points.
    pub fn ratio(&self) -> f64 {
        if self.maximum_points > 0.0 {
            self.reached_points / self.maximum_points
        } else {
            0.0
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GradingReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::RenderedPart;

    fn report() -> GradingReport {
        GradingReport {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            question_id: Some(4),
            title: "Sales".into(),
            rendered: RenderedQuestion {
                text: "Book 500,00".into(),
                parts: vec![RenderedPart {
                    part_id: 1,
                    text: "Part one".into(),
                }],
            },
            variables: BTreeMap::from([("x".to_string(), "500".to_string())]),
            parts: vec![PartScore {
                part_id: 1,
                points: 1.5,
                max_points: 2.0,
                breakdown: ScoreBreakdown::default(),
            }],
            reached_points: 1.5,
            maximum_points: 2.0,
        }
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("grading.json");
        let original = report();
        original.save_json(&path).unwrap();

        let loaded = GradingReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, original.id);
        assert_eq!(loaded.rendered, original.rendered);
        assert_eq!(loaded.parts, original.parts);
        assert_eq!(loaded.variables["x"], "500");
    }

    #[test]
    fn ratio_of_empty_question_is_zero() {
        let mut report = report();
        assert!((report.ratio() - 0.75).abs() < 1e-9);
        report.maximum_points = 0.0;
        assert_eq!(report.ratio(), 0.0);
    }

    #[test]
    fn load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = GradingReport::load_json(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse report JSON"));
    }
}
