//! Scoring configuration and loader.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::Adjustment;
use crate::numeric::{NumberFormat, ThousandsDelim};

/// Installation-wide settings for accounting questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Thousands delimiter for displayed values.
    #[serde(default)]
    pub thousands_delim: ThousandsDelim,
    /// Let each question choose its own thousands delimiter.
    #[serde(default)]
    pub thousands_delim_per_question: bool,
    /// Precision given to new questions.
    #[serde(default = "default_precision")]
    pub default_precision: u32,
    /// Decimal separator learners type amounts with.
    #[serde(default = "default_decimal_separator")]
    pub decimal_separator: char,
    /// Texts used by the export surface.
    #[serde(default)]
    pub labels: Labels,
}

fn default_precision() -> u32 {
    2
}

fn default_decimal_separator() -> char {
    ','
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            thousands_delim: ThousandsDelim::None,
            thousands_delim_per_question: false,
            default_precision: default_precision(),
            decimal_separator: default_decimal_separator(),
            labels: Labels::default(),
        }
    }
}

impl ScoringConfig {
    /// Thousands delimiter in effect for a question.
    ///
    /// The question's own choice only counts when per-question
    /// delimiters are enabled.
    pub fn thousands_delim_for(&self, question_choice: Option<ThousandsDelim>) -> ThousandsDelim {
        match question_choice {
            Some(choice) if self.thousands_delim_per_question => choice,
            _ => self.thousands_delim,
        }
    }

    /// Format used to render and read amounts of a question.
    pub fn number_format_for(&self, question_choice: Option<ThousandsDelim>) -> NumberFormat {
        NumberFormat::new(self.decimal_separator, self.thousands_delim_for(question_choice))
    }
}

/// Export and point labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub question_type: String,
    pub accounting_table: String,
    pub point: String,
    pub points: String,
    pub bonus_order_left: String,
    pub bonus_order_right: String,
    pub malus_count_left: String,
    pub malus_count_right: String,
    pub malus_sums_differ: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            question_type: "Accounting Question".into(),
            accounting_table: "Accounting table".into(),
            point: "point".into(),
            points: "points".into(),
            bonus_order_left: "Bonus for order (debit)".into(),
            bonus_order_right: "Bonus for order (credit)".into(),
            malus_count_left: "Malus for row count (debit)".into(),
            malus_count_right: "Malus for row count (credit)".into(),
            malus_sums_differ: "Malus for differing sums".into(),
        }
    }
}

impl Labels {
    pub fn adjustment(&self, adjustment: Adjustment) -> &str {
        match adjustment {
            Adjustment::BonusOrderLeft => &self.bonus_order_left,
            Adjustment::BonusOrderRight => &self.bonus_order_right,
            Adjustment::MalusCountLeft => &self.malus_count_left,
            Adjustment::MalusCountRight => &self.malus_count_right,
            Adjustment::MalusSumsDiffer => &self.malus_sums_differ,
        }
    }

    /// `point` for exactly one, `points` otherwise.
    pub fn points_for(&self, value: f64) -> &str {
        if value == 1.0 {
            &self.point
        } else {
            &self.points
        }
    }
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `accqst.toml` in the current directory
/// 2. `~/.config/accqst/config.toml`
///
/// `ACCQST_THOUSANDS_DELIM` overrides the global thousands delimiter.
pub fn load_config_from(path: Option<&Path>) -> Result<ScoringConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("accqst.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ScoringConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ScoringConfig::default(),
    };

    if let Ok(delim) = std::env::var("ACCQST_THOUSANDS_DELIM") {
        config.thousands_delim = delim
            .parse()
            .map_err(|e: String| anyhow::anyhow!("ACCQST_THOUSANDS_DELIM: {e}"))?;
    }

    Ok(config)
}

fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("accqst"))
}
