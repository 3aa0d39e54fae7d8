//! Engine configuration.
//!
//! All numeric policy lives here: contributor coefficients, the reviewer
//! gate, and the reputation scorer's bonuses/coefficients/thresholds.
//! Configuration is an explicit value threaded into every scoring call;
//! there is no process-wide mutable state. Every field has a documented
//! default and the engine functions correctly with defaults alone.
//!
//! Loaded from `crowdbench.toml` in the project root or a user-specified
//! path; callers may also construct the structs directly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Coefficients for the contributor leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContributorCoefficients {
    /// Flat bonus granted to affiliated users.
    pub affiliation_bonus_points: f64,
    /// Weight of the average prompt quality term.
    pub quality_weight: f64,
    /// Weight of the reputation-multiplier term.
    pub reputation_weight: f64,
    /// Upper bound on the reputation multiplier.
    pub reputation_cap: f64,
    /// Minimum feedback count before a prompt's quality counts as evidence.
    pub min_reviews_for_quality: u32,
}

impl Default for ContributorCoefficients {
    fn default() -> Self {
        Self {
            affiliation_bonus_points: 10.0,
            quality_weight: 0.7,
            reputation_weight: 0.3,
            reputation_cap: 2.0,
            min_reviews_for_quality: 3,
        }
    }
}

impl ContributorCoefficients {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_finite("contributor.affiliation_bonus_points", self.affiliation_bonus_points)?;
        require_non_negative("contributor.affiliation_bonus_points", self.affiliation_bonus_points)?;
        require_finite("contributor.quality_weight", self.quality_weight)?;
        require_non_negative("contributor.quality_weight", self.quality_weight)?;
        require_finite("contributor.reputation_weight", self.reputation_weight)?;
        require_non_negative("contributor.reputation_weight", self.reputation_weight)?;
        require_finite("contributor.reputation_cap", self.reputation_cap)?;
        if self.reputation_cap < 1.0 {
            return Err(ConfigError::OutOfRange {
                field: "contributor.reputation_cap".to_string(),
                reason: "must be >= 1.0 (the no-history multiplier)".to_string(),
            });
        }
        Ok(())
    }
}

/// Coefficients for the reviewer leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewerCoefficients {
    /// Minimum usable review count before a reviewer appears on the board.
    pub min_reviews_required: u32,
}

impl Default for ReviewerCoefficients {
    fn default() -> Self {
        Self {
            min_reviews_required: 5,
        }
    }
}

/// One-time bonus amounts for the user reputation scorer.
///
/// Each bonus is either fully granted or zero, never partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusPoints {
    pub affiliation: f64,
    pub benchmark_creator: f64,
    pub diverse_feedback_benchmarks: f64,
    pub diverse_feedback_users: f64,
    pub quality_prompts: f64,
    pub difficult_prompts: f64,
    pub sota_difficult_prompts: f64,
}

impl Default for BonusPoints {
    fn default() -> Self {
        Self {
            affiliation: 50.0,
            benchmark_creator: 100.0,
            diverse_feedback_benchmarks: 25.0,
            diverse_feedback_users: 25.0,
            quality_prompts: 75.0,
            difficult_prompts: 75.0,
            sota_difficult_prompts: 100.0,
        }
    }
}

impl BonusPoints {
    fn entries(&self) -> [(&'static str, f64); 7] {
        [
            ("bonus.affiliation", self.affiliation),
            ("bonus.benchmark_creator", self.benchmark_creator),
            ("bonus.diverse_feedback_benchmarks", self.diverse_feedback_benchmarks),
            ("bonus.diverse_feedback_users", self.diverse_feedback_users),
            ("bonus.quality_prompts", self.quality_prompts),
            ("bonus.difficult_prompts", self.difficult_prompts),
            ("bonus.sota_difficult_prompts", self.sota_difficult_prompts),
        ]
    }
}

/// Continuous (never gated) component coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContinuousCoefficients {
    /// Multiplied by h-index squared.
    pub h_index: f64,
    /// Per quality prompt.
    pub quality_prompts: f64,
    /// Per feedback given.
    pub feedback_activity: f64,
    /// Per distinct collaborator.
    pub collaboration: f64,
}

impl Default for ContinuousCoefficients {
    fn default() -> Self {
        Self {
            h_index: 5.0,
            quality_prompts: 2.0,
            feedback_activity: 0.5,
            collaboration: 1.0,
        }
    }
}

/// Gating thresholds for the reputation bonuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationThresholds {
    /// Distinct contributors a created benchmark needs for the
    /// benchmark-creator bonus.
    pub min_benchmark_contributors: u32,
    /// Distinct benchmarks reviewed for the diverse-feedback bonus.
    pub min_feedback_benchmarks: u32,
    /// Distinct prompt authors reviewed for the diverse-feedback bonus.
    pub min_feedback_users: u32,
    /// Quality prompts needed for the quality-prompts bonus.
    pub min_quality_prompts: u32,
    /// Stumping prompts needed for the difficult-prompts bonus.
    pub min_difficult_prompts: u32,
    /// A prompt "stumps" models when its mean score falls below this.
    pub wrong_answer_threshold: f64,
    /// Minimum positive fraction for a prompt to count as a quality prompt.
    pub quality_prompt_threshold: f64,
}

impl Default for ReputationThresholds {
    fn default() -> Self {
        Self {
            min_benchmark_contributors: 3,
            min_feedback_benchmarks: 3,
            min_feedback_users: 5,
            min_quality_prompts: 5,
            min_difficult_prompts: 3,
            wrong_answer_threshold: 0.3,
            quality_prompt_threshold: 0.7,
        }
    }
}

/// Full configuration for the user reputation scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UserScoreConfig {
    /// Model ids counted as state-of-the-art for the SOTA-difficult bonus.
    pub sota_models: Vec<String>,
    pub bonuses: BonusPoints,
    pub coefficients: ContinuousCoefficients,
    pub thresholds: ReputationThresholds,
}

impl UserScoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in self.bonuses.entries() {
            require_finite(field, value)?;
            require_non_negative(field, value)?;
        }
        let coefficients = [
            ("coefficient.h_index", self.coefficients.h_index),
            ("coefficient.quality_prompts", self.coefficients.quality_prompts),
            ("coefficient.feedback_activity", self.coefficients.feedback_activity),
            ("coefficient.collaboration", self.coefficients.collaboration),
        ];
        for (field, value) in coefficients {
            require_finite(field, value)?;
            require_non_negative(field, value)?;
        }
        require_unit_range(
            "threshold.wrong_answer_threshold",
            self.thresholds.wrong_answer_threshold,
        )?;
        require_unit_range(
            "threshold.quality_prompt_threshold",
            self.thresholds.quality_prompt_threshold,
        )?;
        Ok(())
    }
}

/// Aggregate engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub contributor: ContributorCoefficients,
    pub reviewer: ReviewerCoefficients,
    pub user_score: UserScoreConfig,
}

impl EngineConfig {
    /// Validate every section. Called before any computation starts;
    /// a configuration error aborts the whole run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.contributor.validate()?;
        self.user_score.validate()?;
        Ok(())
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.into(), e))?;
        let parsed: Self =
            toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(path.into(), e))?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Discover and load configuration.
    ///
    /// Search order:
    /// 1. Explicit path (if provided)
    /// 2. `./crowdbench.toml` (project root)
    ///
    /// Returns defaults if no config file is found.
    pub fn discover(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }
        let candidate = PathBuf::from("crowdbench.toml");
        if candidate.exists() {
            return Self::load(&candidate);
        }
        Ok(Self::default())
    }
}

/// Configuration errors. Fatal: surfaced before any computation starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed reading config file {0}: {1}")]
    ReadFailed(PathBuf, #[source] std::io::Error),
    #[error("failed parsing config file {0}: {1}")]
    ParseFailed(PathBuf, #[source] toml::de::Error),
    #[error("{field} is not a finite number")]
    NotFinite { field: String },
    #[error("{field} must not be negative")]
    Negative { field: String },
    #[error("{field} out of range: {reason}")]
    OutOfRange { field: String, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ReadFailed(..) => "CFG_READ_FAILED",
            Self::ParseFailed(..) => "CFG_PARSE_FAILED",
            Self::NotFinite { .. } => "CFG_NOT_FINITE",
            Self::Negative { .. } => "CFG_NEGATIVE",
            Self::OutOfRange { .. } => "CFG_OUT_OF_RANGE",
        }
    }
}

fn require_finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NotFinite {
            field: field.to_string(),
        })
    }
}

fn require_non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value < 0.0 {
        Err(ConfigError::Negative {
            field: field.to_string(),
        })
    } else {
        Ok(())
    }
}

fn require_unit_range(field: &str, value: f64) -> Result<(), ConfigError> {
    require_finite(field, value)?;
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            reason: "must lie in [0, 1]".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_contributor_values_match_documentation() {
        let c = ContributorCoefficients::default();
        assert_eq!(c.quality_weight, 0.7);
        assert_eq!(c.reputation_weight, 0.3);
        assert_eq!(c.reputation_cap, 2.0);
        assert_eq!(c.min_reviews_for_quality, 3);
        assert_eq!(c.affiliation_bonus_points, 10.0);
    }

    #[test]
    fn default_reviewer_gate() {
        assert_eq!(ReviewerCoefficients::default().min_reviews_required, 5);
    }

    #[test]
    fn nan_weight_rejected() {
        let config = EngineConfig {
            contributor: ContributorCoefficients {
                quality_weight: f64::NAN,
                ..ContributorCoefficients::default()
            },
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CFG_NOT_FINITE");
    }

    #[test]
    fn negative_bonus_rejected() {
        let mut config = EngineConfig::default();
        config.user_score.bonuses.quality_prompts = -1.0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CFG_NEGATIVE");
    }

    #[test]
    fn reputation_cap_below_one_rejected() {
        let config = EngineConfig {
            contributor: ContributorCoefficients {
                reputation_cap: 0.5,
                ..ContributorCoefficients::default()
            },
            ..EngineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CFG_OUT_OF_RANGE");
    }

    #[test]
    fn wrong_answer_threshold_out_of_unit_range_rejected() {
        let mut config = EngineConfig::default();
        config.user_score.thresholds.wrong_answer_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "CFG_OUT_OF_RANGE");
    }

    #[test]
    fn partial_toml_overrides_merge_over_defaults() {
        let parsed: EngineConfig = toml::from_str(
            r#"
            [contributor]
            quality_weight = 0.9

            [user_score.thresholds]
            min_quality_prompts = 2
            "#,
        )
        .unwrap();
        assert_eq!(parsed.contributor.quality_weight, 0.9);
        // Untouched fields keep their defaults.
        assert_eq!(parsed.contributor.reputation_weight, 0.3);
        assert_eq!(parsed.user_score.thresholds.min_quality_prompts, 2);
        assert_eq!(parsed.user_score.thresholds.min_difficult_prompts, 3);
    }

    #[test]
    fn toml_roundtrip() {
        let config = EngineConfig::default();
        let rendered = toml::to_string(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn discover_without_file_returns_defaults() {
        // No crowdbench.toml in the test working directory set.
        let config = EngineConfig::discover(None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }
}
