//! Input record types.
//!
//! These are the snapshot records the surrounding application hands to the
//! engine: already deduplicated and access-filtered. The engine never
//! mutates them; derived values (prompt quality, consensus, coverage) are
//! computed per run and live only in the output structures.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user. Affiliation is a one-time flag set externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
    pub has_affiliation: bool,
}

/// A named, ownable collection of prompts (a benchmark).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSet {
    pub id: String,
    pub name: String,
    pub creator_id: String,
    /// Set-level tags; a prompt matches a tag filter through its own tags
    /// or through these.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Prompt category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Question,
    Task,
    Adversarial,
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Question => write!(f, "question"),
            Self::Task => write!(f, "task"),
            Self::Adversarial => write!(f, "adversarial"),
        }
    }
}

/// A contributed test question. Immutable once created; quality is derived
/// from feedback, never stored on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub author_id: String,
    /// The benchmark this prompt belongs to.
    pub set_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub kind: PromptKind,
}

/// A quick-feedback opinion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opinion {
    Positive,
    Negative,
}

impl Opinion {
    /// Numeric mapping used by the reviewer correlation: +1 / -1.
    #[must_use]
    pub fn signal(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        matches!(self, Self::Positive)
    }
}

impl fmt::Display for Opinion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "positive"),
            Self::Negative => write!(f, "negative"),
        }
    }
}

/// A reviewer's lightweight opinion on a prompt.
///
/// Uniqueness invariant: at most one feedback per (reviewer, prompt).
/// Self-feedback on one's own prompt is excluded from consensus and
/// correlation by the scorers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub reviewer_id: String,
    pub prompt_id: String,
    pub opinion: Opinion,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// A score produced by running a model against a prompt.
///
/// `value` must lie in [0, 1]; non-finite or out-of-range values are
/// excluded at snapshot build, never coerced to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: String,
    pub prompt_id: String,
    pub model_id: String,
    pub value: f64,
    #[serde(default)]
    pub response_id: Option<String>,
}

/// The model run a score was derived from; source of response latency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub id: String,
    pub prompt_id: String,
    pub model_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ModelResponse {
    /// Response latency in seconds. Clock skew can make `finished_at`
    /// precede `started_at`; latency is floored at zero.
    #[must_use]
    pub fn latency_secs(&self) -> f64 {
        let millis = self
            .finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds();
        if millis <= 0 { 0.0 } else { millis as f64 / 1000.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn opinion_signal_mapping() {
        assert_eq!(Opinion::Positive.signal(), 1.0);
        assert_eq!(Opinion::Negative.signal(), -1.0);
    }

    #[test]
    fn opinion_serde_snake_case() {
        let json = serde_json::to_string(&Opinion::Positive).unwrap();
        assert_eq!(json, "\"positive\"");
        let parsed: Opinion = serde_json::from_str("\"negative\"").unwrap();
        assert_eq!(parsed, Opinion::Negative);
    }

    #[test]
    fn latency_floor_at_zero() {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 10).unwrap();
        let finished = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let response = ModelResponse {
            id: "r1".into(),
            prompt_id: "p1".into(),
            model_id: "m1".into(),
            started_at: started,
            finished_at: finished,
        };
        assert_eq!(response.latency_secs(), 0.0);
    }

    #[test]
    fn latency_in_seconds() {
        let started = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let finished = started + chrono::Duration::milliseconds(2_500);
        let response = ModelResponse {
            id: "r1".into(),
            prompt_id: "p1".into(),
            model_id: "m1".into(),
            started_at: started,
            finished_at: finished,
        };
        assert!((response.latency_secs() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn prompt_kind_display() {
        assert_eq!(PromptKind::Adversarial.to_string(), "adversarial");
    }
}
