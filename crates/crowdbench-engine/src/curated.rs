//! Curated model leaderboard.
//!
//! An explicit four-phase pipeline over in-memory collections:
//! filter -> stats -> weighted aggregate -> coverage cutoff -> rank.
//! The filter is a closed, typed struct validated once at the boundary;
//! score-count and review-count bounds are applied after per-prompt
//! aggregation, and the coverage gate drops under-tested models entirely
//! rather than scoring them at 0.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::model::PromptKind;
use crate::snapshot::Snapshot;

const SECS_PER_DAY: f64 = 86_400.0;

/// Decay shape for score reweighting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    #[default]
    None,
    Linear,
    Exponential,
}

/// Inclusive bounds on a per-prompt aggregate count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountRange {
    pub min: Option<u32>,
    pub max: Option<u32>,
}

impl CountRange {
    #[must_use]
    pub fn contains(&self, count: u32) -> bool {
        self.min.is_none_or(|min| count >= min) && self.max.is_none_or(|max| count <= max)
    }

    fn is_ordered(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }
}

/// Filter specification for one curated-leaderboard computation.
///
/// A closed struct: unknown keys are rejected at deserialization, and
/// `validate` rejects malformed values before any computation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CuratedQuery {
    /// OR semantics: a prompt matches when any listed tag appears in the
    /// prompt's own tags or in its set's tags.
    pub tags: Vec<String>,
    pub kind: Option<PromptKind>,
    /// Restrict to prompts authored by this user.
    pub uploader: Option<String>,
    /// AND semantics: a prompt qualifies only with at least one score
    /// from *every* listed model, so models compete on a common subset.
    pub model_slugs: Vec<String>,
    /// Applied after per-prompt aggregation (HAVING semantics).
    pub score_count: CountRange,
    /// Applied after per-prompt aggregation (HAVING semantics).
    pub review_count: CountRange,
    /// Drop prompts older than this many days at computation time.
    pub max_prompt_age_days: Option<f64>,
    /// Coverage gate in percent, 0..=100. 0 is the identity filter.
    pub min_coverage: f64,
    pub prompt_age_weighting: Weighting,
    pub response_delay_weighting: Weighting,
    /// Linear age decay reaches zero here.
    pub age_max_days: f64,
    /// Exponential age decay half-life.
    pub age_half_life_days: f64,
    /// Linear delay decay reaches zero here.
    pub delay_max_secs: f64,
    /// Exponential delay decay half-life.
    pub delay_half_life_secs: f64,
}

impl Default for CuratedQuery {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            kind: None,
            uploader: None,
            model_slugs: Vec::new(),
            score_count: CountRange::default(),
            review_count: CountRange::default(),
            max_prompt_age_days: None,
            min_coverage: 0.0,
            prompt_age_weighting: Weighting::None,
            response_delay_weighting: Weighting::None,
            age_max_days: 365.0,
            age_half_life_days: 90.0,
            delay_max_secs: 300.0,
            delay_half_life_secs: 60.0,
        }
    }
}

impl CuratedQuery {
    pub fn validate(&self) -> Result<(), QueryError> {
        if !self.min_coverage.is_finite() || !(0.0..=100.0).contains(&self.min_coverage) {
            return Err(QueryError::CoverageOutOfRange {
                value: self.min_coverage,
            });
        }
        if let Some(age) = self.max_prompt_age_days {
            if !age.is_finite() || age < 0.0 {
                return Err(QueryError::InvalidAgeCutoff { value: age });
            }
        }
        if !self.score_count.is_ordered() {
            return Err(QueryError::InvertedRange {
                field: "score_count",
            });
        }
        if !self.review_count.is_ordered() {
            return Err(QueryError::InvertedRange {
                field: "review_count",
            });
        }
        for (field, value) in [
            ("age_max_days", self.age_max_days),
            ("age_half_life_days", self.age_half_life_days),
            ("delay_max_secs", self.delay_max_secs),
            ("delay_half_life_secs", self.delay_half_life_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(QueryError::InvalidDecayParameter { field });
            }
        }
        Ok(())
    }

    fn age_weight(&self, age_days: f64) -> f64 {
        match self.prompt_age_weighting {
            Weighting::None => 1.0,
            Weighting::Linear => (1.0 - age_days / self.age_max_days).max(0.0),
            Weighting::Exponential => {
                let lambda = std::f64::consts::LN_2 / self.age_half_life_days;
                (-lambda * age_days).exp()
            }
        }
    }

    fn delay_weight(&self, delay_secs: f64) -> f64 {
        match self.response_delay_weighting {
            Weighting::None => 1.0,
            Weighting::Linear => (1.0 - delay_secs / self.delay_max_secs).max(0.0),
            Weighting::Exponential => {
                let lambda = std::f64::consts::LN_2 / self.delay_half_life_secs;
                (-lambda * delay_secs).exp()
            }
        }
    }
}

/// Query validation errors. Fatal for the query; nothing is computed.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("min_coverage {value} outside [0, 100]")]
    CoverageOutOfRange { value: f64 },
    #[error("max_prompt_age_days {value} must be a non-negative finite number")]
    InvalidAgeCutoff { value: f64 },
    #[error("{field} range has min greater than max")]
    InvertedRange { field: &'static str },
    #[error("{field} must be a positive finite number")]
    InvalidDecayParameter { field: &'static str },
    #[error("failed serializing report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl QueryError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CoverageOutOfRange { .. } => "QRY_COVERAGE_OUT_OF_RANGE",
            Self::InvalidAgeCutoff { .. } => "QRY_INVALID_AGE_CUTOFF",
            Self::InvertedRange { .. } => "QRY_INVERTED_RANGE",
            Self::InvalidDecayParameter { .. } => "QRY_INVALID_DECAY_PARAMETER",
            Self::Serialize(_) => "QRY_SERIALIZE",
        }
    }
}

/// One ranked model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelLeaderboardEntry {
    pub model_id: String,
    /// Weighted average of the model's scores on the filtered prompts.
    pub avg_score: f64,
    /// Raw (unweighted) score count.
    pub total_scores: usize,
    pub unique_prompts: usize,
    /// `100 * unique_prompts / total_distinct_prompts`.
    pub coverage_percent: f64,
    /// Unweighted mean response latency; `None` without linked responses.
    pub avg_response_time_secs: Option<f64>,
    /// 1-based position after ranking.
    pub rank: usize,
}

/// Denominators for coverage, computed over the filtered prompt set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedStats {
    pub total_distinct_prompts: usize,
    pub total_responses: usize,
    pub total_scores: usize,
}

/// The full curated-leaderboard result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuratedReport {
    pub leaderboard: Vec<ModelLeaderboardEntry>,
    pub stats: CuratedStats,
    /// Filtered prompts per source benchmark, for transparency about
    /// dataset composition.
    pub prompt_set_distribution: BTreeMap<String, usize>,
}

#[derive(Default)]
struct ModelAccumulator {
    weighted_sum: f64,
    weight_sum: f64,
    total_scores: usize,
    unique_prompts: usize,
    latency_sum: f64,
    latency_count: usize,
}

/// Compute the curated model leaderboard.
///
/// `now` anchors prompt ages; the engine never reads a clock. The same
/// snapshot, query and `now` always produce an identical report.
pub fn curated_leaderboard(
    snapshot: &Snapshot,
    query: &CuratedQuery,
    now: DateTime<Utc>,
) -> Result<CuratedReport, QueryError> {
    query.validate()?;

    // Phase 1: filter. Prompt iteration follows the id-sorted index, so
    // every later accumulation runs in canonical order.
    let mut filtered: Vec<&str> = Vec::new();
    for prompt in snapshot.prompts() {
        if !query.tags.is_empty() {
            let set_tags = snapshot
                .prompt_set(&prompt.set_id)
                .map_or(&[][..], |set| set.tags.as_slice());
            let matches = query
                .tags
                .iter()
                .any(|tag| prompt.tags.contains(tag) || set_tags.contains(tag));
            if !matches {
                continue;
            }
        }
        if let Some(kind) = query.kind {
            if prompt.kind != kind {
                continue;
            }
        }
        if let Some(uploader) = query.uploader.as_deref() {
            if prompt.author_id != uploader {
                continue;
            }
        }
        if let Some(max_age) = query.max_prompt_age_days {
            if prompt_age_days(prompt.created_at, now) > max_age {
                continue;
            }
        }

        let scores = snapshot.scores_for_prompt(&prompt.id);
        if !query.model_slugs.is_empty() {
            let covers_all = query
                .model_slugs
                .iter()
                .all(|slug| scores.iter().any(|s| &s.model_id == slug));
            if !covers_all {
                continue;
            }
        }

        // HAVING-style bounds on the per-prompt aggregates.
        if !query.score_count.contains(scores.len() as u32) {
            continue;
        }
        let review_count = snapshot.feedback_for_prompt(&prompt.id).len() as u32;
        if !query.review_count.contains(review_count) {
            continue;
        }

        filtered.push(prompt.id.as_str());
    }

    // Phase 2: stats over the filtered set.
    let mut prompt_set_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_scores = 0usize;
    let mut total_responses = 0usize;
    for prompt_id in &filtered {
        if let Some(prompt) = snapshot.prompt(prompt_id) {
            *prompt_set_distribution
                .entry(prompt.set_id.clone())
                .or_default() += 1;
        }
        total_scores += snapshot.scores_for_prompt(prompt_id).len();
        total_responses += snapshot.responses_for_prompt(prompt_id).len();
    }
    let stats = CuratedStats {
        total_distinct_prompts: filtered.len(),
        total_responses,
        total_scores,
    };

    // Phases 3 and 4: reweight and aggregate per model.
    let mut accumulators: BTreeMap<String, ModelAccumulator> = BTreeMap::new();
    for prompt_id in &filtered {
        let Some(prompt) = snapshot.prompt(prompt_id) else {
            continue;
        };
        let age_weight = query.age_weight(prompt_age_days(prompt.created_at, now));

        let mut seen_models: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
        for score in snapshot.scores_for_prompt(prompt_id) {
            let delay_weight = match score.response_id.as_deref() {
                Some(response_id) => match snapshot.response(response_id) {
                    Some(response) => query.delay_weight(response.latency_secs()),
                    // Severed links were warned at snapshot build.
                    None => 1.0,
                },
                None => 1.0,
            };
            let weight = age_weight * delay_weight;

            let acc = accumulators.entry(score.model_id.clone()).or_default();
            acc.weighted_sum += weight * score.value;
            acc.weight_sum += weight;
            acc.total_scores += 1;
            if seen_models.insert(score.model_id.as_str()) {
                acc.unique_prompts += 1;
            }
            if let Some(response_id) = score.response_id.as_deref() {
                if let Some(response) = snapshot.response(response_id) {
                    acc.latency_sum += response.latency_secs();
                    acc.latency_count += 1;
                }
            }
        }
    }

    // Phase 5: coverage cutoff. Under-tested models are dropped, not
    // scored at zero.
    let denominator = stats.total_distinct_prompts;
    let mut leaderboard: Vec<ModelLeaderboardEntry> = Vec::new();
    for (model_id, acc) in accumulators {
        let coverage_percent = if denominator == 0 {
            0.0
        } else {
            100.0 * acc.unique_prompts as f64 / denominator as f64
        };
        if coverage_percent < query.min_coverage {
            continue;
        }
        let avg_score = if acc.weight_sum > 0.0 {
            acc.weighted_sum / acc.weight_sum
        } else {
            0.0
        };
        let avg_response_time_secs = if acc.latency_count > 0 {
            Some(acc.latency_sum / acc.latency_count as f64)
        } else {
            None
        };
        leaderboard.push(ModelLeaderboardEntry {
            model_id,
            avg_score,
            total_scores: acc.total_scores,
            unique_prompts: acc.unique_prompts,
            coverage_percent,
            avg_response_time_secs,
            rank: 0, // set after sorting
        });
    }

    // Phase 6: rank.
    leaderboard.sort_by(|a, b| {
        b.avg_score
            .partial_cmp(&a.avg_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.total_scores.cmp(&a.total_scores))
            .then(a.model_id.cmp(&b.model_id))
    });
    for (i, entry) in leaderboard.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    debug!(
        filtered = stats.total_distinct_prompts,
        models = leaderboard.len(),
        "curated leaderboard computed"
    );

    Ok(CuratedReport {
        leaderboard,
        stats,
        prompt_set_distribution,
    })
}

fn prompt_age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = now.signed_duration_since(created_at).num_seconds();
    if secs <= 0 { 0.0 } else { secs as f64 / SECS_PER_DAY }
}

/// Serialize a report (or any value) to canonical JSON: object keys
/// sorted recursively, so equal values give byte-equal output.
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, QueryError> {
    let raw = serde_json::to_value(value)?;
    let canonical = canonicalize_value(raw);
    Ok(serde_json::to_string(&canonical)?)
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => {
            Value::Array(items.into_iter().map(canonicalize_value).collect())
        }
        other => other,
    }
}
