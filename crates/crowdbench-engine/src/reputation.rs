//! User reputation score.
//!
//! Combines one-time achievement bonuses (each fully granted or zero)
//! with continuously-growing activity metrics, including an h-index over
//! per-prompt quality points. The full component breakdown is part of the
//! output contract so the presentation layer can show why a score was
//! earned.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ContributorCoefficients, UserScoreConfig};
use crate::consensus::positive_fraction;
use crate::snapshot::Snapshot;

/// Granted one-time bonuses. A field is either the configured amount or 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusBreakdown {
    pub affiliation: f64,
    pub benchmark_creator: f64,
    pub diverse_feedback_benchmarks: f64,
    pub diverse_feedback_users: f64,
    pub quality_prompts: f64,
    pub difficult_prompts: f64,
    pub sota_difficult_prompts: f64,
}

impl BonusBreakdown {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.affiliation
            + self.benchmark_creator
            + self.diverse_feedback_benchmarks
            + self.diverse_feedback_users
            + self.quality_prompts
            + self.difficult_prompts
            + self.sota_difficult_prompts
    }
}

/// Continuous components: always computed, never gated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuousBreakdown {
    /// The h-index itself (largest `h` with `h` prompts at `h`+ points).
    pub h_index: u32,
    /// `h_index_coefficient * h^2`.
    pub h_index_points: f64,
    pub quality_prompt_points: f64,
    pub feedback_points: f64,
    pub collaboration_points: f64,
}

impl ContinuousBreakdown {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.h_index_points
            + self.quality_prompt_points
            + self.feedback_points
            + self.collaboration_points
    }
}

/// The full per-user score decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub bonuses: BonusBreakdown,
    pub continuous: ContinuousBreakdown,
}

/// One row of the user reputation leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserScoreEntry {
    pub user_id: String,
    pub total_score: f64,
    pub components: ScoreComponents,
    /// 1-based position after ranking.
    pub rank: usize,
}

/// Largest `h` such that at least `h` of the values are `>= h`.
///
/// The citation-index computation: sort descending, find the largest
/// 1-based index `i` with `values[i] >= i`.
#[must_use]
pub fn h_index(quality_points: &[u32]) -> u32 {
    let mut sorted = quality_points.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let mut h = 0u32;
    for (i, points) in sorted.iter().enumerate() {
        let position = (i + 1) as u32;
        if *points >= position {
            h = position;
        } else {
            break;
        }
    }
    h
}

/// Rank every user with any activity (prompts authored, feedback given,
/// or an affiliation flag). Users with none of those are omitted rather
/// than listed at zero.
///
/// Order: `total_score` descending, then `user_id` ascending.
pub fn rank_user_scores(
    snapshot: &Snapshot,
    config: &UserScoreConfig,
    contributor: &ContributorCoefficients,
) -> Result<Vec<UserScoreEntry>, ConfigError> {
    config.validate()?;
    contributor.validate()?;

    // Distinct prompt authors per set, shared by the benchmark-creator
    // bonus and the collaborator count.
    let mut authors_by_set: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for prompt in snapshot.prompts() {
        authors_by_set
            .entry(prompt.set_id.as_str())
            .or_default()
            .insert(prompt.author_id.as_str());
    }

    let thresholds = &config.thresholds;
    let sota: BTreeSet<&str> = config.sota_models.iter().map(String::as_str).collect();

    let mut entries: Vec<UserScoreEntry> = Vec::new();
    for user in snapshot.users() {
        let prompt_ids = snapshot.prompts_by_author(&user.id);
        let given = snapshot.feedback_by_reviewer(&user.id);
        if prompt_ids.is_empty() && given.is_empty() && !user.has_affiliation {
            continue;
        }

        let mut quality_prompt_count = 0u32;
        let mut difficult_count = 0u32;
        let mut sota_difficult_count = 0u32;
        let mut quality_points: Vec<u32> = Vec::with_capacity(prompt_ids.len());

        for prompt_id in prompt_ids {
            let feedbacks = snapshot.feedback_for_prompt(prompt_id);
            let positive = feedbacks.iter().filter(|f| f.opinion.is_positive()).count();
            quality_points.push(positive as u32);

            if (feedbacks.len() as u32) >= contributor.min_reviews_for_quality
                && positive_fraction(feedbacks).unwrap_or(0.0)
                    >= thresholds.quality_prompt_threshold
            {
                quality_prompt_count += 1;
            }

            let scores = snapshot.scores_for_prompt(prompt_id);
            if let Some(mean) = mean_score(scores.iter().map(|s| s.value)) {
                if mean < thresholds.wrong_answer_threshold {
                    difficult_count += 1;
                }
            }
            let sota_values = scores
                .iter()
                .filter(|s| sota.contains(s.model_id.as_str()))
                .map(|s| s.value);
            if let Some(mean) = mean_score(sota_values) {
                if mean < thresholds.wrong_answer_threshold {
                    sota_difficult_count += 1;
                }
            }
        }

        let created_qualifying_benchmark = snapshot.prompt_sets().any(|set| {
            set.creator_id == user.id
                && authors_by_set
                    .get(set.id.as_str())
                    .is_some_and(|authors| {
                        authors.len() as u32 >= thresholds.min_benchmark_contributors
                    })
        });

        let mut reviewed_sets: BTreeSet<&str> = BTreeSet::new();
        let mut reviewed_authors: BTreeSet<&str> = BTreeSet::new();
        for feedback in given {
            if let Some(prompt) = snapshot.prompt(&feedback.prompt_id) {
                reviewed_sets.insert(prompt.set_id.as_str());
                if prompt.author_id != user.id {
                    reviewed_authors.insert(prompt.author_id.as_str());
                }
            }
        }

        let mut collaborators: BTreeSet<&str> = BTreeSet::new();
        for prompt_id in prompt_ids {
            if let Some(prompt) = snapshot.prompt(prompt_id) {
                if let Some(authors) = authors_by_set.get(prompt.set_id.as_str()) {
                    collaborators.extend(authors.iter().filter(|a| **a != user.id));
                }
            }
        }

        let grant = |granted: bool, amount: f64| if granted { amount } else { 0.0 };
        let bonuses = BonusBreakdown {
            affiliation: grant(user.has_affiliation, config.bonuses.affiliation),
            benchmark_creator: grant(
                created_qualifying_benchmark,
                config.bonuses.benchmark_creator,
            ),
            diverse_feedback_benchmarks: grant(
                reviewed_sets.len() as u32 >= thresholds.min_feedback_benchmarks,
                config.bonuses.diverse_feedback_benchmarks,
            ),
            diverse_feedback_users: grant(
                reviewed_authors.len() as u32 >= thresholds.min_feedback_users,
                config.bonuses.diverse_feedback_users,
            ),
            quality_prompts: grant(
                quality_prompt_count >= thresholds.min_quality_prompts,
                config.bonuses.quality_prompts,
            ),
            difficult_prompts: grant(
                difficult_count >= thresholds.min_difficult_prompts,
                config.bonuses.difficult_prompts,
            ),
            sota_difficult_prompts: grant(
                sota_difficult_count >= thresholds.min_difficult_prompts,
                config.bonuses.sota_difficult_prompts,
            ),
        };

        let h = h_index(&quality_points);
        let continuous = ContinuousBreakdown {
            h_index: h,
            h_index_points: config.coefficients.h_index * f64::from(h * h),
            quality_prompt_points: config.coefficients.quality_prompts
                * f64::from(quality_prompt_count),
            feedback_points: config.coefficients.feedback_activity * given.len() as f64,
            collaboration_points: config.coefficients.collaboration
                * collaborators.len() as f64,
        };

        let total_score = bonuses.total() + continuous.total();
        entries.push(UserScoreEntry {
            user_id: user.id.clone(),
            total_score,
            components: ScoreComponents {
                bonuses,
                continuous,
            },
            rank: 0, // set after sorting
        });
    }

    entries.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.user_id.cmp(&b.user_id))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    Ok(entries)
}

fn mean_score(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 { None } else { Some(sum / count as f64) }
}
