//! Contributor leaderboard.
//!
//! Ranks users by the quality of the prompts they authored, an optional
//! affiliation bonus, and a capped reputation multiplier. Deterministic
//! with explicit tie-breakers; identical inputs always produce identical
//! rankings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ContributorCoefficients};
use crate::consensus::positive_fraction;
use crate::model::Feedback;
use crate::snapshot::Snapshot;

/// One row of the contributor leaderboard, with the explainable breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorLeaderboardEntry {
    pub user_id: String,
    pub total_score: f64,
    /// The weighted quality term (`quality_weight * avg_prompt_quality`).
    pub quality_score: f64,
    /// The granted affiliation bonus, or 0.
    pub affiliation_bonus: f64,
    pub prompt_count: usize,
    pub avg_prompt_quality: f64,
    /// 1-based position after ranking.
    pub rank: usize,
}

/// Quality of one prompt: fraction positive over all raters, but only
/// once the prompt has enough evidence. Below `min_reviews_for_quality`
/// the quality is 0 regardless of how positive the few feedbacks are.
#[must_use]
pub fn prompt_quality(feedbacks: &[Feedback], min_reviews_for_quality: u32) -> f64 {
    if (feedbacks.len() as u32) < min_reviews_for_quality {
        return 0.0;
    }
    positive_fraction(feedbacks).unwrap_or(0.0)
}

/// Capped reputation multiplier from a historical standing signal.
///
/// Monotonically increasing in the signal, never below 1 (no history)
/// and never above `reputation_cap`.
#[must_use]
pub fn reputation_multiplier(signal: f64, reputation_cap: f64) -> f64 {
    let signal = if signal.is_finite() { signal.max(0.0) } else { 0.0 };
    (1.0 + signal).min(reputation_cap)
}

/// Rank every user with at least one authored prompt.
///
/// `reputation_signals` carries each user's historical standing (for
/// example a normalized prior reputation total); absent users default to
/// a signal of 0, i.e. a multiplier of exactly 1.
///
/// Order: `total_score` descending, then `prompt_count` descending, then
/// `user_id` ascending.
pub fn rank_contributors(
    snapshot: &Snapshot,
    coefficients: &ContributorCoefficients,
    reputation_signals: &BTreeMap<String, f64>,
) -> Result<Vec<ContributorLeaderboardEntry>, ConfigError> {
    coefficients.validate()?;

    let mut entries: Vec<ContributorLeaderboardEntry> = Vec::new();
    for user in snapshot.users() {
        let prompt_ids = snapshot.prompts_by_author(&user.id);
        if prompt_ids.is_empty() {
            // Users with zero prompts are not on this board at all.
            continue;
        }

        let quality_sum: f64 = prompt_ids
            .iter()
            .map(|prompt_id| {
                prompt_quality(
                    snapshot.feedback_for_prompt(prompt_id),
                    coefficients.min_reviews_for_quality,
                )
            })
            .sum();
        let avg_prompt_quality = quality_sum / prompt_ids.len() as f64;

        let signal = reputation_signals.get(&user.id).copied().unwrap_or(0.0);
        let multiplier = reputation_multiplier(signal, coefficients.reputation_cap);

        let affiliation_bonus = if user.has_affiliation {
            coefficients.affiliation_bonus_points
        } else {
            0.0
        };
        let quality_score = coefficients.quality_weight * avg_prompt_quality;
        let total_score =
            affiliation_bonus + quality_score + coefficients.reputation_weight * multiplier;

        entries.push(ContributorLeaderboardEntry {
            user_id: user.id.clone(),
            total_score,
            quality_score,
            affiliation_bonus,
            prompt_count: prompt_ids.len(),
            avg_prompt_quality,
            rank: 0, // set after sorting
        });
    }

    entries.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.prompt_count.cmp(&a.prompt_count))
            .then(a.user_id.cmp(&b.user_id))
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    Ok(entries)
}
